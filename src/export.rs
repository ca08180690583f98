//! JSON export of the normalized record list.
//!
//! The driver hands its results to this module; styled tabular output is an
//! external collaborator's concern and lives outside this crate.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::enrich::NormalizedRecord;

/// Errors raised while exporting results.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The output file or its parent directory could not be written.
    #[error("cannot write results to {path}: {source}")]
    Io {
        /// The output path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The record list could not be serialized.
    #[error("cannot serialize results: {source}")]
    Serialize {
        /// The underlying serialization error.
        #[source]
        source: serde_json::Error,
    },
}

/// Writes the records as a pretty-printed JSON array, creating parent
/// directories as needed.
///
/// # Errors
///
/// Returns [`ExportError`] on serialization or write failure.
pub fn save_json(records: &[NormalizedRecord], path: &Path) -> Result<(), ExportError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|source| ExportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    }

    let json =
        serde_json::to_string_pretty(records).map_err(|source| ExportError::Serialize { source })?;
    std::fs::write(path, json).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    info!(path = %path.display(), records = records.len(), "results exported");
    Ok(())
}
