//! Checkpoint store for the deduplicated DOI index.
//!
//! Persisting the index lets repeated runs against the same configuration
//! skip the slow, rate-limited collection stage. The file is a JSON object
//! mapping normalized DOI to a Crossref-shaped work record, read and
//! written wholesale. Persistence failures are never fatal: a missing or
//! corrupt file loads as an empty index, and a failed save leaves the
//! in-memory index usable for the current run.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::index::DoiIndex;

/// Errors raised while writing a checkpoint.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// The checkpoint file or its parent directory could not be written.
    #[error("cannot write checkpoint {path}: {source}")]
    Io {
        /// The checkpoint path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The index could not be serialized.
    #[error("cannot serialize checkpoint: {source}")]
    Serialize {
        /// The underlying serialization error.
        #[source]
        source: serde_json::Error,
    },
}

/// Loads a checkpointed index, degrading to empty on any failure.
///
/// A missing file is the normal first-run case and logs at debug; an
/// unreadable or corrupt file logs a warning. Neither is an error to the
/// caller.
#[must_use]
pub fn load(path: &Path) -> DoiIndex {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no checkpoint file, starting fresh");
            return DoiIndex::new();
        }
        Err(error) => {
            warn!(
                path = %path.display(),
                error = %error,
                "cannot read checkpoint, starting fresh"
            );
            return DoiIndex::new();
        }
    };

    match serde_json::from_str::<DoiIndex>(&raw) {
        Ok(index) => {
            info!(path = %path.display(), works = index.len(), "loaded checkpointed DOIs");
            index
        }
        Err(error) => {
            warn!(
                path = %path.display(),
                error = %error,
                "checkpoint file is corrupted, starting fresh"
            );
            DoiIndex::new()
        }
    }
}

/// Persists the index, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`CheckpointError`] on serialization or write failure. Callers
/// log and continue; the run proceeds with the in-memory index.
pub fn save(index: &DoiIndex, path: &Path) -> Result<(), CheckpointError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|source| CheckpointError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    }

    let json =
        serde_json::to_string_pretty(index).map_err(|source| CheckpointError::Serialize { source })?;
    std::fs::write(path, json).map_err(|source| CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    info!(path = %path.display(), works = index.len(), "saved checkpointed DOIs");
    Ok(())
}
