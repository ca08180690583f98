//! Run configuration loading and validation.
//!
//! Configuration failures are the one failure class allowed to abort a run,
//! and they surface here, before any network activity begins.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Hard ceiling on the worker pool, independent of core count.
const MAX_WORKERS: usize = 12;

/// Workers per available core.
const WORKERS_PER_CORE: usize = 3;

/// Errors raised while loading or validating the run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read config file {path}: {source}")]
    Io {
        /// Path that failed to load.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON or has the wrong shape.
    #[error("cannot parse config file {path}: {source}")]
    Parse {
        /// Path that failed to parse.
        path: PathBuf,
        /// The underlying deserialization error.
        #[source]
        source: serde_json::Error,
    },

    /// A required field is missing or holds an unusable value.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// What is wrong with the configuration.
        reason: String,
    },
}

/// Output paths for the export stage.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Destination for the JSON result list.
    #[serde(default = "default_json_output")]
    pub json: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            json: default_json_output(),
        }
    }
}

/// One pipeline run's configuration, deserialized from a JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Journal ISSNs to query; one collection dimension each.
    pub issns: Vec<String>,

    /// Query texts crossed against every ISSN.
    pub keywords: Vec<String>,

    /// Inclusive lower publication-date bound (ISO date).
    #[serde(default)]
    pub date_from: Option<String>,

    /// Upper publication-date bound (ISO date).
    #[serde(default)]
    pub date_to: Option<String>,

    /// Page size for Crossref queries.
    #[serde(default = "default_rows")]
    pub crossref_rows: usize,

    /// Mirror base endpoints to probe; empty disables the mirror probe.
    #[serde(default)]
    pub pirate_urls: Vec<String>,

    /// Whether to probe the secondary repository search page.
    #[serde(default)]
    pub check_secondary: bool,

    /// Whether the publisher probe performs live fetches per PDF candidate.
    #[serde(default)]
    pub verify_publisher_links: bool,

    /// Checkpoint file for the deduplicated DOI index.
    #[serde(default = "default_cache_path")]
    pub doi_cache_path: PathBuf,

    /// Contact address for the Crossref polite pool.
    #[serde(default = "default_mailto")]
    pub mailto: String,

    /// Export destinations.
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_rows() -> usize {
    100
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("cached_dois.json")
}

fn default_mailto() -> String {
    "litscan@example.com".to_string()
}

fn default_json_output() -> PathBuf {
    PathBuf::from("output.json")
}

impl RunConfig {
    /// Loads and validates a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file is unreadable, unparseable, or
    /// fails validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        debug!(
            issns = config.issns.len(),
            keywords = config.keywords.len(),
            rows = config.crossref_rows,
            "configuration loaded"
        );
        Ok(config)
    }

    /// Checks the invariants the pipeline relies on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] on an empty dimension set, empty
    /// query set, or zero page size.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.issns.is_empty() {
            return Err(ConfigError::Invalid {
                reason: "`issns` must list at least one journal identifier".to_string(),
            });
        }
        if self.keywords.is_empty() {
            return Err(ConfigError::Invalid {
                reason: "`keywords` must list at least one query text".to_string(),
            });
        }
        if self.crossref_rows == 0 {
            return Err(ConfigError::Invalid {
                reason: "`crossref_rows` must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Worker-pool bound shared by the collection and enrichment phases.
///
/// `min(12, cores * 3)`, so small machines stay responsive and large ones
/// do not hammer remote services.
#[must_use]
pub fn concurrency_limit() -> usize {
    let cores = std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(4);
    MAX_WORKERS.min(cores * WORKERS_PER_CORE)
}
