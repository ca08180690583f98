//! Availability probes: independent, best-effort checks against external
//! resources for one work.
//!
//! Three probe kinds exist: publisher site, pirate mirrors, and a
//! secondary repository search page. Each is read-only with respect to the
//! work record, carries its own retry policy, and is isolated: a failure in
//! one probe kind never prevents the other two from running for the same
//! item. Probe answers are noisy signals, not ground truth.
//!
//! This module centralizes probe networking policy (user agent, timeouts)
//! so the probe kinds stay consistent, and defines the shared error type.

pub mod mirror;
pub mod publisher;
pub mod repository;

use std::time::Duration;

use thiserror::Error;

pub use mirror::{MirrorProbe, PirateProbeResult};
pub use publisher::{AvailabilityResult, PublisherProbe};
pub use repository::{RepositoryProbe, SecondaryRepoStatus};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Full page loads on probed sites can be slow; allow tens of seconds.
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors raised by a single probe fetch.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The probe HTTP client could not be constructed.
    #[error("failed to build probe HTTP client: {source}")]
    ClientBuild {
        /// The underlying builder error.
        #[source]
        source: reqwest::Error,
    },

    /// Network-level failure (timeout, DNS, connection refused/reset).
    #[error("probe request failed for {url}: {source}")]
    Network {
        /// The probed URL.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// The probed site answered with a server error.
    #[error("probe target returned HTTP {status} for {url}")]
    HttpStatus {
        /// The probed URL.
        url: String,
        /// The HTTP status code.
        status: u16,
    },
}

impl ProbeError {
    pub(crate) fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    pub(crate) fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }
}

/// Browser-compatible user agent; probed sites often reject bare clients.
fn probe_user_agent() -> String {
    format!(
        "Mozilla/5.0 (compatible; litscan/{})",
        env!("CARGO_PKG_VERSION")
    )
}

/// Builds the HTTP client all probe kinds share the policy of.
///
/// # Errors
///
/// Returns [`ProbeError::ClientBuild`] when client construction fails.
pub(crate) fn build_probe_http_client() -> Result<reqwest::Client, ProbeError> {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(READ_TIMEOUT)
        .user_agent(probe_user_agent())
        .gzip(true)
        .build()
        .map_err(|source| ProbeError::ClientBuild { source })
}
