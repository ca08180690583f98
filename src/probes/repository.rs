//! Secondary-repository availability probe.
//!
//! Issues one search query against a repository's publication search page
//! and inspects the result: the DOI appearing in the page means the work is
//! there; a clean page without it means it may be there under a different
//! key; transport trouble means we simply do not know.

use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::retry::RetryPolicy;

use super::{ProbeError, build_probe_http_client};

/// Default search endpoint; the DOI is appended percent-encoded.
const DEFAULT_SEARCH_BASE: &str = "https://www.researchgate.net/search/publication?q=";

/// Outcome of probing the secondary repository for one work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecondaryRepoStatus {
    /// The search page mentions the DOI.
    Found,
    /// The search page loaded but does not mention the DOI.
    PossiblyFound,
    /// The repository answered with a clean non-success status.
    NotFound,
    /// Timeout or transport failure; no signal either way.
    Unknown,
    /// The probe was disabled for this run.
    NotChecked,
}

/// Checks a repository search page for a DOI.
#[derive(Debug)]
pub struct RepositoryProbe {
    client: reqwest::Client,
    search_base: String,
    retry: RetryPolicy,
}

impl RepositoryProbe {
    /// Creates a probe against the default repository.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError`] if HTTP client construction fails.
    pub fn new() -> Result<Self, ProbeError> {
        Self::with_search_base(DEFAULT_SEARCH_BASE)
    }

    /// Creates a probe with a custom search base (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError`] if HTTP client construction fails.
    pub fn with_search_base(search_base: impl Into<String>) -> Result<Self, ProbeError> {
        Ok(Self {
            client: build_probe_http_client()?,
            search_base: search_base.into(),
            retry: RetryPolicy::default(),
        })
    }

    /// Replaces the retry policy (tests use a zero-delay policy).
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Probes the repository for `doi`. Never errors: exhausted retries
    /// resolve to [`SecondaryRepoStatus::Unknown`].
    pub async fn check(&self, doi: &str) -> SecondaryRepoStatus {
        let url = format!("{}{}", self.search_base, urlencoding::encode(doi));

        match self
            .retry
            .run("repository search", || self.fetch_status(&url, doi))
            .await
        {
            Ok(status) => {
                debug!(doi, ?status, "repository probe resolved");
                status
            }
            Err(error) => {
                warn!(doi, error = %error, "repository probe failed, status unknown");
                SecondaryRepoStatus::Unknown
            }
        }
    }

    /// One fetch of the search page.
    ///
    /// Server errors are returned as [`ProbeError`] so the retry policy
    /// sees them; any other non-success status is a decisive `NotFound`.
    async fn fetch_status(&self, url: &str, doi: &str) -> Result<SecondaryRepoStatus, ProbeError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| ProbeError::network(url, source))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(ProbeError::http_status(url, status.as_u16()));
        }
        if status != StatusCode::OK {
            return Ok(SecondaryRepoStatus::NotFound);
        }

        let body = response
            .text()
            .await
            .map_err(|source| ProbeError::network(url, source))?;

        if body.to_lowercase().contains(&doi.to_lowercase()) {
            Ok(SecondaryRepoStatus::Found)
        } else {
            Ok(SecondaryRepoStatus::PossiblyFound)
        }
    }
}
