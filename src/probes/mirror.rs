//! Pirate-mirror availability probe.
//!
//! For each configured mirror base endpoint, synthesizes one or two
//! candidate URLs from the DOI and fetches them with a bounded timeout. A
//! 200 response whose body mentions the DOI (case-insensitive) or the
//! substring `.pdf` counts as "found" for that endpoint. Endpoints are
//! probed independently: one endpoint failing never prevents the others.

use std::collections::HashMap;

use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::retry::RetryPolicy;

use super::{ProbeError, build_probe_http_client};

/// Per-endpoint outcomes of the mirror probe for one work.
#[derive(Debug, Clone, Default)]
pub struct PirateProbeResult {
    /// "Found" flag per configured base endpoint.
    pub endpoints: HashMap<String, bool>,
    /// Logical OR over all endpoints.
    pub any_found: bool,
}

impl PirateProbeResult {
    /// The no-endpoints-configured result: nothing probed, nothing found.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Synthesizes the candidate URLs for one endpoint.
///
/// A base already ending in a separator (`/`) or a query assignment (`=`)
/// takes the encoded DOI by concatenation; otherwise both a path-joined and
/// a `?q=` query form are tried.
fn candidate_urls(base: &str, doi: &str) -> Vec<String> {
    let encoded = urlencoding::encode(doi);
    if base.ends_with('=') || base.ends_with('/') {
        vec![format!("{base}{encoded}")]
    } else {
        vec![format!("{base}/{encoded}"), format!("{base}?q={encoded}")]
    }
}

/// Checks configured mirror endpoints for a DOI.
#[derive(Debug)]
pub struct MirrorProbe {
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl MirrorProbe {
    /// Creates a probe.
    ///
    /// Mirrors are the flakiest targets in the pipeline; two attempts keep
    /// worst-case latency per endpoint bounded.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError`] if HTTP client construction fails.
    pub fn new() -> Result<Self, ProbeError> {
        Ok(Self {
            client: build_probe_http_client()?,
            retry: RetryPolicy::with_max_attempts(2),
        })
    }

    /// Replaces the retry policy (tests use a zero-delay policy).
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Probes every endpoint for `doi`. Never errors: an endpoint whose
    /// candidates all fail is recorded as `false`.
    pub async fn check(&self, doi: &str, bases: &[String]) -> PirateProbeResult {
        if bases.is_empty() {
            return PirateProbeResult::empty();
        }

        let mut endpoints = HashMap::with_capacity(bases.len());
        let mut any_found = false;

        for base in bases {
            let found = self.check_endpoint(base, doi).await;
            if found {
                any_found = true;
            }
            endpoints.insert(base.clone(), found);
        }

        PirateProbeResult {
            endpoints,
            any_found,
        }
    }

    /// Tries each candidate URL of one endpoint until one hits.
    async fn check_endpoint(&self, base: &str, doi: &str) -> bool {
        for candidate in candidate_urls(base, doi) {
            match self
                .retry
                .run("mirror check", || self.probe_candidate(&candidate, doi))
                .await
            {
                Ok(true) => {
                    debug!(endpoint = base, url = %candidate, "mirror hit");
                    return true;
                }
                Ok(false) => {}
                Err(error) => {
                    // Isolation: this endpoint resolves to "not found",
                    // remaining endpoints still get probed.
                    warn!(endpoint = base, error = %error, "mirror probe failed");
                }
            }
        }
        false
    }

    async fn probe_candidate(&self, url: &str, doi: &str) -> Result<bool, ProbeError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| ProbeError::network(url, source))?;

        if response.status() != StatusCode::OK {
            return Ok(false);
        }

        let body = response
            .text()
            .await
            .map_err(|source| ProbeError::network(url, source))?
            .to_lowercase();

        Ok(body.contains(&doi.to_lowercase()) || body.contains(".pdf"))
    }
}
