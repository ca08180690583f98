//! Error types for Crossref API access.

use thiserror::Error;

/// Errors raised while querying the Crossref API.
///
/// All variants count as fetch failures for retry purposes; a malformed
/// response is as retryable as a connection reset.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The HTTP client could not be constructed.
    #[error("failed to build Crossref HTTP client: {source}")]
    ClientBuild {
        /// The underlying builder error.
        #[source]
        source: reqwest::Error,
    },

    /// The contact address contains characters unusable in a request.
    #[error("mailto contains invalid control characters")]
    InvalidMailto,

    /// Network-level failure (timeout, DNS, connection refused/reset).
    #[error("Crossref request failed for {url}: {source}")]
    Network {
        /// The request URL.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Crossref answered with a non-success status.
    #[error("Crossref returned HTTP {status} for {url}")]
    HttpStatus {
        /// The request URL.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The response body was not the expected JSON shape.
    #[error("malformed Crossref response from {url}: {source}")]
    MalformedResponse {
        /// The request URL.
        url: String,
        /// The underlying decode error.
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    /// Creates a network error for `url`.
    pub(crate) fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error for `url`.
    pub(crate) fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a malformed-response error for `url`.
    pub(crate) fn malformed(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::MalformedResponse {
            url: url.into(),
            source,
        }
    }
}
