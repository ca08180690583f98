//! Crossref works client: paginated, filter-driven retrieval of candidate
//! records, merged into a deduplicated [`DoiIndex`].
//!
//! The client queries `https://api.crossref.org/works` with an ISSN filter,
//! an optional publication-date window, and a free-text query, paging until
//! the source is exhausted. Collection fans out one bounded task per ISSN
//! dimension; partial results flow over a channel into a single accumulating
//! index so the conflict-resolution rule never races.
//!
//! # Polite Pool
//!
//! All requests include a `mailto` query parameter to access Crossref's
//! polite pool, which provides higher rate limits.

pub mod error;
pub mod record;

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, info, warn};

use crate::index::DoiIndex;
use crate::progress::PhaseProgress;
use crate::retry::RetryPolicy;

pub use error::FetchError;
pub use record::WorkRecord;

/// Default Crossref API base URL.
const DEFAULT_BASE_URL: &str = "https://api.crossref.org";

/// Per-request timeout; bibliographic API calls are expected to be fast.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Fixed pause between consecutive page fetches of one query.
const PAGE_DELAY: Duration = Duration::from_millis(100);

/// Top-level Crossref works-list response.
#[derive(Debug, Deserialize)]
struct CrossrefResponse {
    message: CrossrefMessage,
}

/// The `message` field of a works-list response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct CrossrefMessage {
    #[serde(default)]
    items: Vec<WorkRecord>,
    total_results: Option<u64>,
}

/// One page of works from the source.
#[derive(Debug)]
pub struct Page {
    /// Records on this page.
    pub items: Vec<WorkRecord>,
    /// Cumulative total the source reports for the query, when known.
    pub total_results: Option<u64>,
}

/// Builds the Crossref filter expression for one query dimension.
///
/// Date values are truncated at a `T` so full timestamps degrade to dates.
/// Returns `None` when no filter component applies.
fn build_filter(issn: &str, date_from: Option<&str>, date_to: Option<&str>) -> Option<String> {
    let mut parts = Vec::new();
    if !issn.is_empty() {
        parts.push(format!("issn:{issn}"));
    }
    if let Some(from) = date_from {
        parts.push(format!("from-pub-date:{}", date_only(from)));
    }
    if let Some(to) = date_to {
        parts.push(format!("until-pub-date:{}", date_only(to)));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(","))
    }
}

fn date_only(value: &str) -> &str {
    value.split('T').next().unwrap_or(value)
}

fn crossref_user_agent() -> String {
    format!("litscan/{} (research-availability-tool)", env!("CARGO_PKG_VERSION"))
}

/// Paginated query client for the Crossref works API.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct CrossrefClient {
    client: reqwest::Client,
    base_url: String,
    mailto: String,
    retry: RetryPolicy,
    page_delay: Duration,
}

impl CrossrefClient {
    /// Creates a client against the public Crossref API.
    ///
    /// # Arguments
    ///
    /// * `mailto` - Contact email for Crossref polite pool access
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if the mailto is unusable or HTTP client
    /// construction fails.
    pub fn new(mailto: impl Into<String>) -> Result<Self, FetchError> {
        Self::build(mailto.into(), DEFAULT_BASE_URL.to_string())
    }

    /// Creates a client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if the mailto is unusable or HTTP client
    /// construction fails.
    pub fn with_base_url(
        mailto: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, FetchError> {
        Self::build(mailto.into(), base_url.into())
    }

    fn build(mailto: String, base_url: String) -> Result<Self, FetchError> {
        if mailto.chars().any(|c| c == '\n' || c == '\r' || c == '\0') {
            return Err(FetchError::InvalidMailto);
        }
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(crossref_user_agent())
            .gzip(true)
            .build()
            .map_err(|source| FetchError::ClientBuild { source })?;

        Ok(Self {
            client,
            base_url,
            mailto,
            retry: RetryPolicy::default(),
            page_delay: PAGE_DELAY,
        })
    }

    /// Replaces the retry policy (tests use a zero-delay policy).
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replaces the inter-page pause (tests use zero).
    #[must_use]
    pub fn with_page_delay(mut self, page_delay: Duration) -> Self {
        self.page_delay = page_delay;
        self
    }

    /// Fetches one page of works for a query dimension.
    ///
    /// Runs under the client's retry policy; HTTP non-success and malformed
    /// JSON count as fetch failures.
    ///
    /// # Errors
    ///
    /// Returns the final [`FetchError`] once all retry attempts fail.
    pub async fn fetch_page(
        &self,
        issn: &str,
        query: &str,
        date_from: Option<&str>,
        date_to: Option<&str>,
        offset: usize,
        rows: usize,
    ) -> Result<Page, FetchError> {
        let url = format!("{}/works", self.base_url);
        let filter = build_filter(issn, date_from, date_to);

        self.retry
            .run("crossref page", || {
                let mut params: Vec<(&str, String)> = Vec::with_capacity(5);
                if let Some(filter) = &filter {
                    params.push(("filter", filter.clone()));
                }
                params.push(("query", query.to_string()));
                params.push(("rows", rows.to_string()));
                params.push(("offset", offset.to_string()));
                params.push(("mailto", self.mailto.clone()));
                self.request_page(&url, params)
            })
            .await
    }

    async fn request_page(
        &self,
        url: &str,
        params: Vec<(&str, String)>,
    ) -> Result<Page, FetchError> {
        let response = self
            .client
            .get(url)
            .query(&params)
            .send()
            .await
            .map_err(|source| FetchError::network(url, source))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::http_status(url, status.as_u16()));
        }

        let body = response
            .json::<CrossrefResponse>()
            .await
            .map_err(|source| FetchError::malformed(url, source))?;

        Ok(Page {
            items: body.message.items,
            total_results: body.message.total_results,
        })
    }

    /// Pages through all works matching one (ISSN, query) combination.
    ///
    /// The offset advances by the number of records actually returned.
    /// Pagination ends on an empty page, an under-full page, or once the
    /// reported total has been reached. A page fetch that fails after
    /// retries truncates this query's pagination; partial results already
    /// collected are kept.
    pub async fn collect_for_query(
        &self,
        issn: &str,
        query: &str,
        date_from: Option<&str>,
        date_to: Option<&str>,
        rows: usize,
    ) -> Vec<WorkRecord> {
        let mut results = Vec::new();
        let mut offset = 0usize;

        loop {
            let page = match self
                .fetch_page(issn, query, date_from, date_to, offset, rows)
                .await
            {
                Ok(page) => page,
                Err(error) => {
                    warn!(
                        issn,
                        query,
                        offset,
                        collected = results.len(),
                        error = %error,
                        "page fetch failed after retries, keeping partial results"
                    );
                    break;
                }
            };

            if page.items.is_empty() {
                break;
            }

            let fetched = page.items.len();
            results.extend(page.items);
            offset += fetched;

            let total_reached = page
                .total_results
                .is_some_and(|total| offset as u64 >= total);
            if fetched < rows || total_reached {
                break;
            }

            tokio::time::sleep(self.page_delay).await;
        }

        debug!(issn, query, collected = results.len(), "query exhausted");
        results
    }

    /// Collects all (ISSN x query) combinations into a deduplicated index.
    ///
    /// One bounded-concurrency task runs per ISSN dimension, crossing every
    /// query text serially; each query's record batch is sent to the single
    /// accumulating owner of the [`DoiIndex`], which applies the merge rule.
    /// The collection phase counter advances once per completed dimension.
    pub async fn collect_unique(
        &self,
        issns: &[String],
        keywords: &[String],
        date_from: Option<&str>,
        date_to: Option<&str>,
        rows: usize,
        concurrency: usize,
        progress: &Arc<PhaseProgress>,
    ) -> DoiIndex {
        progress.add_queued(issns.len());

        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let (tx, mut rx) = mpsc::channel::<Vec<WorkRecord>>(concurrency.max(1));
        let mut handles = Vec::with_capacity(issns.len());

        for issn in issns {
            let client = self.clone();
            let issn = issn.clone();
            let keywords = keywords.to_vec();
            let date_from = date_from.map(str::to_string);
            let date_to = date_to.map(str::to_string);
            let tx = tx.clone();
            let progress = Arc::clone(progress);
            let semaphore = Arc::clone(&semaphore);

            handles.push(tokio::spawn(async move {
                // Acquired inside the task so the spawner reaches the
                // accumulator loop immediately; permit dropped on exit (RAII).
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };

                for keyword in &keywords {
                    let batch = client
                        .collect_for_query(
                            &issn,
                            keyword,
                            date_from.as_deref(),
                            date_to.as_deref(),
                            rows,
                        )
                        .await;
                    if !batch.is_empty() && tx.send(batch).await.is_err() {
                        return;
                    }
                }
                progress.mark_completed();
            }));
        }
        drop(tx);

        // Single accumulating owner: the conflict rule runs here and only here.
        let mut index = DoiIndex::new();
        while let Some(batch) = rx.recv().await {
            for record in batch {
                index.insert(record);
            }
        }

        for handle in handles {
            if let Err(error) = handle.await {
                warn!(error = %error, "collection task panicked");
            }
        }

        info!(unique_works = index.len(), "collection complete");
        index
    }
}
