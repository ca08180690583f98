//! Pipeline driver: checkpoint load, collection, checkpoint save, and
//! enrichment, in that order.
//!
//! Collection fully completes (or is skipped in favor of the checkpoint)
//! before enrichment begins; the two fan-out phases share one worker-pool
//! bound. The driver returns the normalized record list and leaves
//! serialization to the export collaborator.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::checkpoint;
use crate::config::{RunConfig, concurrency_limit};
use crate::crossref::{CrossrefClient, FetchError};
use crate::enrich::{EnrichmentCoordinator, NormalizedRecord};
use crate::index::DoiIndex;
use crate::probes::ProbeError;
use crate::progress::PipelineProgress;

/// Errors that abort a pipeline run before any per-item work starts.
///
/// Per-item failures never surface here; they degrade individual records.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The bibliographic client could not be constructed.
    #[error("crossref client: {0}")]
    Crossref(#[from] FetchError),

    /// A probe client could not be constructed.
    #[error("probe setup: {0}")]
    Probe(#[from] ProbeError),
}

/// Sequences one collection-and-enrichment run.
#[derive(Debug)]
pub struct Pipeline {
    config: RunConfig,
    progress: Arc<PipelineProgress>,
    refresh: bool,
    sample_limit: Option<usize>,
}

impl Pipeline {
    /// Creates a driver for `config`.
    #[must_use]
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            progress: Arc::new(PipelineProgress::new()),
            refresh: false,
            sample_limit: None,
        }
    }

    /// Forces re-collection even when a checkpoint exists.
    #[must_use]
    pub fn refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    /// Enriches at most `limit` checkpointed works (sampling harness).
    #[must_use]
    pub fn with_sample_limit(mut self, limit: Option<usize>) -> Self {
        self.sample_limit = limit;
        self
    }

    /// The per-phase counters an external progress reporter may poll.
    #[must_use]
    pub fn progress(&self) -> Arc<PipelineProgress> {
        Arc::clone(&self.progress)
    }

    /// Runs the pipeline with components built from the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] only for setup failures; see `run_with`.
    pub async fn run(&self) -> Result<Vec<NormalizedRecord>, PipelineError> {
        let client = CrossrefClient::new(self.config.mailto.clone())?;
        let coordinator =
            EnrichmentCoordinator::new(concurrency_limit(), self.config.verify_publisher_links)?;
        Ok(self.run_with(&client, &coordinator).await)
    }

    /// Runs the pipeline with injected components (tests use wiremock-backed
    /// clients here).
    pub async fn run_with(
        &self,
        client: &CrossrefClient,
        coordinator: &EnrichmentCoordinator,
    ) -> Vec<NormalizedRecord> {
        let worker_bound = concurrency_limit();

        let mut index = if self.refresh {
            DoiIndex::new()
        } else {
            checkpoint::load(&self.config.doi_cache_path)
        };

        if index.is_empty() {
            info!(
                issns = self.config.issns.len(),
                keywords = self.config.keywords.len(),
                "collecting works"
            );
            index = client
                .collect_unique(
                    &self.config.issns,
                    &self.config.keywords,
                    self.config.date_from.as_deref(),
                    self.config.date_to.as_deref(),
                    self.config.crossref_rows,
                    worker_bound,
                    &self.progress.collection,
                )
                .await;

            if let Err(error) = checkpoint::save(&index, &self.config.doi_cache_path) {
                warn!(error = %error, "checkpoint save failed, continuing with in-memory index");
            }
        } else {
            info!(works = index.len(), "using checkpointed collection");
        }

        info!(unique_works = index.len(), "collection phase done");

        let index = match self.sample_limit {
            Some(limit) => index.sample(limit),
            None => index,
        };

        coordinator
            .enrich(
                &index,
                &self.config.pirate_urls,
                self.config.check_secondary,
                &self.progress.enrichment,
            )
            .await
    }
}
