//! litscan core library
//!
//! litscan discovers scholarly works matching bibliographic filters,
//! deduplicates them by normalized DOI, and enriches each unique work with
//! availability signals gathered from several independent, unreliable
//! external sources, producing one normalized record per work.
//!
//! # Architecture
//!
//! - [`retry`] - Retry-with-backoff policy shared by every network call site
//! - [`config`] - Run configuration loading and validation
//! - [`crossref`] - Paginated works client and the collection engine
//! - [`index`] - DOI-keyed dedup index with the citation-count conflict rule
//! - [`checkpoint`] - Checkpoint store so collection can be skipped on resume
//! - [`probes`] - Publisher, mirror, and repository availability probes
//! - [`enrich`] - Bounded-concurrency enrichment and record aggregation
//! - [`pipeline`] - The driver sequencing the phases
//! - [`progress`] - Advisory per-phase counters and the terminal spinner
//! - [`export`] - JSON hand-off of the result list

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod checkpoint;
pub mod config;
pub mod crossref;
pub mod enrich;
pub mod export;
pub mod index;
pub mod pipeline;
pub mod probes;
pub mod progress;
pub mod retry;

// Re-export commonly used types
pub use config::{ConfigError, RunConfig, concurrency_limit};
pub use crossref::{CrossrefClient, FetchError, WorkRecord};
pub use enrich::{EnrichmentCoordinator, NormalizedRecord, aggregate};
pub use index::DoiIndex;
pub use pipeline::{Pipeline, PipelineError};
pub use probes::{
    AvailabilityResult, MirrorProbe, PirateProbeResult, ProbeError, PublisherProbe,
    RepositoryProbe, SecondaryRepoStatus,
};
pub use progress::{PhaseProgress, PipelineProgress, spawn_progress_ui};
pub use retry::RetryPolicy;
