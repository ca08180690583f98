//! Bounded-concurrency enrichment of the DOI index.
//!
//! One task runs per unique work, probing the publisher, the configured
//! mirrors, and optionally the secondary repository, then folding the three
//! outcomes into one [`NormalizedRecord`] via the pure [`aggregate`]
//! function. Tasks are fully independent: a task that dies is logged and
//! replaced by a conservative record, never allowed to abort the batch.
//! Output order is first-completed-first-collected; callers needing
//! determinism re-sort by DOI.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Semaphore, mpsc};
use tracing::{info, warn};

use crate::index::DoiIndex;
use crate::probes::{
    AvailabilityResult, MirrorProbe, PirateProbeResult, ProbeError, PublisherProbe,
    RepositoryProbe, SecondaryRepoStatus,
};
use crate::progress::PhaseProgress;

use crate::crossref::record::{WorkAuthor, WorkRecord};

/// The enrichment output for one work; the shape the export collaborator
/// consumes. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedRecord {
    /// Publication year, when any date hint carried one.
    pub year: Option<i32>,
    /// Authors as "given family; given family; ...".
    pub authors: String,
    /// Display title.
    pub title: String,
    /// Normalized DOI (the index key).
    pub doi: String,
    /// Incoming-citation count.
    pub citations: u64,
    /// Canonical landing-page URL.
    pub link: String,
    /// "yes" when a publisher PDF was found or a license marker exists.
    pub available_on_site: String,
    /// "yes" / "maybe" / "no" from the secondary-repository probe.
    pub secondary_repo: String,
    /// "yes" when any mirror endpoint reported the work.
    pub pirates: String,
}

fn yes_no(flag: bool) -> String {
    if flag { "yes" } else { "no" }.to_string()
}

fn format_authors(authors: &[WorkAuthor]) -> String {
    authors
        .iter()
        .map(|author| {
            let given = author.given.as_deref().unwrap_or("").trim();
            let family = author.family.as_deref().unwrap_or("").trim();
            format!("{given} {family}").trim().to_string()
        })
        .filter(|name| !name.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Folds all probe outcomes for one work into its final record.
///
/// Pure: identical inputs always produce an identical record.
#[must_use]
pub fn aggregate(
    doi: &str,
    record: &WorkRecord,
    availability: &AvailabilityResult,
    pirates: &PirateProbeResult,
    repo: SecondaryRepoStatus,
) -> NormalizedRecord {
    let secondary_repo = match repo {
        SecondaryRepoStatus::Found => "yes",
        SecondaryRepoStatus::PossiblyFound | SecondaryRepoStatus::Unknown => "maybe",
        SecondaryRepoStatus::NotFound | SecondaryRepoStatus::NotChecked => "no",
    };

    NormalizedRecord {
        year: record.publication_year(),
        authors: format_authors(&record.author),
        title: record.display_title().to_string(),
        doi: doi.to_string(),
        citations: record.cited_by_count,
        link: record.url.clone(),
        available_on_site: yes_no(availability.publisher_pdf_found || availability.open_access),
        secondary_repo: secondary_repo.to_string(),
        pirates: yes_no(pirates.any_found),
    }
}

/// The conservative record emitted when a work's enrichment task dies.
fn fallback_record(doi: &str, record: &WorkRecord, check_secondary: bool) -> NormalizedRecord {
    let availability = AvailabilityResult {
        publisher_pdf_found: false,
        open_access: record.is_open_access(),
        links: record.link.clone(),
    };
    let repo = if check_secondary {
        SecondaryRepoStatus::Unknown
    } else {
        SecondaryRepoStatus::NotChecked
    };
    aggregate(doi, record, &availability, &PirateProbeResult::empty(), repo)
}

/// Fans enrichment out over a bounded worker pool.
#[derive(Debug)]
pub struct EnrichmentCoordinator {
    publisher: Arc<PublisherProbe>,
    mirror: Arc<MirrorProbe>,
    repository: Arc<RepositoryProbe>,
    concurrency: usize,
}

impl EnrichmentCoordinator {
    /// Creates a coordinator with default probes.
    ///
    /// # Arguments
    ///
    /// * `concurrency` - Worker-pool bound for enrichment tasks
    /// * `verify_publisher_links` - Whether the publisher probe live-checks
    ///   PDF candidates
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError`] if probe HTTP client construction fails.
    pub fn new(concurrency: usize, verify_publisher_links: bool) -> Result<Self, ProbeError> {
        Ok(Self::with_probes(
            concurrency,
            PublisherProbe::new(verify_publisher_links)?,
            MirrorProbe::new()?,
            RepositoryProbe::new()?,
        ))
    }

    /// Creates a coordinator from pre-built probes (tests inject wiremock
    /// targets here).
    #[must_use]
    pub fn with_probes(
        concurrency: usize,
        publisher: PublisherProbe,
        mirror: MirrorProbe,
        repository: RepositoryProbe,
    ) -> Self {
        Self {
            publisher: Arc::new(publisher),
            mirror: Arc::new(mirror),
            repository: Arc::new(repository),
            concurrency: concurrency.max(1),
        }
    }

    /// Enriches every work in the index into a normalized record.
    ///
    /// An empty `pirate_urls` list short-circuits the mirror probe with no
    /// network calls; `check_secondary == false` short-circuits the
    /// repository probe to `NotChecked`.
    pub async fn enrich(
        &self,
        index: &DoiIndex,
        pirate_urls: &[String],
        check_secondary: bool,
        progress: &Arc<PhaseProgress>,
    ) -> Vec<NormalizedRecord> {
        progress.add_queued(index.len());

        let endpoints: Arc<Vec<String>> = Arc::new(pirate_urls.to_vec());
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let (tx, mut rx) = mpsc::channel::<NormalizedRecord>(self.concurrency);
        let mut handles = Vec::with_capacity(index.len());

        for (doi, record) in index.iter() {
            let doi = doi.clone();
            let record = record.clone();
            let publisher = Arc::clone(&self.publisher);
            let mirror = Arc::clone(&self.mirror);
            let repository = Arc::clone(&self.repository);
            let endpoints = Arc::clone(&endpoints);
            let tx = tx.clone();
            let progress = Arc::clone(progress);
            let semaphore = Arc::clone(&semaphore);

            let key = doi.clone();
            handles.push((
                key,
                tokio::spawn(async move {
                    // Acquired inside the task so the spawner reaches the
                    // collection loop immediately; permit dropped on exit
                    // (RAII).
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        return;
                    };

                    let availability = publisher.check(&record).await;
                    let pirates = if endpoints.is_empty() {
                        PirateProbeResult::empty()
                    } else {
                        mirror.check(&doi, &endpoints).await
                    };
                    let repo = if check_secondary {
                        repository.check(&doi).await
                    } else {
                        SecondaryRepoStatus::NotChecked
                    };

                    let normalized = aggregate(&doi, &record, &availability, &pirates, repo);
                    if tx.send(normalized).await.is_ok() {
                        progress.mark_completed();
                    }
                }),
            ));
        }
        drop(tx);

        // First-completed-first-collected; no ordering guarantee.
        let mut results = Vec::with_capacity(index.len());
        while let Some(record) = rx.recv().await {
            results.push(record);
        }

        for (doi, handle) in handles {
            if let Err(error) = handle.await {
                warn!(doi = %doi, error = %error, "enrichment task died, emitting conservative record");
                if let Some(record) = index.get(&doi) {
                    results.push(fallback_record(&doi, record, check_secondary));
                    progress.mark_completed();
                }
            }
        }

        info!(records = results.len(), "enrichment complete");
        results
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::retry::RetryPolicy;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn work(json: serde_json::Value) -> WorkRecord {
        serde_json::from_value(json).unwrap()
    }

    fn plain_availability() -> AvailabilityResult {
        AvailabilityResult {
            publisher_pdf_found: false,
            open_access: false,
            links: Vec::new(),
        }
    }

    fn instant_retry() -> RetryPolicy {
        RetryPolicy::new(2, Duration::ZERO, (1.0, 1.0))
    }

    fn scan_only_coordinator(concurrency: usize) -> EnrichmentCoordinator {
        EnrichmentCoordinator::with_probes(
            concurrency,
            PublisherProbe::new(false).unwrap().with_retry_policy(instant_retry()),
            MirrorProbe::new().unwrap().with_retry_policy(instant_retry()),
            RepositoryProbe::with_search_base("http://192.0.2.1:9/search?q=")
                .unwrap()
                .with_retry_policy(instant_retry()),
        )
    }

    // ==================== Aggregation Tests ====================

    #[test]
    fn test_aggregate_maps_all_fields() {
        let record = work(serde_json::json!({
            "DOI": "10.1/X",
            "title": ["Paper Title"],
            "author": [
                {"given": "John", "family": "Smith"},
                {"family": "Consortium"}
            ],
            "is-referenced-by-count": 12,
            "published": {"date-parts": [[2023, 4]]},
            "URL": "https://doi.org/10.1/X"
        }));
        let availability = AvailabilityResult {
            publisher_pdf_found: true,
            open_access: false,
            links: Vec::new(),
        };
        let pirates = PirateProbeResult {
            endpoints: std::collections::HashMap::from([("m".to_string(), true)]),
            any_found: true,
        };

        let normalized = aggregate(
            "10.1/x",
            &record,
            &availability,
            &pirates,
            SecondaryRepoStatus::Found,
        );

        assert_eq!(normalized.year, Some(2023));
        assert_eq!(normalized.authors, "John Smith; Consortium");
        assert_eq!(normalized.title, "Paper Title");
        assert_eq!(normalized.doi, "10.1/x");
        assert_eq!(normalized.citations, 12);
        assert_eq!(normalized.link, "https://doi.org/10.1/X");
        assert_eq!(normalized.available_on_site, "yes");
        assert_eq!(normalized.secondary_repo, "yes");
        assert_eq!(normalized.pirates, "yes");
    }

    #[test]
    fn test_aggregate_is_deterministic() {
        let record = work(serde_json::json!({"DOI": "10.1/x", "is-referenced-by-count": 3}));
        let availability = plain_availability();
        let pirates = PirateProbeResult::empty();

        let first = aggregate("10.1/x", &record, &availability, &pirates, SecondaryRepoStatus::Unknown);
        let second = aggregate("10.1/x", &record, &availability, &pirates, SecondaryRepoStatus::Unknown);

        assert_eq!(first, second);
    }

    #[test]
    fn test_aggregate_available_on_site_from_license_alone() {
        let record = work(serde_json::json!({
            "DOI": "10.1/x",
            "license": [{"URL": "https://creativecommons.org/licenses/by/4.0/"}]
        }));
        let availability = AvailabilityResult {
            publisher_pdf_found: false,
            open_access: true,
            links: Vec::new(),
        };

        let normalized = aggregate(
            "10.1/x",
            &record,
            &availability,
            &PirateProbeResult::empty(),
            SecondaryRepoStatus::NotChecked,
        );

        assert_eq!(normalized.available_on_site, "yes");
    }

    #[test]
    fn test_aggregate_secondary_repo_status_mapping() {
        let record = work(serde_json::json!({"DOI": "10.1/x"}));
        let availability = plain_availability();
        let pirates = PirateProbeResult::empty();

        let status_of = |repo| {
            aggregate("10.1/x", &record, &availability, &pirates, repo).secondary_repo
        };

        assert_eq!(status_of(SecondaryRepoStatus::Found), "yes");
        assert_eq!(status_of(SecondaryRepoStatus::PossiblyFound), "maybe");
        assert_eq!(status_of(SecondaryRepoStatus::Unknown), "maybe");
        assert_eq!(status_of(SecondaryRepoStatus::NotFound), "no");
        assert_eq!(status_of(SecondaryRepoStatus::NotChecked), "no");
    }

    #[test]
    fn test_format_authors_skips_empty_entries() {
        let record = work(serde_json::json!({
            "DOI": "10.1/x",
            "author": [
                {"given": "  ", "family": ""},
                {"given": "Ada", "family": "Lovelace"}
            ]
        }));
        assert_eq!(format_authors(&record.author), "Ada Lovelace");
    }

    #[test]
    fn test_normalized_record_serializes_contract_field_names() {
        let record = work(serde_json::json!({"DOI": "10.1/x"}));
        let normalized = aggregate(
            "10.1/x",
            &record,
            &plain_availability(),
            &PirateProbeResult::empty(),
            SecondaryRepoStatus::NotChecked,
        );

        let value = serde_json::to_value(&normalized).unwrap();
        for field in [
            "year",
            "authors",
            "title",
            "doi",
            "citations",
            "link",
            "available_on_site",
            "secondary_repo",
            "pirates",
        ] {
            assert!(value.get(field).is_some(), "missing field {field}");
        }
    }

    // ==================== Coordinator Tests ====================

    fn index_of(records: Vec<WorkRecord>) -> DoiIndex {
        let mut index = DoiIndex::new();
        for record in records {
            index.insert(record);
        }
        index
    }

    #[tokio::test]
    async fn test_enrich_emits_one_record_per_entry() {
        let index = index_of(vec![
            work(serde_json::json!({"DOI": "10.1/a", "title": ["A"]})),
            work(serde_json::json!({"DOI": "10.1/b", "title": ["B"]})),
            work(serde_json::json!({"DOI": "10.1/c", "title": ["C"]})),
        ]);

        let coordinator = scan_only_coordinator(2);
        let progress = Arc::new(PhaseProgress::default());
        let mut records = coordinator.enrich(&index, &[], false, &progress).await;

        assert_eq!(records.len(), 3);
        records.sort_by(|a, b| a.doi.cmp(&b.doi));
        assert_eq!(records[0].doi, "10.1/a");
        assert_eq!(progress.queued(), 3);
        assert_eq!(progress.completed(), 3);
    }

    #[tokio::test]
    async fn test_enrich_empty_pirate_list_yields_all_no() {
        let index = index_of(vec![
            work(serde_json::json!({"DOI": "10.1/a"})),
            work(serde_json::json!({"DOI": "10.1/b"})),
        ]);

        let coordinator = scan_only_coordinator(4);
        let progress = Arc::new(PhaseProgress::default());
        let records = coordinator.enrich(&index, &[], false, &progress).await;

        assert!(records.iter().all(|r| r.pirates == "no"));
        assert!(records.iter().all(|r| r.secondary_repo == "no"));
    }

    #[tokio::test]
    async fn test_enrich_probes_mirrors_and_repository() {
        let mirror_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("has 10.1/a and 10.1/b"))
            .mount(&mirror_server)
            .await;

        let repo_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>10.1/a</html>"))
            .mount(&repo_server)
            .await;

        let coordinator = EnrichmentCoordinator::with_probes(
            2,
            PublisherProbe::new(false).unwrap().with_retry_policy(instant_retry()),
            MirrorProbe::new().unwrap().with_retry_policy(instant_retry()),
            RepositoryProbe::with_search_base(format!("{}/search?q=", repo_server.uri()))
                .unwrap()
                .with_retry_policy(instant_retry()),
        );

        let index = index_of(vec![
            work(serde_json::json!({"DOI": "10.1/a"})),
            work(serde_json::json!({"DOI": "10.1/b"})),
        ]);
        let endpoints = vec![format!("{}/", mirror_server.uri())];
        let progress = Arc::new(PhaseProgress::default());
        let mut records = coordinator.enrich(&index, &endpoints, true, &progress).await;
        records.sort_by(|a, b| a.doi.cmp(&b.doi));

        assert_eq!(records[0].pirates, "yes");
        assert_eq!(records[0].secondary_repo, "yes"); // page mentions 10.1/a
        assert_eq!(records[1].pirates, "yes");
        // Page only mentions 10.1/a, so 10.1/b loads clean without its DOI.
        assert_eq!(records[1].secondary_repo, "maybe");
    }

    #[tokio::test]
    async fn test_enrich_empty_index_is_empty_output() {
        let coordinator = scan_only_coordinator(2);
        let progress = Arc::new(PhaseProgress::default());
        let records = coordinator.enrich(&DoiIndex::new(), &[], false, &progress).await;
        assert!(records.is_empty());
    }

    #[test]
    fn test_fallback_record_is_conservative() {
        let record = work(serde_json::json!({
            "DOI": "10.1/x",
            "title": ["T"],
            "is-referenced-by-count": 4
        }));

        let fallback = fallback_record("10.1/x", &record, true);

        assert_eq!(fallback.available_on_site, "no");
        assert_eq!(fallback.pirates, "no");
        assert_eq!(fallback.secondary_repo, "maybe"); // Unknown when checking was on
        assert_eq!(fallback.citations, 4);

        let fallback = fallback_record("10.1/x", &record, false);
        assert_eq!(fallback.secondary_repo, "no"); // NotChecked when off
    }
}
