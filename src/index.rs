//! Deduplicated index of collected works, keyed by normalized DOI.
//!
//! Conflict rule: when two records share a normalized DOI, the one with the
//! strictly greater citation count wins; ties keep the first-seen record.
//! Records without a DOI are dropped.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::crossref::record::WorkRecord;

/// Mapping from normalized DOI to a single [`WorkRecord`].
///
/// Serializes transparently as a JSON object, which is also the checkpoint
/// file format.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DoiIndex {
    entries: HashMap<String, WorkRecord>,
}

impl DoiIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of unique works.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no works.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up a record by normalized DOI.
    #[must_use]
    pub fn get(&self, normalized_doi: &str) -> Option<&WorkRecord> {
        self.entries.get(normalized_doi)
    }

    /// Iterates over `(normalized DOI, record)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &WorkRecord)> {
        self.entries.iter()
    }

    /// Folds one record in under the conflict rule.
    ///
    /// Returns `true` when the record was inserted or replaced an existing
    /// entry; `false` when it was dropped (no DOI, or it lost the conflict).
    pub fn insert(&mut self, record: WorkRecord) -> bool {
        let key = record.normalized_doi();
        if key.is_empty() {
            trace!("dropping record without DOI");
            return false;
        }
        match self.entries.get(&key) {
            None => {
                self.entries.insert(key, record);
                true
            }
            Some(existing) if record.cited_by_count > existing.cited_by_count => {
                trace!(
                    doi = %key,
                    old_citations = existing.cited_by_count,
                    new_citations = record.cited_by_count,
                    "replacing duplicate with higher-cited record"
                );
                self.entries.insert(key, record);
                true
            }
            Some(_) => false,
        }
    }

    /// Merges another index into this one under the same conflict rule.
    pub fn merge(&mut self, other: Self) {
        for record in other.entries.into_values() {
            self.insert(record);
        }
    }

    /// A sub-index holding at most `limit` entries, in arbitrary order.
    ///
    /// Used by the sampling harness to enrich a small slice of a large
    /// checkpoint.
    #[must_use]
    pub fn sample(&self, limit: usize) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .take(limit)
                .map(|(key, record)| (key.clone(), record.clone()))
                .collect(),
        }
    }
}

impl IntoIterator for DoiIndex {
    type Item = (String, WorkRecord);
    type IntoIter = std::collections::hash_map::IntoIter<String, WorkRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
