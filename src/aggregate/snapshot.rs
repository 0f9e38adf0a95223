// src/aggregate/snapshot.rs
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::provenance::ProvenanceTag;
use super::types::{Category, FetchResult};

/// One source's slot in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceEntry {
    #[serde(flatten)]
    pub result: FetchResult,
    /// Set only for fulfilled results of classified sources.
    pub provenance: Option<ProvenanceTag>,
}

impl SourceEntry {
    pub fn is_fallback(&self) -> bool {
        self.provenance.as_ref().is_some_and(|p| !p.is_live)
    }
}

/// Fully assembled result of one refresh cycle. Holds exactly one entry per configured
/// source; a failed source holds its failure, never an absence.
#[derive(Debug, Clone, Serialize)]
pub struct AggregatedSnapshot {
    pub generation: u64,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    entries: BTreeMap<Category, SourceEntry>,
}

impl AggregatedSnapshot {
    pub(crate) fn assemble(
        generation: u64,
        user_id: String,
        entries: impl IntoIterator<Item = (Category, SourceEntry)>,
    ) -> Self {
        Self {
            generation,
            user_id,
            created_at: Utc::now(),
            entries: entries.into_iter().collect(),
        }
    }

    pub fn get(&self, category: Category) -> Option<&SourceEntry> {
        self.entries.get(&category)
    }

    pub fn entries(&self) -> impl Iterator<Item = (Category, &SourceEntry)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn fulfilled_count(&self) -> usize {
        self.entries
            .values()
            .filter(|e| e.result.is_fulfilled())
            .count()
    }

    pub fn rejected_count(&self) -> usize {
        self.len() - self.fulfilled_count()
    }

    pub fn fallback_count(&self) -> usize {
        self.entries.values().filter(|e| e.is_fallback()).count()
    }

    /// At least one source was rejected.
    pub fn is_degraded(&self) -> bool {
        self.rejected_count() > 0
    }

    /// Equal up to generation and creation time.
    pub fn content_eq(&self, other: &AggregatedSnapshot) -> bool {
        self.user_id == other.user_id && self.entries == other.entries
    }
}
