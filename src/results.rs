// src/results.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counts returned by the social-link ingestion collaborator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeCounts {
    pub inserted: usize,
    pub updated: usize,
}

/// Outcome of one enrichment job. A non-empty `errors` list is not a
/// failure: entries are per-field/per-step diagnostics, and the job as a
/// whole still succeeds unless a structural precondition failed first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrichmentResult {
    pub dsp_fields_updated: Vec<String>,
    pub social_links_inserted: usize,
    pub releases_enriched: usize,
    pub errors: Vec<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl EnrichmentResult {
    /// A zero-side-effect result carrying one diagnostic, used for the
    /// expected skip states (provider unavailable, record missing, no data).
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            errors: vec![reason.into()],
            completed_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// Stamp the completion time; called once when a job finishes.
    pub fn finish(mut self) -> Self {
        self.completed_at = Some(Utc::now());
        self
    }

    pub fn record_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    /// True when the job performed no writes at all.
    pub fn is_noop(&self) -> bool {
        self.dsp_fields_updated.is_empty()
            && self.social_links_inserted == 0
            && self.releases_enriched == 0
    }
}
