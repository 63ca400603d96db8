// src/lib.rs
//! DSP identity-matching and enrichment core.
//!
//! Given a creator's known identity on one music platform, decide with
//! quantified confidence whether a candidate artist record on another
//! platform is the same real-world artist, then merge the discovered
//! identifiers and links into the creator's record without clobbering
//! user-curated data.
//!
//! The surrounding dashboard, scheduler, HTTP clients and storage engine are
//! external collaborators reached through the traits in [`providers`] and
//! [`storage`]; everything here is the matching, scoring, policy, resilience
//! and merge logic applied to their data.

pub mod breaker;
pub mod config;
pub mod enrichment;
pub mod links;
pub mod matching;
pub mod models;
pub mod providers;
pub mod results;
pub mod storage;

pub use breaker::{BreakerRegistry, CircuitBreaker, CircuitState};
pub use enrichment::processor::EnrichmentMergeProcessor;
pub use models::{
    ConfidenceBreakdown, CreatorProfile, LinkQuality, MatchCandidate, ProviderId, ProviderLink,
};
pub use results::EnrichmentResult;
