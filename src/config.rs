// src/config.rs
use std::time::Duration;

/// Weights for the combined confidence score. ISRC overlap and name
/// similarity carry most of the signal; UPC, follower ratio and genre
/// overlap are weaker corroboration. The five weights sum to 1.0.
pub const ISRC_WEIGHT: f64 = 0.35;
pub const NAME_SIMILARITY_WEIGHT: f64 = 0.30;
pub const UPC_WEIGHT: f64 = 0.15;
pub const FOLLOWER_RATIO_WEIGHT: f64 = 0.10;
pub const GENRE_OVERLAP_WEIGHT: f64 = 0.10;

/// UPC match count at which the UPC sub-score saturates at 1.0.
pub const UPC_MATCH_CAP: usize = 5;

/// Neutral sub-score used when a signal is unavailable on either side.
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Floor for the follower-ratio sub-score, reached at >= 10x divergence.
pub const FOLLOWER_RATIO_FLOOR: f64 = 0.1;
pub const FOLLOWER_RATIO_MAX_DIVERGENCE: f64 = 10.0;

/// Providers cap batched ISRC/UPC lookups; larger inputs are chunked here.
pub const ISRC_LOOKUP_BATCH_SIZE: usize = 25;

/// Accept/reject/defer policy constants. The source system treats these as
/// tunable, so they live on a config struct rather than being hard-coded at
/// the call sites.
#[derive(Debug, Clone)]
pub struct MatchPolicyConfig {
    /// Candidates scoring below this are rejected outright.
    pub reject_threshold: f64,
    /// Candidates scoring at or above this are eligible for auto-confirm;
    /// anything between the thresholds is deferred to human review.
    pub auto_confirm_threshold: f64,
    /// Name similarity below this needs ISRC corroboration to survive.
    pub name_similarity_floor: f64,
    /// Minimum ISRC matches that can override a poor name match.
    pub isrc_corroboration_floor: usize,
}

impl Default for MatchPolicyConfig {
    fn default() -> Self {
        Self {
            reject_threshold: 0.3,
            auto_confirm_threshold: 0.8,
            name_similarity_floor: 0.5,
            isrc_corroboration_floor: 3,
        }
    }
}

/// Circuit breaker tuning, shared by all per-provider breakers in a registry.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures before a CLOSED breaker trips OPEN.
    pub failure_threshold: u32,
    /// How long an OPEN breaker waits before admitting a half-open probe.
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
        }
    }
}
