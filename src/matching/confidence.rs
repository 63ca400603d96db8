// src/matching/confidence.rs
use std::collections::HashSet;

use crate::config::{
    self, MatchPolicyConfig, FOLLOWER_RATIO_FLOOR, FOLLOWER_RATIO_MAX_DIVERGENCE, NEUTRAL_SCORE,
    UPC_MATCH_CAP,
};
use crate::matching::name::artist_name_similarity;
use crate::models::{ConfidenceBreakdown, MatchCandidate};

/// ISRC overlap sub-score: sqrt of the match rate, so partial overlap is
/// rewarded superlinearly at low rates and saturates at 1.0 for a full match.
pub fn calculate_isrc_match_score(matched: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (matched as f64 / total as f64).sqrt().min(1.0)
}

/// UPC match sub-score: diminishing returns up to the cap, 0 for no matches.
pub fn calculate_upc_match_score(count: usize, cap: usize) -> f64 {
    if count == 0 || cap == 0 {
        return 0.0;
    }
    (count as f64 / cap as f64).sqrt().min(1.0)
}

/// Follower-count plausibility. Neutral (0.5) when either side is unknown,
/// 1.0 for equal counts, decaying linearly to the 0.1 floor at >= 10x
/// divergence in either direction. Zero against non-zero counts as maximal
/// divergence.
pub fn calculate_follower_ratio_score(local: Option<u64>, external: Option<u64>) -> f64 {
    let (local, external) = match (local, external) {
        (Some(l), Some(e)) => (l, e),
        _ => return NEUTRAL_SCORE,
    };
    if local == external {
        return 1.0;
    }
    if local == 0 || external == 0 {
        return FOLLOWER_RATIO_FLOOR;
    }
    let ratio = local.max(external) as f64 / local.min(external) as f64;
    if ratio >= FOLLOWER_RATIO_MAX_DIVERGENCE {
        return FOLLOWER_RATIO_FLOOR;
    }
    let span = FOLLOWER_RATIO_MAX_DIVERGENCE - 1.0;
    1.0 - (ratio - 1.0) / span * (1.0 - FOLLOWER_RATIO_FLOOR)
}

fn normalized_genre_set(genres: &[String]) -> HashSet<String> {
    genres
        .iter()
        .map(|g| g.trim().to_lowercase())
        .filter(|g| !g.is_empty())
        .collect()
}

/// Jaccard index over case-folded genre sets; neutral (0.5) when either side
/// has no genre data.
pub fn calculate_genre_overlap_score(local: &[String], external: &[String]) -> f64 {
    let local_set = normalized_genre_set(local);
    let external_set = normalized_genre_set(external);
    if local_set.is_empty() || external_set.is_empty() {
        return NEUTRAL_SCORE;
    }
    let intersection = local_set.intersection(&external_set).count();
    let union = local_set.union(&external_set).count();
    intersection as f64 / union as f64
}

/// Signals about the local artist used when scoring a candidate.
#[derive(Debug, Clone, Default)]
pub struct LocalArtistSignals {
    pub name: String,
    pub follower_count: Option<u64>,
    pub genres: Vec<String>,
}

/// Signals about the external candidate artist.
#[derive(Debug, Clone, Default)]
pub struct ExternalArtistSignals {
    pub name: String,
    pub follower_count: Option<u64>,
    pub genres: Vec<String>,
}

/// Combine the five sub-scores into one weighted confidence score. The
/// weights are fixed design constants in config.rs, not tuned at runtime.
pub fn combine_scores(breakdown: &ConfidenceBreakdown) -> f64 {
    breakdown.isrc_match_score * config::ISRC_WEIGHT
        + breakdown.name_similarity_score * config::NAME_SIMILARITY_WEIGHT
        + breakdown.upc_match_score * config::UPC_WEIGHT
        + breakdown.follower_ratio_score * config::FOLLOWER_RATIO_WEIGHT
        + breakdown.genre_overlap_score * config::GENRE_OVERLAP_WEIGHT
}

/// Fill in a candidate's confidence breakdown, combined score and
/// auto-confirm flag from the raw evidence already aggregated onto it.
pub fn score_candidate(
    candidate: &mut MatchCandidate,
    local: &LocalArtistSignals,
    external: &ExternalArtistSignals,
    policy: &MatchPolicyConfig,
) {
    let breakdown = ConfidenceBreakdown {
        isrc_match_score: calculate_isrc_match_score(
            candidate.matching_isrcs.len(),
            candidate.total_tracks_checked,
        ),
        upc_match_score: calculate_upc_match_score(candidate.matching_upcs.len(), UPC_MATCH_CAP),
        name_similarity_score: artist_name_similarity(&local.name, &external.name),
        follower_ratio_score: calculate_follower_ratio_score(
            local.follower_count,
            external.follower_count,
        ),
        genre_overlap_score: calculate_genre_overlap_score(&local.genres, &external.genres),
    };
    candidate.confidence_score = combine_scores(&breakdown);
    candidate.should_auto_confirm = candidate.confidence_score >= policy.auto_confirm_threshold;
    candidate.confidence_breakdown = breakdown;
}
