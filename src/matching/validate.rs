// src/matching/validate.rs
use log::debug;

use crate::config::MatchPolicyConfig;
use crate::models::MatchCandidate;

pub const REASON_LOW_CONFIDENCE: &str = "Confidence score too low";
pub const REASON_NAME_MISMATCH: &str = "Name mismatch with few ISRC matches";

/// Outcome of the accept/reject policy for one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub reason: Option<String>,
}

impl ValidationOutcome {
    fn accept() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    fn reject(reason: &str) -> Self {
        Self {
            valid: false,
            reason: Some(reason.to_string()),
        }
    }
}

/// Apply the accept/reject policy to a scored candidate. Pure decision
/// function: no state, no external calls. The local artist is not passed in
/// again; its name was already compared during scoring and arrives as the
/// candidate's `name_similarity_score`.
///
/// Rules, in order:
/// 1. Combined confidence below the reject threshold fails outright.
/// 2. A poor name match fails unless enough ISRC matches corroborate it —
///    title translations and name variants make a handful of strong ISRC
///    hits more trustworthy than the display name.
/// 3. Everything else is accepted. Acceptance does not imply auto-confirm;
///    that flag was set against a separate, higher threshold during scoring.
pub fn validate_candidate(
    candidate: &MatchCandidate,
    policy: &MatchPolicyConfig,
) -> ValidationOutcome {
    if candidate.confidence_score < policy.reject_threshold {
        debug!(
            "Rejecting candidate {} ({}): confidence {:.3} below {:.3}",
            candidate.external_artist_id,
            candidate.provider,
            candidate.confidence_score,
            policy.reject_threshold
        );
        return ValidationOutcome::reject(REASON_LOW_CONFIDENCE);
    }

    let name_similarity = candidate.confidence_breakdown.name_similarity_score;
    if name_similarity < policy.name_similarity_floor
        && candidate.matching_isrcs.len() < policy.isrc_corroboration_floor
    {
        debug!(
            "Rejecting candidate {} ({}): name similarity {:.3} with only {} ISRC matches",
            candidate.external_artist_id,
            candidate.provider,
            name_similarity,
            candidate.matching_isrcs.len()
        );
        return ValidationOutcome::reject(REASON_NAME_MISMATCH);
    }

    ValidationOutcome::accept()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use crate::models::{ConfidenceBreakdown, ProviderId};

    fn candidate(confidence: f64, name_similarity: f64, isrc_count: usize) -> MatchCandidate {
        MatchCandidate {
            provider: ProviderId::AppleMusic,
            external_artist_id: "ext-1".into(),
            external_artist_name: "Someone".into(),
            matching_isrcs: (0..isrc_count).map(|i| format!("USISRC{:07}", i)).collect(),
            matching_upcs: BTreeSet::new(),
            total_tracks_checked: 10,
            confidence_score: confidence,
            confidence_breakdown: ConfidenceBreakdown {
                name_similarity_score: name_similarity,
                ..Default::default()
            },
            should_auto_confirm: false,
        }
    }

    #[test]
    fn test_low_confidence_is_rejected() {
        let outcome = validate_candidate(&candidate(0.2, 0.9, 5), &MatchPolicyConfig::default());
        assert!(!outcome.valid);
        assert_eq!(outcome.reason.as_deref(), Some(REASON_LOW_CONFIDENCE));
    }

    #[test]
    fn test_name_mismatch_with_few_isrcs_is_rejected() {
        let outcome = validate_candidate(&candidate(0.45, 0.2, 1), &MatchPolicyConfig::default());
        assert!(!outcome.valid);
        assert_eq!(outcome.reason.as_deref(), Some(REASON_NAME_MISMATCH));
    }

    #[test]
    fn test_name_mismatch_with_strong_isrc_corroboration_is_accepted() {
        let outcome = validate_candidate(&candidate(0.5, 0.2, 3), &MatchPolicyConfig::default());
        assert!(outcome.valid);
        assert!(outcome.reason.is_none());
    }

    #[test]
    fn test_matching_name_and_high_confidence_is_accepted() {
        let outcome = validate_candidate(&candidate(0.85, 0.95, 2), &MatchPolicyConfig::default());
        assert!(outcome.valid);
    }

    #[test]
    fn test_acceptance_does_not_set_auto_confirm() {
        let c = candidate(0.5, 0.9, 2);
        let outcome = validate_candidate(&c, &MatchPolicyConfig::default());
        assert!(outcome.valid);
        assert!(!c.should_auto_confirm);
    }
}
