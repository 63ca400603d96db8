// src/matching/aggregate.rs
use std::collections::{BTreeSet, HashMap};

use log::debug;

use crate::models::{ConfidenceBreakdown, IsrcMatchEvent, MatchCandidate, ProviderId};

/// Roll raw per-track ISRC match events up into per-artist candidates.
///
/// Events are grouped by the matched track's artist id; the first event in a
/// group supplies the external artist name. `total_tracks_checked` is the
/// number of local tracks that were looked up, shared by every candidate so
/// the ISRC sub-score reflects coverage of the whole catalog.
///
/// The output is sorted descending by corroboration (distinct ISRCs), with
/// ties keeping first-seen order, so validation sees the strongest evidence
/// first. Confidence is left at zero; scoring happens downstream.
pub fn aggregate_isrc_matches(
    provider: ProviderId,
    events: &[IsrcMatchEvent],
    total_tracks_checked: usize,
) -> Vec<MatchCandidate> {
    let mut index_by_artist: HashMap<&str, usize> = HashMap::new();
    let mut candidates: Vec<MatchCandidate> = Vec::new();

    for event in events {
        let artist_id = event.matched_track.artist_id.as_str();
        match index_by_artist.get(artist_id) {
            Some(&idx) => {
                candidates[idx].matching_isrcs.insert(event.isrc.clone());
            }
            None => {
                index_by_artist.insert(artist_id, candidates.len());
                let mut isrcs = BTreeSet::new();
                isrcs.insert(event.isrc.clone());
                candidates.push(MatchCandidate {
                    provider,
                    external_artist_id: event.matched_track.artist_id.clone(),
                    external_artist_name: event.matched_track.artist_name.clone(),
                    matching_isrcs: isrcs,
                    matching_upcs: BTreeSet::new(),
                    total_tracks_checked,
                    confidence_score: 0.0,
                    confidence_breakdown: ConfidenceBreakdown::default(),
                    should_auto_confirm: false,
                });
            }
        }
    }

    // Vec::sort_by is stable, so equal-corroboration candidates keep their
    // first-seen order.
    candidates.sort_by(|a, b| b.matching_isrcs.len().cmp(&a.matching_isrcs.len()));

    debug!(
        "Aggregated {} ISRC match events into {} candidates for {}",
        events.len(),
        candidates.len(),
        provider
    );
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MatchedTrack;

    fn event(isrc: &str, artist_id: &str, artist_name: &str) -> IsrcMatchEvent {
        IsrcMatchEvent {
            isrc: isrc.to_string(),
            local_track_id: format!("local-{}", isrc),
            local_track_title: "Track".to_string(),
            matched_track: MatchedTrack {
                id: format!("ext-{}", isrc),
                title: "Track".to_string(),
                artist_id: artist_id.to_string(),
                artist_name: artist_name.to_string(),
            },
        }
    }

    #[test]
    fn test_most_corroborated_candidate_ranks_first() {
        let events = vec![
            event("USAAA0000001", "artist-a", "Artist A"),
            event("USAAA0000002", "artist-b", "Artist B"),
            event("USAAA0000003", "artist-b", "Artist B"),
        ];
        let candidates = aggregate_isrc_matches(ProviderId::AppleMusic, &events, 3);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].external_artist_id, "artist-b");
        assert_eq!(candidates[0].matching_isrcs.len(), 2);
        assert!(candidates[0].matching_isrcs.contains("USAAA0000002"));
        assert!(candidates[0].matching_isrcs.contains("USAAA0000003"));
        assert_eq!(candidates[1].external_artist_id, "artist-a");
        assert_eq!(candidates[1].matching_isrcs.len(), 1);
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let events = vec![
            event("USAAA0000001", "artist-a", "Artist A"),
            event("USAAA0000002", "artist-b", "Artist B"),
        ];
        let candidates = aggregate_isrc_matches(ProviderId::Deezer, &events, 2);
        assert_eq!(candidates[0].external_artist_id, "artist-a");
        assert_eq!(candidates[1].external_artist_id, "artist-b");
    }

    #[test]
    fn test_duplicate_isrcs_within_a_group_collapse() {
        let events = vec![
            event("USAAA0000001", "artist-a", "Artist A"),
            event("USAAA0000001", "artist-a", "Artist A"),
        ];
        let candidates = aggregate_isrc_matches(ProviderId::AppleMusic, &events, 2);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].matching_isrcs.len(), 1);
    }

    #[test]
    fn test_first_event_supplies_artist_name() {
        let events = vec![
            event("USAAA0000001", "artist-a", "Artist A"),
            IsrcMatchEvent {
                matched_track: MatchedTrack {
                    artist_name: "A. Artist (variant)".to_string(),
                    ..event("USAAA0000002", "artist-a", "").matched_track
                },
                ..event("USAAA0000002", "artist-a", "")
            },
        ];
        let candidates = aggregate_isrc_matches(ProviderId::AppleMusic, &events, 2);
        assert_eq!(candidates[0].external_artist_name, "Artist A");
    }

    #[test]
    fn test_empty_events_yield_no_candidates() {
        let candidates = aggregate_isrc_matches(ProviderId::Tidal, &[], 10);
        assert!(candidates.is_empty());
    }
}
