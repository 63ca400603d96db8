// src/enrichment/merge.rs
use crate::models::{CreatorProfile, ProviderArtist};
use crate::storage::{FieldUpdate, ProfileField};

/// One row of the merge table: a field, what the record currently holds and
/// what the provider offered. The set-if-empty rule is applied uniformly to
/// every row, which is what keeps the non-clobber invariant auditable.
#[derive(Debug)]
pub struct FieldMerge<'a> {
    pub field: ProfileField,
    pub current: Option<&'a str>,
    pub candidate: Option<&'a str>,
}

impl<'a> FieldMerge<'a> {
    /// Set-if-empty: produce an update only when the stored value is absent
    /// or whitespace and the candidate is non-empty. Populated fields are
    /// user-curated or came from a trusted prior match; they are never
    /// overwritten.
    pub fn decide(&self) -> Option<FieldUpdate> {
        if !is_blank(self.current) {
            return None;
        }
        match self.candidate {
            Some(value) if !value.trim().is_empty() => Some(FieldUpdate {
                field: self.field,
                value: value.to_string(),
            }),
            _ => None,
        }
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

/// Build the full merge table for a profile against one provider response
/// and return the updates that survive the set-if-empty rule.
///
/// The YouTube URL row falls back to the YouTube-Music URL when the provider
/// carried no primary YouTube link.
pub fn plan_profile_updates(
    profile: &CreatorProfile,
    artist: &ProviderArtist,
) -> Vec<FieldUpdate> {
    let youtube_candidate = artist
        .links
        .youtube_url
        .as_deref()
        .or(artist.links.youtube_music_url.as_deref());

    let rows = [
        FieldMerge {
            field: ProfileField::AppleMusicId,
            current: profile.apple_music_id.as_deref(),
            candidate: artist.links.apple_music_id.as_deref(),
        },
        FieldMerge {
            field: ProfileField::AppleMusicUrl,
            current: profile.apple_music_url.as_deref(),
            candidate: artist.links.apple_music_url.as_deref(),
        },
        FieldMerge {
            field: ProfileField::DeezerId,
            current: profile.deezer_id.as_deref(),
            candidate: artist.links.deezer_id.as_deref(),
        },
        FieldMerge {
            field: ProfileField::TidalId,
            current: profile.tidal_id.as_deref(),
            candidate: artist.links.tidal_id.as_deref(),
        },
        FieldMerge {
            field: ProfileField::SoundcloudId,
            current: profile.soundcloud_id.as_deref(),
            candidate: artist.links.soundcloud_id.as_deref(),
        },
        FieldMerge {
            field: ProfileField::YoutubeMusicId,
            current: profile.youtube_music_id.as_deref(),
            candidate: artist.links.youtube_music_id.as_deref(),
        },
        FieldMerge {
            field: ProfileField::YoutubeMusicUrl,
            current: profile.youtube_music_url.as_deref(),
            candidate: artist.links.youtube_music_url.as_deref(),
        },
        FieldMerge {
            field: ProfileField::YoutubeUrl,
            current: profile.youtube_url.as_deref(),
            candidate: youtube_candidate,
        },
        FieldMerge {
            field: ProfileField::Bio,
            current: profile.bio.as_deref(),
            candidate: artist.bio.as_deref(),
        },
    ];

    rows.iter().filter_map(FieldMerge::decide).collect()
}
