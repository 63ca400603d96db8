// src/models.rs
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

/// Digital service providers we can match against. Wire names are the
/// snake_case ids used in job payloads and stored link records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProviderId {
    #[serde(rename = "spotify")]
    Spotify,
    #[serde(rename = "apple_music")]
    AppleMusic,
    #[serde(rename = "deezer")]
    Deezer,
    #[serde(rename = "tidal")]
    Tidal,
    #[serde(rename = "soundcloud")]
    SoundCloud,
    #[serde(rename = "youtube_music")]
    YoutubeMusic,
    #[serde(rename = "youtube")]
    Youtube,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Spotify => "spotify",
            ProviderId::AppleMusic => "apple_music",
            ProviderId::Deezer => "deezer",
            ProviderId::Tidal => "tidal",
            ProviderId::SoundCloud => "soundcloud",
            ProviderId::YoutubeMusic => "youtube_music",
            ProviderId::Youtube => "youtube",
        }
    }

    /// Human-readable name used in diagnostics ("Apple Music not configured").
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderId::Spotify => "Spotify",
            ProviderId::AppleMusic => "Apple Music",
            ProviderId::Deezer => "Deezer",
            ProviderId::Tidal => "Tidal",
            ProviderId::SoundCloud => "SoundCloud",
            ProviderId::YoutubeMusic => "YouTube Music",
            ProviderId::Youtube => "YouTube",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spotify" => Ok(ProviderId::Spotify),
            "apple_music" => Ok(ProviderId::AppleMusic),
            "deezer" => Ok(ProviderId::Deezer),
            "tidal" => Ok(ProviderId::Tidal),
            "soundcloud" => Ok(ProviderId::SoundCloud),
            "youtube_music" => Ok(ProviderId::YoutubeMusic),
            "youtube" => Ok(ProviderId::Youtube),
            other => Err(PayloadError::UnknownProvider(other.to_string())),
        }
    }
}

/// Link quality tiers. The derive order gives the quality ordering we rely on
/// when selecting one link per provider: ManualOverride > Canonical >
/// SearchFallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LinkQuality {
    #[serde(rename = "search_fallback")]
    SearchFallback,
    #[serde(rename = "canonical")]
    Canonical,
    #[serde(rename = "manual_override")]
    ManualOverride,
}

/// A discovered or derived link to an artist page on one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderLink {
    pub provider: ProviderId,
    pub url: String,
    pub quality: LinkQuality,
    /// Where this link came from: "manual_override", "isrc_lookup",
    /// "search_url_synthesis".
    pub discovered_from: String,
    /// The provider-side catalog id, known only for canonical hits.
    pub provider_id: Option<String>,
}

/// Per-signal sub-scores, each in [0, 1]. Owned by a single MatchCandidate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBreakdown {
    pub isrc_match_score: f64,
    pub upc_match_score: f64,
    pub name_similarity_score: f64,
    pub follower_ratio_score: f64,
    pub genre_overlap_score: f64,
}

/// A candidate external artist, aggregated from raw per-track evidence and
/// scored. Never mutated after validation; rejected candidates are discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub provider: ProviderId,
    pub external_artist_id: String,
    pub external_artist_name: String,
    pub matching_isrcs: BTreeSet<String>,
    pub matching_upcs: BTreeSet<String>,
    pub total_tracks_checked: usize,
    pub confidence_score: f64,
    pub confidence_breakdown: ConfidenceBreakdown,
    pub should_auto_confirm: bool,
}

/// The external track a local track's ISRC resolved to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedTrack {
    pub id: String,
    pub title: String,
    pub artist_id: String,
    pub artist_name: String,
}

/// One raw per-track ISRC match event, as emitted by a provider catalog
/// lookup. Many weak events roll up into one MatchCandidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsrcMatchEvent {
    pub isrc: String,
    pub local_track_id: String,
    pub local_track_title: String,
    pub matched_track: MatchedTrack,
}

/// Minimal track reference used for link resolution.
#[derive(Debug, Clone)]
pub struct TrackRef {
    pub title: String,
    pub artist_name: String,
    pub isrc: Option<String>,
}

/// A track in the provider's catalog, normalized out of the raw payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderTrack {
    pub id: String,
    pub title: String,
    pub artist_id: String,
    pub artist_name: String,
    pub isrc: Option<String>,
    pub upc: Option<String>,
}

/// Non-DSP social links discovered alongside provider data. Normalization
/// and merge of these is owned by the ingestion collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialLink {
    pub platform: String,
    pub url: String,
}

/// Cross-platform identifier/link fields a provider response may carry.
/// Every per-provider adapter maps its raw payload into this one shape so
/// downstream code never branches on raw JSON keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DspLinks {
    pub apple_music_id: Option<String>,
    pub apple_music_url: Option<String>,
    pub deezer_id: Option<String>,
    pub tidal_id: Option<String>,
    pub soundcloud_id: Option<String>,
    pub youtube_music_id: Option<String>,
    pub youtube_music_url: Option<String>,
    pub youtube_url: Option<String>,
}

/// Canonical internal record for an artist as seen by one provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderArtist {
    pub external_id: String,
    pub name: String,
    pub url: Option<String>,
    pub follower_count: Option<u64>,
    pub genres: Vec<String>,
    pub bio: Option<String>,
    pub links: DspLinks,
    pub social_links: Vec<SocialLink>,
    pub tracks: Vec<ProviderTrack>,
}

/// A track stored on the local profile, used as join evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalTrack {
    pub id: String,
    pub title: String,
    pub isrc: Option<String>,
    pub upc: Option<String>,
}

/// The mutable record being enriched. Owned by the storage layer; the
/// processor may only fill fields that are currently empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatorProfile {
    pub id: Uuid,
    pub artist_name: String,
    pub apple_music_id: Option<String>,
    pub apple_music_url: Option<String>,
    pub deezer_id: Option<String>,
    pub tidal_id: Option<String>,
    pub soundcloud_id: Option<String>,
    pub youtube_music_id: Option<String>,
    pub youtube_music_url: Option<String>,
    pub youtube_url: Option<String>,
    pub bio: Option<String>,
    pub follower_count: Option<u64>,
    pub genres: Vec<String>,
    pub tracks: Vec<LocalTrack>,
}

/// Schema violations in a job payload. These indicate a caller bug and are
/// raised to the scheduler rather than folded into the job result.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("invalid creator profile id: {0}")]
    InvalidProfileId(String),
    #[error("invalid seed url: {0}")]
    InvalidSeedUrl(String),
    #[error("unknown provider id: {0}")]
    UnknownProvider(String),
    #[error("missing required payload field: {0}")]
    MissingField(&'static str),
}

/// Job input for profile enrichment: a known identity on one platform plus a
/// dedup key guaranteeing at-most-once effective processing on redelivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileEnrichmentPayload {
    pub creator_profile_id: Uuid,
    pub seed_url: String,
    pub dedup_key: String,
}

impl ProfileEnrichmentPayload {
    /// Schema-validation boundary: parse a raw scheduler payload, rejecting
    /// malformed ids/urls before any provider call is made.
    pub fn from_value(value: &Value) -> Result<Self, PayloadError> {
        let raw_id = value
            .get("creatorProfileId")
            .or_else(|| value.get("creator_profile_id"))
            .and_then(Value::as_str)
            .ok_or(PayloadError::MissingField("creatorProfileId"))?;
        let creator_profile_id = Uuid::parse_str(raw_id)
            .map_err(|_| PayloadError::InvalidProfileId(raw_id.to_string()))?;

        let seed_url = value
            .get("seedUrl")
            .or_else(|| value.get("seed_url"))
            .and_then(Value::as_str)
            .ok_or(PayloadError::MissingField("seedUrl"))?
            .to_string();

        let dedup_key = value
            .get("dedupKey")
            .or_else(|| value.get("dedup_key"))
            .and_then(Value::as_str)
            .ok_or(PayloadError::MissingField("dedupKey"))?
            .to_string();

        let payload = Self {
            creator_profile_id,
            seed_url,
            dedup_key,
        };
        payload.validate()?;
        Ok(payload)
    }

    pub fn validate(&self) -> Result<(), PayloadError> {
        Url::parse(&self.seed_url)
            .map_err(|_| PayloadError::InvalidSeedUrl(self.seed_url.clone()))?;
        Ok(())
    }
}

/// Job input for release/match enrichment: judge one candidate external
/// artist against the profile's stored catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseEnrichmentPayload {
    pub creator_profile_id: Uuid,
    pub match_id: String,
    pub provider: ProviderId,
    pub external_artist_id: String,
    pub dedup_key: String,
}

impl ReleaseEnrichmentPayload {
    pub fn from_value(value: &Value) -> Result<Self, PayloadError> {
        let raw_id = value
            .get("creatorProfileId")
            .or_else(|| value.get("creator_profile_id"))
            .and_then(Value::as_str)
            .ok_or(PayloadError::MissingField("creatorProfileId"))?;
        let creator_profile_id = Uuid::parse_str(raw_id)
            .map_err(|_| PayloadError::InvalidProfileId(raw_id.to_string()))?;

        let match_id = value
            .get("matchId")
            .or_else(|| value.get("match_id"))
            .and_then(Value::as_str)
            .ok_or(PayloadError::MissingField("matchId"))?
            .to_string();

        let provider_raw = value
            .get("providerId")
            .or_else(|| value.get("provider_id"))
            .and_then(Value::as_str)
            .ok_or(PayloadError::MissingField("providerId"))?;
        let provider = provider_raw.parse::<ProviderId>()?;

        let external_artist_id = value
            .get("externalArtistId")
            .or_else(|| value.get("external_artist_id"))
            .and_then(Value::as_str)
            .ok_or(PayloadError::MissingField("externalArtistId"))?
            .to_string();

        let dedup_key = value
            .get("dedupKey")
            .or_else(|| value.get("dedup_key"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("release:{}:{}", raw_id, match_id));

        Ok(Self {
            creator_profile_id,
            match_id,
            provider,
            external_artist_id,
            dedup_key,
        })
    }
}
