// src/providers.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use serde_json::Value;

use crate::config::ISRC_LOOKUP_BATCH_SIZE;
use crate::models::{DspLinks, ProviderArtist, ProviderId, ProviderTrack, SocialLink};

/// Contract the enrichment core consumes for each configured provider.
/// Implementations own the HTTP plumbing, auth and timeouts; the core only
/// sees parsed results.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn provider(&self) -> ProviderId;

    /// Cheap health probe used by pre-flight checks.
    async fn is_available(&self) -> bool;

    /// Resolve a seed identifier (e.g. a profile URL on this provider) to
    /// the artist record, or None when the provider has nothing for it.
    async fn fetch_by_seed(&self, seed_url: &str) -> Result<Option<ProviderArtist>>;

    /// Fetch an artist plus catalog by the provider's own artist id.
    async fn fetch_by_artist_id(&self, external_id: &str) -> Result<Option<ProviderArtist>>;

    /// Batched catalog lookup by ISRC. Implementations may assume the input
    /// respects ISRC_LOOKUP_BATCH_SIZE; use `lookup_isrcs_chunked` for
    /// arbitrary sizes.
    async fn lookup_isrcs(&self, isrcs: &[String]) -> Result<Vec<ProviderTrack>>;
}

/// Chunk an ISRC list to the provider batch ceiling and concatenate the
/// results. Providers reject oversized batches, so the chunking lives in the
/// core rather than in each client.
pub async fn lookup_isrcs_chunked(
    client: &dyn ProviderClient,
    isrcs: &[String],
) -> Result<Vec<ProviderTrack>> {
    let mut tracks = Vec::new();
    for chunk in isrcs.chunks(ISRC_LOOKUP_BATCH_SIZE) {
        let mut batch = client
            .lookup_isrcs(chunk)
            .await
            .with_context(|| format!("{} ISRC batch lookup failed", client.provider()))?;
        tracks.append(&mut batch);
    }
    debug!(
        "Looked up {} ISRCs against {} in {} batches, {} hits",
        isrcs.len(),
        client.provider(),
        isrcs.len().div_ceil(ISRC_LOOKUP_BATCH_SIZE),
        tracks.len()
    );
    Ok(tracks)
}

/// Map a provider's raw JSON payload to the canonical internal record.
/// Provider payloads are duck-typed (key casing varies, fields come and go),
/// so every shape difference is absorbed here and scoring logic never
/// branches on raw keys.
pub fn adapt_provider_payload(provider: ProviderId, value: &Value) -> Option<ProviderArtist> {
    match provider {
        ProviderId::AppleMusic => adapt_apple_music(value),
        ProviderId::Deezer => adapt_deezer(value),
        ProviderId::Tidal => adapt_tidal(value),
        ProviderId::SoundCloud => adapt_soundcloud(value),
        ProviderId::YoutubeMusic => adapt_youtube_music(value),
        // Spotify is the seed side of matching; plain YouTube has no
        // artist-catalog API shape of its own.
        ProviderId::Spotify | ProviderId::Youtube => None,
    }
}

/// First present string under any of the given keys, accepting numbers too
/// (Deezer ids are numeric).
fn str_field(value: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        match value.get(*key) {
            Some(Value::String(s)) if !s.trim().is_empty() => return Some(s.clone()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

fn u64_field(value: &Value, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|key| value.get(*key).and_then(Value::as_u64))
}

fn string_array(value: &Value, keys: &[&str]) -> Vec<String> {
    for key in keys {
        if let Some(Value::Array(items)) = value.get(*key) {
            return items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
        }
    }
    Vec::new()
}

/// Social links ride along in several shapes: an array of objects with
/// {platform|service|type, url} keys, or a flat map of platform -> url.
fn social_links(value: &Value, keys: &[&str]) -> Vec<SocialLink> {
    for key in keys {
        match value.get(*key) {
            Some(Value::Array(items)) => {
                return items
                    .iter()
                    .filter_map(|item| {
                        let platform = str_field(item, &["platform", "service", "type", "network"])?;
                        let url = str_field(item, &["url", "link", "href"])?;
                        Some(SocialLink { platform: platform.to_lowercase(), url })
                    })
                    .collect();
            }
            Some(Value::Object(map)) => {
                return map
                    .iter()
                    .filter_map(|(platform, url)| {
                        url.as_str().map(|url| SocialLink {
                            platform: platform.to_lowercase(),
                            url: url.to_string(),
                        })
                    })
                    .collect();
            }
            _ => {}
        }
    }
    Vec::new()
}

fn tracks_array(value: &Value, keys: &[&str], artist_id: &str, artist_name: &str) -> Vec<ProviderTrack> {
    for key in keys {
        if let Some(Value::Array(items)) = value.get(*key) {
            return items
                .iter()
                .filter_map(|item| {
                    Some(ProviderTrack {
                        id: str_field(item, &["id", "trackId", "track_id"])?,
                        title: str_field(item, &["title", "name", "trackName"])?,
                        artist_id: str_field(item, &["artistId", "artist_id"])
                            .unwrap_or_else(|| artist_id.to_string()),
                        artist_name: str_field(item, &["artistName", "artist_name"])
                            .unwrap_or_else(|| artist_name.to_string()),
                        isrc: str_field(item, &["isrc", "ISRC"]),
                        upc: str_field(item, &["upc", "UPC", "barcode"]),
                    })
                })
                .collect();
        }
    }
    Vec::new()
}

/// Apple Music responses nest display fields under `attributes`; older
/// integrations return them flat.
fn adapt_apple_music(value: &Value) -> Option<ProviderArtist> {
    let attributes = value.get("attributes").unwrap_or(value);
    let external_id = str_field(value, &["id", "artistId", "artist_id"])?;
    let name = str_field(attributes, &["name", "artistName", "artist_name"])?;
    let url = str_field(attributes, &["url", "artistUrl"]);
    Some(ProviderArtist {
        links: DspLinks {
            apple_music_id: Some(external_id.clone()),
            apple_music_url: url.clone(),
            ..Default::default()
        },
        tracks: tracks_array(value, &["tracks", "songs"], &external_id, &name),
        social_links: social_links(value, &["socialLinks", "social_links"]),
        genres: string_array(attributes, &["genreNames", "genres"]),
        follower_count: u64_field(attributes, &["followers", "listeners"]),
        bio: str_field(attributes, &["artistBio", "bio", "editorialNotes"]),
        external_id,
        name,
        url,
    })
}

fn adapt_deezer(value: &Value) -> Option<ProviderArtist> {
    let external_id = str_field(value, &["id"])?;
    let name = str_field(value, &["name"])?;
    let url = str_field(value, &["link", "url", "share"]);
    Some(ProviderArtist {
        links: DspLinks {
            deezer_id: Some(external_id.clone()),
            ..Default::default()
        },
        tracks: tracks_array(value, &["tracks", "data"], &external_id, &name),
        social_links: Vec::new(),
        genres: string_array(value, &["genres"]),
        follower_count: u64_field(value, &["nb_fan", "nbFan", "fans"]),
        bio: None,
        external_id,
        name,
        url,
    })
}

fn adapt_tidal(value: &Value) -> Option<ProviderArtist> {
    let external_id = str_field(value, &["id", "artistId"])?;
    let name = str_field(value, &["name", "title"])?;
    let url = str_field(value, &["url", "tidalUrl", "tidal_url"]);
    Some(ProviderArtist {
        links: DspLinks {
            tidal_id: Some(external_id.clone()),
            ..Default::default()
        },
        tracks: tracks_array(value, &["tracks", "items"], &external_id, &name),
        social_links: Vec::new(),
        genres: string_array(value, &["genres", "artistTypes"]),
        follower_count: u64_field(value, &["popularity", "followers"]),
        bio: str_field(value, &["bio", "biography"]),
        external_id,
        name,
        url,
    })
}

fn adapt_soundcloud(value: &Value) -> Option<ProviderArtist> {
    let external_id = str_field(value, &["id", "userId", "user_id"])?;
    let name = str_field(value, &["username", "name", "full_name"])?;
    let url = str_field(value, &["permalink_url", "permalinkUrl", "url"]);
    Some(ProviderArtist {
        links: DspLinks {
            soundcloud_id: Some(external_id.clone()),
            ..Default::default()
        },
        tracks: tracks_array(value, &["tracks"], &external_id, &name),
        social_links: social_links(value, &["web_profiles", "webProfiles", "social_links"]),
        genres: string_array(value, &["genres", "tag_list"]),
        follower_count: u64_field(value, &["followers_count", "followersCount"]),
        bio: str_field(value, &["description", "bio"]),
        external_id,
        name,
        url,
    })
}

fn adapt_youtube_music(value: &Value) -> Option<ProviderArtist> {
    let external_id = str_field(value, &["channelId", "channel_id", "browseId", "id"])?;
    let name = str_field(value, &["title", "name", "channelTitle"])?;
    let url = str_field(value, &["url", "channelUrl", "channel_url"]).or_else(|| {
        Some(format!("https://music.youtube.com/channel/{}", external_id))
    });
    Some(ProviderArtist {
        links: DspLinks {
            youtube_music_id: Some(external_id.clone()),
            youtube_music_url: url.clone(),
            youtube_url: str_field(value, &["youtubeUrl", "youtube_url"]),
            ..Default::default()
        },
        tracks: tracks_array(value, &["tracks", "videos"], &external_id, &name),
        social_links: Vec::new(),
        genres: string_array(value, &["genres"]),
        follower_count: u64_field(value, &["subscriberCount", "subscriber_count", "subscribers"]),
        bio: str_field(value, &["description", "bio"]),
        external_id,
        name,
        url,
    })
}
