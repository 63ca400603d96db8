// src/enrichment/processor.rs
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use url::Url;

use crate::breaker::BreakerRegistry;
use crate::config::MatchPolicyConfig;
use crate::enrichment::merge::plan_profile_updates;
use crate::links::{resolve_provider_links, IsrcLookup, ResolveOptions};
use crate::matching::aggregate::aggregate_isrc_matches;
use crate::matching::confidence::{score_candidate, ExternalArtistSignals, LocalArtistSignals};
use crate::matching::validate::validate_candidate;
use crate::models::{
    ConfidenceBreakdown, CreatorProfile, IsrcMatchEvent, LinkQuality, MatchCandidate,
    MatchedTrack, ProfileEnrichmentPayload, ProviderArtist, ProviderId, ProviderTrack,
    ReleaseEnrichmentPayload, TrackRef,
};
use crate::providers::{lookup_isrcs_chunked, ProviderClient};
use crate::results::EnrichmentResult;
use crate::storage::{FieldUpdate, ProfileField, ProfileStore, SocialLinkSink};

/// Stable fingerprint for schedulers that did not supply a dedup key.
pub fn dedup_fingerprint(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

/// Map a seed URL to the provider it identifies the creator on.
pub fn detect_seed_provider(seed_url: &str) -> Option<ProviderId> {
    let url = Url::parse(seed_url).ok()?;
    let host = url.host_str()?.trim_start_matches("www.");
    match host {
        "open.spotify.com" => Some(ProviderId::Spotify),
        "music.apple.com" | "itunes.apple.com" => Some(ProviderId::AppleMusic),
        "deezer.com" => Some(ProviderId::Deezer),
        "tidal.com" | "listen.tidal.com" => Some(ProviderId::Tidal),
        "soundcloud.com" => Some(ProviderId::SoundCloud),
        "music.youtube.com" => Some(ProviderId::YoutubeMusic),
        "youtube.com" | "youtu.be" => Some(ProviderId::Youtube),
        _ => None,
    }
}

/// The enrichment job body: loads the target record, calls the provider
/// through its circuit breaker, runs matching/scoring/validation as needed
/// and performs a non-destructive field-by-field merge back into storage.
///
/// One job = one record. All writes are set-if-empty, so jobs are idempotent
/// and safe to redeliver; the dedup-key set only prevents redundant provider
/// traffic, not correctness violations.
pub struct EnrichmentMergeProcessor {
    store: Arc<dyn ProfileStore>,
    social_sink: Arc<dyn SocialLinkSink>,
    providers: HashMap<ProviderId, Arc<dyn ProviderClient>>,
    breakers: Arc<BreakerRegistry>,
    policy: MatchPolicyConfig,
    /// Canonical ISRC-lookup client used to fill URL slots the provider
    /// response left empty.
    isrc_lookup: Option<Arc<dyn IsrcLookup>>,
    /// Curator-supplied link overrides, keyed by provider.
    link_overrides: HashMap<ProviderId, String>,
    processed_dedup_keys: Mutex<HashSet<String>>,
}

impl EnrichmentMergeProcessor {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        social_sink: Arc<dyn SocialLinkSink>,
        breakers: Arc<BreakerRegistry>,
        policy: MatchPolicyConfig,
    ) -> Self {
        Self {
            store,
            social_sink,
            providers: HashMap::new(),
            breakers,
            policy,
            isrc_lookup: None,
            link_overrides: HashMap::new(),
            processed_dedup_keys: Mutex::new(HashSet::new()),
        }
    }

    pub fn register_provider(&mut self, client: Arc<dyn ProviderClient>) {
        self.providers.insert(client.provider(), client);
    }

    pub fn set_isrc_lookup(&mut self, fetcher: Arc<dyn IsrcLookup>) {
        self.isrc_lookup = Some(fetcher);
    }

    pub fn set_link_overrides(&mut self, overrides: HashMap<ProviderId, String>) {
        self.link_overrides = overrides;
    }

    pub fn breakers(&self) -> &BreakerRegistry {
        &self.breakers
    }

    async fn already_processed(&self, dedup_key: &str) -> bool {
        self.processed_dedup_keys.lock().await.contains(dedup_key)
    }

    async fn mark_processed(&self, dedup_key: &str) {
        self.processed_dedup_keys
            .lock()
            .await
            .insert(dedup_key.to_string());
    }

    /// Pre-flight checks before any mutation: the provider must be
    /// configured, its breaker must admit calls, and its own health probe
    /// must pass. Failing any of these is an expected steady state, not an
    /// exception, so the caller gets a diagnostic string to report.
    async fn preflight(&self, provider: ProviderId) -> Result<Arc<dyn ProviderClient>, String> {
        let client = self
            .providers
            .get(&provider)
            .cloned()
            .ok_or_else(|| format!("{} not configured", provider.display_name()))?;
        if !self.breakers.get(provider).is_call_permitted() {
            return Err(format!("{} provider not available", provider.display_name()));
        }
        if !client.is_available().await {
            return Err(format!("{} provider not available", provider.display_name()));
        }
        Ok(client)
    }

    /// Profile enrichment: resolve the seed identity against its provider
    /// and merge the discovered identifiers, links and bio into the profile.
    pub async fn process_profile_job(
        &self,
        payload: &ProfileEnrichmentPayload,
    ) -> Result<EnrichmentResult> {
        // Schema violations are caller bugs: raised, never folded into the
        // job result.
        payload.validate()?;

        if self.already_processed(&payload.dedup_key).await {
            debug!("Skipping redelivered enrichment job {}", payload.dedup_key);
            return Ok(EnrichmentResult::skipped(format!(
                "duplicate delivery for dedup key {}",
                payload.dedup_key
            )));
        }

        let provider = match detect_seed_provider(&payload.seed_url) {
            Some(provider) => provider,
            None => {
                return Ok(EnrichmentResult::skipped(format!(
                    "no provider recognized for seed url {}",
                    payload.seed_url
                )))
            }
        };

        let client = match self.preflight(provider).await {
            Ok(client) => client,
            Err(reason) => return Ok(EnrichmentResult::skipped(reason)),
        };

        let profile = match self
            .store
            .get_profile(payload.creator_profile_id)
            .await
            .context("failed to load creator profile")?
        {
            Some(profile) => profile,
            None => {
                return Ok(EnrichmentResult::skipped(format!(
                    "creator profile {} not found",
                    payload.creator_profile_id
                )))
            }
        };

        let breaker = self.breakers.get(provider);
        let seed_url = payload.seed_url.clone();
        let artist = match breaker
            .execute(|| client.fetch_by_seed(&seed_url))
            .await
        {
            Ok(Some(artist)) => artist,
            Ok(None) => {
                return Ok(EnrichmentResult::skipped(format!(
                    "{} returned no data for seed",
                    provider.display_name()
                )))
            }
            Err(e) => {
                warn!("Seed fetch from {} failed: {:#}", provider, e);
                return Ok(EnrichmentResult::skipped(format!(
                    "{} fetch failed: {}",
                    provider.display_name(),
                    e
                )));
            }
        };

        let mut result = EnrichmentResult::default();

        // MAP_FIELDS + UPDATE_BIO: one declarative set-if-empty pass.
        let mut updates = plan_profile_updates(&profile, &artist);

        // FILL_MISSING_LINKS: URL slots neither the profile nor the provider
        // response covered go through link resolution.
        self.plan_resolved_links(&profile, &mut updates).await;
        result.dsp_fields_updated = updates.iter().map(|u| u.field.as_str().to_string()).collect();

        // MERGE_SOCIAL_LINKS: the ingestion collaborator owns the merge; a
        // failure here is a warning, not a job failure.
        if !artist.social_links.is_empty() {
            match self
                .social_sink
                .merge_links(payload.creator_profile_id, &artist.social_links)
                .await
            {
                Ok(counts) => {
                    result.social_links_inserted = counts.inserted;
                }
                Err(e) => {
                    warn!(
                        "Social link merge failed for profile {}: {:#}",
                        payload.creator_profile_id, e
                    );
                    result.record_error(format!("social link merge failed: {}", e));
                }
            }
        }

        // PERSIST: a single partial update; no change, no write.
        if !updates.is_empty() {
            self.store
                .update_profile_fields(payload.creator_profile_id, &updates)
                .await
                .context("failed to persist enrichment updates")?;
        }

        self.mark_processed(&payload.dedup_key).await;
        info!(
            "Enriched profile {} from {}: {} fields, {} social links",
            payload.creator_profile_id,
            provider,
            result.dsp_fields_updated.len(),
            result.social_links_inserted
        );
        Ok(result.finish())
    }

    /// Resolve links for URL slots that are still empty after the merge plan
    /// and append the confident results. Only manual overrides and canonical
    /// ISRC hits qualify: a synthesized search page must not occupy a
    /// canonical URL slot, where set-if-empty would freeze it in place.
    async fn plan_resolved_links(&self, profile: &CreatorProfile, updates: &mut Vec<FieldUpdate>) {
        // Without an override or a lookup client every resolution would come
        // back as a search fallback, so skip the pass entirely.
        if self.link_overrides.is_empty() && self.isrc_lookup.is_none() {
            return;
        }

        let planned: HashSet<ProfileField> = updates.iter().map(|u| u.field).collect();
        let mut wanted: Vec<ProviderId> = Vec::new();
        for provider in [ProviderId::AppleMusic, ProviderId::YoutubeMusic, ProviderId::Youtube] {
            let field = match url_slot(provider) {
                Some(field) => field,
                None => continue,
            };
            if planned.contains(&field) {
                continue;
            }
            let current = match field {
                ProfileField::AppleMusicUrl => profile.apple_music_url.as_deref(),
                ProfileField::YoutubeMusicUrl => profile.youtube_music_url.as_deref(),
                ProfileField::YoutubeUrl => profile.youtube_url.as_deref(),
                _ => continue,
            };
            if current.map_or(true, |v| v.trim().is_empty()) {
                wanted.push(provider);
            }
        }
        if wanted.is_empty() {
            return;
        }

        let track = representative_track(profile);
        let links = resolve_provider_links(
            &track,
            ResolveOptions {
                providers: &wanted,
                overrides: &self.link_overrides,
                fetcher: self.isrc_lookup.as_deref(),
                breakers: &self.breakers,
            },
        )
        .await;

        for link in links {
            if link.quality == LinkQuality::SearchFallback {
                continue;
            }
            if let Some(field) = url_slot(link.provider) {
                debug!(
                    "Resolved {} link for profile {} via {}",
                    link.provider, profile.id, link.discovered_from
                );
                updates.push(FieldUpdate {
                    field,
                    value: link.url,
                });
            }
        }
    }

    /// Release/match enrichment: judge one candidate external artist against
    /// the profile's stored catalog and, on an auto-confirmed match, merge
    /// the provider identifiers in.
    pub async fn process_release_job(
        &self,
        payload: &ReleaseEnrichmentPayload,
    ) -> Result<EnrichmentResult> {
        if self.already_processed(&payload.dedup_key).await {
            debug!("Skipping redelivered release job {}", payload.dedup_key);
            return Ok(EnrichmentResult::skipped(format!(
                "duplicate delivery for dedup key {}",
                payload.dedup_key
            )));
        }

        let client = match self.preflight(payload.provider).await {
            Ok(client) => client,
            Err(reason) => return Ok(EnrichmentResult::skipped(reason)),
        };

        let profile = match self
            .store
            .get_profile(payload.creator_profile_id)
            .await
            .context("failed to load creator profile")?
        {
            Some(profile) => profile,
            None => {
                return Ok(EnrichmentResult::skipped(format!(
                    "creator profile {} not found",
                    payload.creator_profile_id
                )))
            }
        };

        let breaker = self.breakers.get(payload.provider);
        let external_id = payload.external_artist_id.clone();
        let artist = match breaker
            .execute(|| client.fetch_by_artist_id(&external_id))
            .await
        {
            Ok(Some(artist)) => artist,
            Ok(None) => {
                return Ok(EnrichmentResult::skipped(format!(
                    "{} has no artist {}",
                    payload.provider.display_name(),
                    payload.external_artist_id
                )))
            }
            Err(e) => {
                warn!("Artist fetch from {} failed: {:#}", payload.provider, e);
                return Ok(EnrichmentResult::skipped(format!(
                    "{} fetch failed: {}",
                    payload.provider.display_name(),
                    e
                )));
            }
        };

        // CATALOG_JOIN: resolve the profile's ISRCs against the provider in
        // batches; the artist record alone carries no catalog guarantee.
        let isrcs: Vec<String> = profile
            .tracks
            .iter()
            .filter_map(|t| t.isrc.clone())
            .collect();
        let hits = if isrcs.is_empty() {
            Vec::new()
        } else {
            match breaker
                .execute(|| lookup_isrcs_chunked(client.as_ref(), &isrcs))
                .await
            {
                Ok(hits) => hits,
                Err(e) => {
                    warn!("ISRC lookup against {} failed: {:#}", payload.provider, e);
                    return Ok(EnrichmentResult::skipped(format!(
                        "{} fetch failed: {}",
                        payload.provider.display_name(),
                        e
                    )));
                }
            }
        };

        let mut candidate = self.build_candidate(&profile, &artist, &hits, payload);
        let local = LocalArtistSignals {
            name: profile.artist_name.clone(),
            follower_count: profile.follower_count,
            genres: profile.genres.clone(),
        };
        let external = ExternalArtistSignals {
            name: artist.name.clone(),
            follower_count: artist.follower_count,
            genres: artist.genres.clone(),
        };
        score_candidate(&mut candidate, &local, &external, &self.policy);

        let mut result = EnrichmentResult::default();
        let outcome = validate_candidate(&candidate, &self.policy);
        if !outcome.valid {
            let reason = outcome.reason.unwrap_or_else(|| "rejected".to_string());
            info!(
                "Match {} rejected for profile {}: {} (confidence {:.3})",
                payload.match_id, payload.creator_profile_id, reason, candidate.confidence_score
            );
            result.record_error(format!("match {} rejected: {}", payload.match_id, reason));
            self.mark_processed(&payload.dedup_key).await;
            return Ok(result.finish());
        }

        if !candidate.should_auto_confirm {
            info!(
                "Match {} deferred to review for profile {} (confidence {:.3})",
                payload.match_id, payload.creator_profile_id, candidate.confidence_score
            );
            result.record_error(format!(
                "match {} deferred for manual review (confidence {:.2})",
                payload.match_id, candidate.confidence_score
            ));
            self.mark_processed(&payload.dedup_key).await;
            return Ok(result.finish());
        }

        let updates = plan_profile_updates(&profile, &artist);
        result.dsp_fields_updated = updates.iter().map(|u| u.field.as_str().to_string()).collect();
        result.releases_enriched = candidate.matching_upcs.len();

        if !updates.is_empty() {
            self.store
                .update_profile_fields(payload.creator_profile_id, &updates)
                .await
                .context("failed to persist match enrichment updates")?;
        }

        self.mark_processed(&payload.dedup_key).await;
        info!(
            "Match {} auto-confirmed for profile {}: {} fields, {} releases (confidence {:.3})",
            payload.match_id,
            payload.creator_profile_id,
            result.dsp_fields_updated.len(),
            result.releases_enriched,
            candidate.confidence_score
        );
        Ok(result.finish())
    }

    /// Join the batched ISRC lookup hits against the profile's stored tracks,
    /// then pull out the candidate named by the payload. An artist with no
    /// catalog overlap still gets a zero-evidence candidate so the remaining
    /// signals are scored rather than the job crashing.
    fn build_candidate(
        &self,
        profile: &CreatorProfile,
        artist: &ProviderArtist,
        hits: &[ProviderTrack],
        payload: &ReleaseEnrichmentPayload,
    ) -> MatchCandidate {
        let mut by_isrc: HashMap<&str, &ProviderTrack> = HashMap::new();
        for track in hits {
            if let Some(isrc) = track.isrc.as_deref() {
                by_isrc.entry(isrc).or_insert(track);
            }
        }

        let mut events: Vec<IsrcMatchEvent> = Vec::new();
        let mut total_tracks_checked = 0usize;
        for local_track in &profile.tracks {
            let isrc = match local_track.isrc.as_deref() {
                Some(isrc) => isrc,
                None => continue,
            };
            total_tracks_checked += 1;
            if let Some(matched) = by_isrc.get(isrc) {
                events.push(IsrcMatchEvent {
                    isrc: isrc.to_string(),
                    local_track_id: local_track.id.clone(),
                    local_track_title: local_track.title.clone(),
                    matched_track: MatchedTrack {
                        id: matched.id.clone(),
                        title: matched.title.clone(),
                        artist_id: matched.artist_id.clone(),
                        artist_name: matched.artist_name.clone(),
                    },
                });
            }
        }

        let candidates = aggregate_isrc_matches(payload.provider, &events, total_tracks_checked);
        let mut candidate = candidates
            .into_iter()
            .find(|c| c.external_artist_id == payload.external_artist_id)
            .unwrap_or_else(|| MatchCandidate {
                provider: payload.provider,
                external_artist_id: payload.external_artist_id.clone(),
                external_artist_name: artist.name.clone(),
                matching_isrcs: Default::default(),
                matching_upcs: Default::default(),
                total_tracks_checked,
                confidence_score: 0.0,
                confidence_breakdown: ConfidenceBreakdown::default(),
                should_auto_confirm: false,
            });

        let local_upcs: HashSet<&str> = profile
            .tracks
            .iter()
            .filter_map(|t| t.upc.as_deref())
            .collect();
        for track in hits {
            if track.artist_id != candidate.external_artist_id {
                continue;
            }
            if let Some(upc) = track.upc.as_deref() {
                if local_upcs.contains(upc) {
                    candidate.matching_upcs.insert(upc.to_string());
                }
            }
        }

        candidate
    }
}

/// The profile URL slot a resolved link for this provider lands in, if any.
/// Id-only providers have no URL slot to fill.
fn url_slot(provider: ProviderId) -> Option<ProfileField> {
    match provider {
        ProviderId::AppleMusic => Some(ProfileField::AppleMusicUrl),
        ProviderId::YoutubeMusic => Some(ProfileField::YoutubeMusicUrl),
        ProviderId::Youtube => Some(ProfileField::YoutubeUrl),
        _ => None,
    }
}

/// Pick the track used as the lookup key for link resolution: the first
/// stored track with an ISRC, else the first track, else name only.
fn representative_track(profile: &CreatorProfile) -> TrackRef {
    let local = profile
        .tracks
        .iter()
        .find(|t| t.isrc.is_some())
        .or_else(|| profile.tracks.first());
    TrackRef {
        title: local.map(|t| t.title.clone()).unwrap_or_default(),
        artist_name: profile.artist_name.clone(),
        isrc: local.and_then(|t| t.isrc.clone()),
    }
}
