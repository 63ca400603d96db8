// src/links.rs
use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use log::{debug, warn};
use url::Url;

use crate::breaker::BreakerRegistry;
use crate::models::{LinkQuality, ProviderId, ProviderLink, TrackRef};

const DISCOVERED_MANUAL: &str = "manual_override";
const DISCOVERED_ISRC_LOOKUP: &str = "isrc_lookup";
const DISCOVERED_SEARCH: &str = "search_url_synthesis";

/// One hit from a canonical ISRC-keyed catalog lookup.
#[derive(Debug, Clone)]
pub struct IsrcLookupHit {
    pub provider_id: String,
    pub url: String,
}

/// Canonical lookup client for providers that support ISRC-keyed search.
/// Implementations own HTTP plumbing and timeouts; calls made here are
/// routed through the provider's circuit breaker.
#[async_trait]
pub trait IsrcLookup: Send + Sync {
    async fn lookup_isrc(&self, isrc: &str) -> Result<Vec<IsrcLookupHit>>;
}

/// Inputs for one resolution pass.
pub struct ResolveOptions<'a> {
    /// Providers to emit a link for. Every one yields exactly one link.
    pub providers: &'a [ProviderId],
    /// Curator-supplied URLs that bypass lookup entirely.
    pub overrides: &'a HashMap<ProviderId, String>,
    /// Canonical lookup client, if one is configured.
    pub fetcher: Option<&'a dyn IsrcLookup>,
    pub breakers: &'a BreakerRegistry,
}

/// Whether a provider supports canonical ISRC-keyed lookup. Currently only
/// Apple Music exposes one.
fn supports_canonical_lookup(provider: ProviderId) -> bool {
    provider == ProviderId::AppleMusic
}

/// Strip per-view query parameters and fragments so we persist the stable
/// album/artist URL rather than a playback-session URL. Unparseable input
/// passes through untouched.
pub fn normalize_canonical_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            url.set_query(None);
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => raw.to_string(),
    }
}

fn search_query(track: &TrackRef) -> String {
    match &track.isrc {
        Some(isrc) => format!("{} {} {}", isrc, track.artist_name, track.title),
        None => format!("{} {}", track.artist_name, track.title),
    }
}

/// Synthesize a best-effort search URL for a provider. The query prefers
/// "{isrc} {artist} {title}" when the ISRC is known since most provider
/// search boxes accept raw ISRCs.
pub fn build_search_url(provider: ProviderId, track: &TrackRef) -> String {
    let query = search_query(track);
    let (base, kind) = match provider {
        ProviderId::Spotify => ("https://open.spotify.com/search", QueryKind::PathSegment),
        ProviderId::AppleMusic => ("https://music.apple.com/us/search", QueryKind::Param("term")),
        ProviderId::Deezer => ("https://www.deezer.com/search", QueryKind::PathSegment),
        ProviderId::Tidal => ("https://listen.tidal.com/search", QueryKind::Param("q")),
        ProviderId::SoundCloud => ("https://soundcloud.com/search", QueryKind::Param("q")),
        ProviderId::YoutubeMusic => ("https://music.youtube.com/search", QueryKind::Param("q")),
        ProviderId::Youtube => (
            "https://www.youtube.com/results",
            QueryKind::Param("search_query"),
        ),
    };

    // The bases are compile-time constants, so parsing cannot fail.
    let mut url = Url::parse(base).expect("invalid search url template");
    match kind {
        QueryKind::Param(key) => {
            url.query_pairs_mut().append_pair(key, &query);
        }
        QueryKind::PathSegment => {
            url.path_segments_mut()
                .expect("search url template cannot be a base")
                .push(&query);
        }
    }
    url.to_string()
}

enum QueryKind {
    Param(&'static str),
    PathSegment,
}

/// Resolve one link per requested provider, best quality first available:
/// manual override (no lookup), canonical ISRC hit, then a synthesized
/// search URL. Absence of a confident match degrades quality; it never
/// drops the provider from the result. Providers resolve concurrently but
/// the output keeps the request order.
pub async fn resolve_provider_links(
    track: &TrackRef,
    options: ResolveOptions<'_>,
) -> Vec<ProviderLink> {
    let link_futures = options.providers.iter().map(|&provider| {
        let overrides = options.overrides;
        let fetcher = options.fetcher;
        let breakers = options.breakers;
        async move {
            if let Some(url) = overrides.get(&provider) {
                debug!("Using manual override link for {}", provider);
                return ProviderLink {
                    provider,
                    url: url.clone(),
                    quality: LinkQuality::ManualOverride,
                    discovered_from: DISCOVERED_MANUAL.to_string(),
                    provider_id: None,
                };
            }

            if supports_canonical_lookup(provider) {
                if let (Some(isrc), Some(fetcher)) = (track.isrc.as_deref(), fetcher) {
                    match resolve_canonical(provider, isrc, fetcher, breakers).await {
                        Some(link) => return link,
                        None => {
                            debug!(
                                "No unambiguous canonical hit for {} isrc {}, falling back to search",
                                provider, isrc
                            );
                        }
                    }
                }
            }

            ProviderLink {
                provider,
                url: build_search_url(provider, track),
                quality: LinkQuality::SearchFallback,
                discovered_from: DISCOVERED_SEARCH.to_string(),
                provider_id: None,
            }
        }
    });

    join_all(link_futures).await
}

async fn resolve_canonical(
    provider: ProviderId,
    isrc: &str,
    fetcher: &dyn IsrcLookup,
    breakers: &BreakerRegistry,
) -> Option<ProviderLink> {
    let breaker = breakers.get(provider);
    match breaker.execute(|| fetcher.lookup_isrc(isrc)).await {
        Ok(hits) if hits.len() == 1 => {
            let hit = &hits[0];
            Some(ProviderLink {
                provider,
                url: normalize_canonical_url(&hit.url),
                quality: LinkQuality::Canonical,
                discovered_from: DISCOVERED_ISRC_LOOKUP.to_string(),
                provider_id: Some(hit.provider_id.clone()),
            })
        }
        Ok(hits) => {
            debug!(
                "Canonical lookup for {} isrc {} returned {} hits, not unambiguous",
                provider,
                isrc,
                hits.len()
            );
            None
        }
        Err(e) => {
            warn!("Canonical lookup for {} isrc {} failed: {}", provider, isrc, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::anyhow;

    fn track(isrc: Option<&str>) -> TrackRef {
        TrackRef {
            title: "Paper Planes".to_string(),
            artist_name: "M.I.A.".to_string(),
            isrc: isrc.map(str::to_string),
        }
    }

    struct StubLookup {
        hits: Vec<IsrcLookupHit>,
        calls: AtomicUsize,
        fail: bool,
    }

    impl StubLookup {
        fn with_hits(hits: Vec<IsrcLookupHit>) -> Self {
            Self {
                hits,
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                hits: Vec::new(),
                calls: AtomicUsize::new(0),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl IsrcLookup for StubLookup {
        async fn lookup_isrc(&self, _isrc: &str) -> Result<Vec<IsrcLookupHit>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(anyhow!("lookup unavailable"));
            }
            Ok(self.hits.clone())
        }
    }

    #[tokio::test]
    async fn test_canonical_hit_yields_canonical_link_with_stripped_url() {
        let fetcher = StubLookup::with_hits(vec![IsrcLookupHit {
            provider_id: "1440742903".to_string(),
            url: "https://music.apple.com/us/album/kala/1440742903?i=1440743183&uo=4".to_string(),
        }]);
        let breakers = BreakerRegistry::default();
        let links = resolve_provider_links(
            &track(Some("GBARL0700667")),
            ResolveOptions {
                providers: &[ProviderId::AppleMusic],
                overrides: &HashMap::new(),
                fetcher: Some(&fetcher),
                breakers: &breakers,
            },
        )
        .await;

        assert_eq!(links.len(), 1);
        assert_eq!(links[0].quality, LinkQuality::Canonical);
        assert_eq!(links[0].url, "https://music.apple.com/us/album/kala/1440742903");
        assert_eq!(links[0].provider_id.as_deref(), Some("1440742903"));
        assert_eq!(links[0].discovered_from, "isrc_lookup");
    }

    #[tokio::test]
    async fn test_no_hit_falls_back_to_search_url() {
        let fetcher = StubLookup::with_hits(vec![]);
        let breakers = BreakerRegistry::default();
        let links = resolve_provider_links(
            &track(Some("GBARL0700667")),
            ResolveOptions {
                providers: &[ProviderId::AppleMusic],
                overrides: &HashMap::new(),
                fetcher: Some(&fetcher),
                breakers: &breakers,
            },
        )
        .await;

        assert_eq!(links[0].quality, LinkQuality::SearchFallback);
        assert!(links[0].url.starts_with("https://music.apple.com/us/search?term="));
        assert!(links[0].url.contains("GBARL0700667"));
    }

    #[tokio::test]
    async fn test_ambiguous_hits_fall_back_to_search_url() {
        let hit = IsrcLookupHit {
            provider_id: "1".to_string(),
            url: "https://music.apple.com/us/album/x/1".to_string(),
        };
        let fetcher = StubLookup::with_hits(vec![hit.clone(), hit]);
        let breakers = BreakerRegistry::default();
        let links = resolve_provider_links(
            &track(Some("GBARL0700667")),
            ResolveOptions {
                providers: &[ProviderId::AppleMusic],
                overrides: &HashMap::new(),
                fetcher: Some(&fetcher),
                breakers: &breakers,
            },
        )
        .await;
        assert_eq!(links[0].quality, LinkQuality::SearchFallback);
    }

    #[tokio::test]
    async fn test_manual_override_skips_lookup() {
        let fetcher = StubLookup::failing();
        let breakers = BreakerRegistry::default();
        let mut overrides = HashMap::new();
        overrides.insert(
            ProviderId::AppleMusic,
            "https://music.apple.com/us/artist/mia/152949163".to_string(),
        );
        let links = resolve_provider_links(
            &track(Some("GBARL0700667")),
            ResolveOptions {
                providers: &[ProviderId::AppleMusic],
                overrides: &overrides,
                fetcher: Some(&fetcher),
                breakers: &breakers,
            },
        )
        .await;

        assert_eq!(links[0].quality, LinkQuality::ManualOverride);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_every_requested_provider_gets_exactly_one_link() {
        let breakers = BreakerRegistry::default();
        let providers = [
            ProviderId::Spotify,
            ProviderId::AppleMusic,
            ProviderId::Deezer,
            ProviderId::Tidal,
            ProviderId::SoundCloud,
            ProviderId::YoutubeMusic,
        ];
        let links = resolve_provider_links(
            &track(None),
            ResolveOptions {
                providers: &providers,
                overrides: &HashMap::new(),
                fetcher: None,
                breakers: &breakers,
            },
        )
        .await;
        assert_eq!(links.len(), providers.len());
        for (provider, link) in providers.iter().zip(&links) {
            assert_eq!(*provider, link.provider);
            assert_eq!(link.quality, LinkQuality::SearchFallback);
        }
    }

    #[test]
    fn test_search_query_prefers_isrc() {
        let url = build_search_url(ProviderId::Tidal, &track(Some("GBARL0700667")));
        assert!(url.contains("GBARL0700667"));
        let url = build_search_url(ProviderId::Tidal, &track(None));
        assert!(!url.contains("GBARL0700667"));
        assert!(url.contains("q="));
    }

    #[test]
    fn test_normalize_canonical_url_strips_query_and_fragment() {
        assert_eq!(
            normalize_canonical_url("https://music.apple.com/us/album/kala/1?i=2&uo=4#top"),
            "https://music.apple.com/us/album/kala/1"
        );
        assert_eq!(normalize_canonical_url("not a url"), "not a url");
    }
}
