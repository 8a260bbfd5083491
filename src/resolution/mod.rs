//! Resolution Service (C6): turns a platform URL into a canonical,
//! cross-platform-enriched [`Song`].

mod scorer;

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{AppError, PlatformError, Result};
use crate::models::{PlatformLink, SearchQuery, Song};
use crate::platform::PlatformService;
use crate::repository::SongRepository;

const ENRICHMENT_SEARCH_LIMIT: u32 = 5;
const ENRICHMENT_THRESHOLD: f64 = 0.7;
const FUZZY_FALLBACK_CONFIDENCE: f64 = 0.8;

pub struct ResolutionService {
    repository: Arc<dyn SongRepository>,
    adapters: RwLock<HashMap<String, Arc<dyn PlatformService>>>,
}

impl ResolutionService {
    pub fn new(repository: Arc<dyn SongRepository>) -> Self {
        Self {
            repository,
            adapters: RwLock::new(HashMap::new()),
        }
    }

    pub async fn register_platform(&self, adapter: Arc<dyn PlatformService>) {
        let name = adapter.platform_name().to_string();
        self.adapters.write().await.insert(name, adapter);
    }

    pub async fn get_platform_service(&self, name: &str) -> Option<Arc<dyn PlatformService>> {
        self.adapters.read().await.get(name).cloned()
    }

    pub async fn supported_platforms(&self) -> Vec<String> {
        self.adapters.read().await.keys().cloned().collect()
    }

    pub async fn health(&self) -> HashMap<String, Result<()>> {
        let adapters = self.adapters.read().await;
        let mut report = HashMap::new();
        for (name, adapter) in adapters.iter() {
            let outcome = adapter.health().await.map_err(AppError::from);
            report.insert(name.clone(), outcome);
        }
        report
    }

    /// Parses `url` against every registered adapter's URL pattern and
    /// returns the first match as (platform, external_id).
    async fn parse_url(&self, url: &str) -> Result<(String, String)> {
        let adapters = self.adapters.read().await;
        for (name, adapter) in adapters.iter() {
            if let Some(partial) = adapter.parse_url(url) {
                return Ok((name.clone(), partial.external_id));
            }
        }
        Err(AppError::Platform(PlatformError::unknown_platform(url)))
    }

    pub async fn resolve_from_url(&self, url: &str) -> Result<Song> {
        let (platform, track_id) = self.parse_url(url).await?;

        let adapter = self
            .get_platform_service(&platform)
            .await
            .ok_or_else(|| AppError::Platform(PlatformError::new(&platform, "resolve", "unsupported platform")))?;

        if let Some(existing) = self.repository.find_by_platform_id(&platform, &track_id).await? {
            return self.enrich(existing).await;
        }

        let track_info = adapter.get_track_by_id(&track_id).await?;

        let song = if let Some(isrc) = track_info.isrc.clone().filter(|s| !s.is_empty()) {
            if let Some(mut existing) = self.repository.find_by_isrc(&isrc).await? {
                let link = PlatformLink::new(platform.clone(), track_id.clone(), track_info.url.clone(), 1.0);
                if existing.add_link_if_missing(link) {
                    self.repository.update(&existing).await?;
                }
                existing
            } else {
                self.create_song(&platform, &track_id, &track_info).await?
            }
        } else {
            let primary_artist = track_info.primary_artist();
            let candidates = self.repository.find_by_title_artist(&track_info.title, &primary_artist).await?;
            if let Some(mut existing) = candidates.into_iter().next() {
                let link = PlatformLink::new(platform.clone(), track_id.clone(), track_info.url.clone(), FUZZY_FALLBACK_CONFIDENCE);
                if existing.add_link_if_missing(link) {
                    self.repository.update(&existing).await?;
                }
                existing
            } else {
                self.create_song(&platform, &track_id, &track_info).await?
            }
        };

        self.enrich(song).await
    }

    async fn create_song(&self, platform: &str, track_id: &str, track_info: &crate::models::TrackInfo) -> Result<Song> {
        let metadata = crate::models::Metadata {
            duration_ms: track_info.duration_ms,
            release_date: track_info.release_date.clone(),
            popularity: track_info.popularity,
            genres: Vec::new(),
            explicit: track_info.explicit,
            image_url: track_info.image_url.clone(),
            language: None,
        };
        let mut song = Song::new(
            track_info.title.clone(),
            track_info.primary_artist(),
            track_info.album.clone(),
            track_info.isrc.clone().unwrap_or_default(),
            metadata,
        );
        song.platform_links.push(PlatformLink::new(platform, track_id, track_info.url.clone(), 1.0));
        Ok(self.repository.save(song).await?)
    }

    /// Attempts to add a link on every other registered adapter,
    /// best-effort: per-adapter failures are logged and skipped.
    async fn enrich(&self, mut song: Song) -> Result<Song> {
        let adapters = self.adapters.read().await;
        let others: Vec<_> = adapters
            .iter()
            .filter(|(name, _)| !song.has_platform(name))
            .map(|(name, adapter)| (name.clone(), adapter.clone()))
            .collect();
        drop(adapters);

        let mut added = false;

        for (name, adapter) in others {
            let outcome = if !song.isrc.is_empty() {
                adapter.get_track_by_isrc(&song.isrc).await.map(|t| (t, 1.0))
            } else {
                let query = SearchQuery::by_title_artist(song.title.clone(), song.artist.clone(), ENRICHMENT_SEARCH_LIMIT);
                match adapter.search_track(&query).await {
                    Ok(results) => {
                        let best = results
                            .into_iter()
                            .map(|t| {
                                // match_confidence alone can't tell this apart from a direct
                                // ISRC hit (which scores separately, above, at a fixed 1.0);
                                // anything arrived at via title/artist search is fuzzy by
                                // construction and capped accordingly.
                                let confidence = scorer::match_confidence(&t, &song).min(FUZZY_FALLBACK_CONFIDENCE);
                                (t, confidence)
                            })
                            .filter(|(_, confidence)| *confidence > ENRICHMENT_THRESHOLD)
                            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
                        match best {
                            Some(result) => Ok(result),
                            None => Err(PlatformError::not_found(&name, "enrich")),
                        }
                    }
                    Err(e) => Err(e),
                }
            };

            match outcome {
                Ok((track_info, confidence)) => {
                    let link = PlatformLink::new(name.clone(), track_info.external_id.clone(), track_info.url.clone(), confidence);
                    if song.add_link_if_missing(link) {
                        added = true;
                    }
                }
                Err(e) => {
                    tracing::warn!(platform = %name, error = %e, "enrichment failed on adapter, skipping");
                }
            }
        }

        if added {
            self.repository.update(&song).await?;
        }

        Ok(song)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Metadata, TrackInfo};
    use crate::platform::fake::FakePlatform;
    use crate::repository::InMemorySongRepository;

    fn track(platform: &str, id: &str, title: &str, artist: &str, isrc: Option<&str>) -> TrackInfo {
        TrackInfo {
            platform: platform.to_string(),
            external_id: id.to_string(),
            url: format!("https://example.com/{platform}/{id}"),
            title: title.to_string(),
            artists: vec![artist.to_string()],
            album: None,
            isrc: isrc.map(String::from),
            duration_ms: Some(180_000),
            release_date: Some("1975-10-31".to_string()),
            explicit: false,
            popularity: Some(90),
            image_url: Some("https://example.com/cover.jpg".to_string()),
            available: true,
        }
    }

    async fn setup() -> (ResolutionService, Arc<InMemorySongRepository>) {
        let repository = Arc::new(InMemorySongRepository::new());
        let resolver = ResolutionService::new(repository.clone());
        (resolver, repository)
    }

    #[tokio::test]
    async fn first_time_resolve_enriches_across_platforms() {
        let (resolver, _repo) = setup().await;

        let spotify_track = track("spotify", "4iV5W9uYEdYUVa79Axb7Rh", "Bohemian Rhapsody", "Queen", Some("GBUM71507208"));
        let spotify = FakePlatform::new("spotify").with_track("4iV5W9uYEdYUVa79Axb7Rh", spotify_track.clone());

        let apple_track = track("apple_music", "1440857781", "Bohemian Rhapsody", "Queen", Some("GBUM71507208"));
        let apple = FakePlatform::new("apple_music").with_isrc("GBUM71507208", apple_track);

        let tidal_track = track("tidal", "77646168", "Bohemian Rhapsody", "Queen", Some("GBUM71507208"));
        let tidal = FakePlatform::new("tidal").with_isrc("GBUM71507208", tidal_track);

        resolver.register_platform(Arc::new(spotify)).await;
        resolver.register_platform(Arc::new(apple)).await;
        resolver.register_platform(Arc::new(tidal)).await;

        let song = resolver.resolve_from_url(&spotify_track.url).await.unwrap();

        assert_eq!(song.title, "Bohemian Rhapsody");
        assert!(song.artist.contains("Queen"));
        assert_eq!(song.isrc, "GBUM71507208");
        assert_eq!(song.platform_links.len(), 3);
        assert!(song.platform_links.iter().all(|l| l.confidence == 1.0));
    }

    #[tokio::test]
    async fn resolve_by_url_with_no_matching_adapter_fails() {
        let (resolver, _repo) = setup().await;
        resolver.register_platform(Arc::new(FakePlatform::new("spotify"))).await;

        let err = resolver.resolve_from_url("https://youtube.com/watch?v=fJ9rUzIMcZQ").await.unwrap_err();
        match err {
            AppError::Platform(e) => {
                assert_eq!(e.platform, "unknown");
                assert_eq!(e.operation, "parse_url");
            }
            other => panic!("expected AppError::Platform, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fuzzy_resolution_by_title_artist_adds_link_at_fixed_confidence() {
        let (resolver, repo) = setup().await;

        let mut existing = Song::new("Test Song".to_string(), "Test Artist".to_string(), None, String::new(), Metadata::default());
        existing.platform_links.push(PlatformLink::new("spotify", "abc123", "https://example.com/spotify/abc123", 1.0));
        let existing = repo.save(existing).await.unwrap();

        let candidate = track("tidal", "999", "Test Song", "Test Artist", None);
        let tidal = FakePlatform::new("tidal").with_track("999", candidate.clone());
        resolver.register_platform(Arc::new(tidal)).await;

        let song = resolver.resolve_from_url(&candidate.url).await.unwrap();

        assert_eq!(song.id, existing.id);
        let link = song.link_for("tidal").unwrap();
        assert_eq!(link.confidence, 0.8);
    }

    #[tokio::test]
    async fn resolve_by_url_matches_existing_song_via_isrc_without_duplicating() {
        let (resolver, repo) = setup().await;

        let mut existing = Song::new(
            "Bohemian Rhapsody".to_string(),
            "Queen".to_string(),
            Some("A Night at the Opera".to_string()),
            "GBUM71507208".to_string(),
            Metadata::default(),
        );
        existing.platform_links.push(PlatformLink::new("tidal", "77646168", "https://tidal.com/browse/track/77646168", 1.0));
        let existing = repo.save(existing).await.unwrap();

        let apple_track = track("apple_music", "1440857781", "Bohemian Rhapsody", "Queen", Some("GBUM71507208"));
        resolver.register_platform(Arc::new(FakePlatform::new("apple_music").with_track("1440857781", apple_track.clone()))).await;

        let song = resolver.resolve_from_url(&apple_track.url).await.unwrap();

        assert_eq!(song.id, existing.id);
        assert_eq!(song.platform_links.len(), 2);
        let link = song.link_for("apple_music").unwrap();
        assert_eq!(link.confidence, 1.0);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn resolve_is_idempotent_on_repeat() {
        let (resolver, _repo) = setup().await;
        let spotify_track = track("spotify", "track1", "Some Song", "Some Artist", Some("ISRC000"));
        resolver.register_platform(Arc::new(FakePlatform::new("spotify").with_track("track1", spotify_track.clone()))).await;

        let first = resolver.resolve_from_url(&spotify_track.url).await.unwrap();
        let second = resolver.resolve_from_url(&spotify_track.url).await.unwrap();

        assert_eq!(first.id, second.id);
        assert!(second.platform_links.len() >= first.platform_links.len());
    }
}
