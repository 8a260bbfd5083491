use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use super::http::{new_http_client, send_json_with_retry};
use super::token::TokenCache;
use super::PlatformService;
use crate::cache::Cache;
use crate::error::PlatformError;
use crate::models::{SearchQuery, TrackInfo};

const DEFAULT_LIMIT: u32 = 10;
const MAX_LIMIT: u32 = 50;
const TRACK_CACHE_TTL: Duration = Duration::from_secs(4 * 3600);
const SEARCH_CACHE_TTL: Duration = Duration::from_secs(2 * 3600);
const ISRC_CACHE_TTL: Duration = Duration::from_secs(24 * 3600);

pub struct SpotifyAdapter {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    token: TokenCache,
    cache: Arc<dyn Cache>,
    url_pattern: Regex,
}

impl SpotifyAdapter {
    pub fn new(client_id: String, client_secret: String, cache: Arc<dyn Cache>) -> Self {
        Self {
            client: new_http_client(),
            client_id,
            client_secret,
            token: TokenCache::new(),
            cache,
            url_pattern: Regex::new(r"(?i)(?:open\.)?spotify\.com/track/([A-Za-z0-9]+)").unwrap(),
        }
    }

    async fn ensure_token(&self) -> Result<String, PlatformError> {
        self.token
            .get_or_refresh(Duration::ZERO, || async {
                #[derive(Deserialize)]
                struct TokenResponse {
                    access_token: String,
                    expires_in: i64,
                }

                let response: TokenResponse = send_json_with_retry(
                    || {
                        self.client
                            .post("https://accounts.spotify.com/api/token")
                            .basic_auth(&self.client_id, Some(&self.client_secret))
                            .form(&[("grant_type", "client_credentials")])
                    },
                    "spotify",
                    "auth",
                )
                .await?;

                Ok((response.access_token, Utc::now() + chrono::Duration::seconds(response.expires_in)))
            })
            .await
    }

    async fn cached_track(&self, cache_key: &str, ttl: Duration, url: &str, token: &str) -> Result<TrackInfo, PlatformError> {
        if let Ok(Some(raw)) = self.cache.get(cache_key).await {
            if let Ok(track) = serde_json::from_slice::<TrackInfo>(&raw) {
                return Ok(track);
            }
        }
        let raw_track: SpotifyTrack = send_json_with_retry(|| self.client.get(url).bearer_auth(token), "spotify", "get_track").await?;
        let track = self.normalize(raw_track);
        if let Ok(bytes) = serde_json::to_vec(&track) {
            let _ = self.cache.set(cache_key, &bytes, ttl).await;
        }
        Ok(track)
    }

    fn select_image(images: &[SpotifyImage]) -> Option<String> {
        images
            .iter()
            .find(|i| matches!(i.width, Some(w) if (300..=640).contains(&w)))
            .or_else(|| images.first())
            .map(|i| i.url.clone())
    }

    fn normalize(&self, track: SpotifyTrack) -> TrackInfo {
        TrackInfo {
            platform: "spotify".to_string(),
            external_id: track.id.clone(),
            url: self.build_url(&track.id),
            title: track.name,
            artists: track.artists.into_iter().map(|a| a.name).collect(),
            album: Some(track.album.name),
            isrc: track.external_ids.and_then(|e| e.isrc),
            duration_ms: Some(track.duration_ms),
            release_date: track.album.release_date,
            explicit: track.explicit,
            popularity: track.popularity,
            image_url: Self::select_image(&track.album.images),
            available: true,
        }
    }
}

#[derive(Deserialize)]
struct SpotifyTrack {
    id: String,
    name: String,
    artists: Vec<SpotifyArtist>,
    album: SpotifyAlbum,
    external_ids: Option<SpotifyExternalIds>,
    duration_ms: u64,
    popularity: Option<u8>,
    #[serde(default)]
    explicit: bool,
}

#[derive(Deserialize)]
struct SpotifyArtist {
    name: String,
}

#[derive(Deserialize)]
struct SpotifyAlbum {
    name: String,
    release_date: Option<String>,
    #[serde(default)]
    images: Vec<SpotifyImage>,
}

#[derive(Deserialize)]
struct SpotifyImage {
    url: String,
    width: Option<u32>,
}

#[derive(Deserialize)]
struct SpotifyExternalIds {
    isrc: Option<String>,
}

#[derive(Deserialize)]
struct SpotifySearchResponse {
    tracks: SpotifyTracksPage,
}

#[derive(Deserialize)]
struct SpotifyTracksPage {
    items: Vec<SpotifyTrack>,
}

#[async_trait]
impl PlatformService for SpotifyAdapter {
    fn platform_name(&self) -> &str {
        "spotify"
    }

    fn url_patterns(&self) -> Vec<crate::models::URLPattern> {
        vec![crate::models::URLPattern::new("spotify", self.url_pattern.clone(), 1)
            .with_description("track path")
            .with_examples(["https://open.spotify.com/track/4iV5W9uYEdYUVa79Axb7Rh"])]
    }

    fn parse_url(&self, url: &str) -> Option<TrackInfo> {
        let id = self.url_pattern.captures(url)?.get(1)?.as_str().to_string();
        Some(TrackInfo {
            platform: "spotify".to_string(),
            external_id: id.clone(),
            url: self.build_url(&id),
            title: String::new(),
            artists: Vec::new(),
            album: None,
            isrc: None,
            duration_ms: None,
            release_date: None,
            explicit: false,
            popularity: None,
            image_url: None,
            available: true,
        })
    }

    async fn get_track_by_id(&self, id: &str) -> Result<TrackInfo, PlatformError> {
        let token = self.ensure_token().await?;
        let cache_key = format!("api:spotify:track:{id}");
        let url = format!("https://api.spotify.com/v1/tracks/{id}");
        self.cached_track(&cache_key, TRACK_CACHE_TTL, &url, &token).await
    }

    async fn search_track(&self, query: &SearchQuery) -> Result<Vec<TrackInfo>, PlatformError> {
        let token = self.ensure_token().await?;
        let limit = if query.limit == 0 { DEFAULT_LIMIT } else { query.limit.min(MAX_LIMIT) };

        let q = if let Some(isrc) = &query.isrc {
            format!("isrc:{isrc}")
        } else if let Some(free) = &query.query {
            free.clone()
        } else {
            let mut parts = Vec::new();
            if let Some(t) = &query.title {
                parts.push(format!("track:\"{t}\""));
            }
            if let Some(a) = &query.artist {
                parts.push(format!("artist:\"{a}\""));
            }
            if let Some(al) = &query.album {
                parts.push(format!("album:\"{al}\""));
            }
            parts.join(" ")
        };

        let cache_key = format!("api:spotify:search:{q}:limit:{limit}");
        let ttl = if query.isrc.is_some() { ISRC_CACHE_TTL } else { SEARCH_CACHE_TTL };

        if let Ok(Some(raw)) = self.cache.get(&cache_key).await {
            if let Ok(tracks) = serde_json::from_slice::<Vec<TrackInfo>>(&raw) {
                return Ok(tracks);
            }
        }

        let response: SpotifySearchResponse = send_json_with_retry(
            || {
                self.client
                    .get("https://api.spotify.com/v1/search")
                    .bearer_auth(&token)
                    .query(&[("q", q.as_str()), ("type", "track"), ("limit", &limit.to_string())])
            },
            "spotify",
            "search",
        )
        .await?;

        let results: Vec<TrackInfo> = response.tracks.items.into_iter().map(|t| self.normalize(t)).collect();
        if let Ok(bytes) = serde_json::to_vec(&results) {
            let _ = self.cache.set(&cache_key, &bytes, ttl).await;
        }
        Ok(results)
    }

    async fn get_track_by_isrc(&self, isrc: &str) -> Result<TrackInfo, PlatformError> {
        let results = self.search_track(&SearchQuery::by_isrc(isrc)).await?;
        results.into_iter().next().ok_or_else(|| PlatformError::not_found("spotify", "get_by_isrc"))
    }

    fn build_url(&self, id: &str) -> String {
        format!("https://open.spotify.com/track/{id}")
    }

    async fn health(&self) -> Result<(), PlatformError> {
        self.ensure_token().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::L1Cache;

    fn adapter() -> SpotifyAdapter {
        SpotifyAdapter::new("client".to_string(), "secret".to_string(), Arc::new(L1Cache::new(16, Duration::from_secs(60))))
    }

    #[test]
    fn select_image_prefers_mid_sized_artwork() {
        let images = vec![
            SpotifyImage { url: "tiny.jpg".to_string(), width: Some(64) },
            SpotifyImage { url: "mid.jpg".to_string(), width: Some(300) },
            SpotifyImage { url: "huge.jpg".to_string(), width: Some(2000) },
        ];
        assert_eq!(SpotifyAdapter::select_image(&images), Some("mid.jpg".to_string()));
    }

    #[test]
    fn select_image_falls_back_to_first_when_none_in_range() {
        let images = vec![SpotifyImage { url: "tiny.jpg".to_string(), width: Some(64) }];
        assert_eq!(SpotifyAdapter::select_image(&images), Some("tiny.jpg".to_string()));
    }

    #[test]
    fn parse_url_extracts_track_id() {
        let adapter = adapter();
        let track = adapter.parse_url("https://open.spotify.com/track/4iV5W9uYEdYUVa79Axb7Rh?si=abc").unwrap();
        assert_eq!(track.external_id, "4iV5W9uYEdYUVa79Axb7Rh");
    }

    #[test]
    fn parse_url_rejects_non_spotify_urls() {
        let adapter = adapter();
        assert!(adapter.parse_url("https://music.apple.com/us/song/x/123").is_none());
    }
}
