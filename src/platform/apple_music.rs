use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::http::{new_http_client, send_json_with_retry};
use super::token::TokenCache;
use super::PlatformService;
use crate::cache::Cache;
use crate::error::PlatformError;
use crate::models::{SearchQuery, TrackInfo};

const DEFAULT_LIMIT: u32 = 10;
const MAX_LIMIT: u32 = 25;
const TRACK_CACHE_TTL: Duration = Duration::from_secs(4 * 3600);
const SEARCH_CACHE_TTL: Duration = Duration::from_secs(2 * 3600);
const ISRC_CACHE_TTL: Duration = Duration::from_secs(24 * 3600);
const TOKEN_LIFETIME_SECS: i64 = 60 * 60;
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(5 * 60);
const ARTWORK_SIZE: &str = "400";

#[derive(Serialize)]
struct Claims {
    iss: String,
    iat: i64,
    exp: i64,
}

pub struct AppleMusicAdapter {
    client: reqwest::Client,
    key_id: String,
    team_id: String,
    /// `None` when the private key failed to load at construction; the
    /// adapter still exists so it can be registered, but every call that
    /// needs a token fails and `health` reports the failure.
    signing_key: Option<EncodingKey>,
    token: TokenCache,
    cache: Arc<dyn Cache>,
    url_pattern: Regex,
}

impl AppleMusicAdapter {
    pub fn new(key_id: String, team_id: String, private_key_pem: &str, cache: Arc<dyn Cache>) -> Self {
        let signing_key = match EncodingKey::from_ec_pem(private_key_pem.as_bytes()) {
            Ok(key) => Some(key),
            Err(e) => {
                tracing::error!(error = %e, "failed to load Apple Music private key, adapter will be unhealthy");
                None
            }
        };
        Self {
            client: new_http_client(),
            key_id,
            team_id,
            signing_key,
            token: TokenCache::new(),
            cache,
            url_pattern: Regex::new(r"(?i)music\.apple\.com/[a-z]{2}/(?:album|song)/(?:[^/]+/)?(\d+)").unwrap(),
        }
    }

    async fn ensure_token(&self) -> Result<String, PlatformError> {
        let signing_key = self
            .signing_key
            .as_ref()
            .ok_or_else(|| PlatformError::new("apple_music", "auth", "private key failed to load"))?;

        self.token
            .get_or_refresh(TOKEN_REFRESH_MARGIN, || async {
                let now = Utc::now().timestamp();
                let claims = Claims {
                    iss: self.team_id.clone(),
                    iat: now,
                    exp: now + TOKEN_LIFETIME_SECS,
                };
                let mut header = Header::new(Algorithm::ES256);
                header.kid = Some(self.key_id.clone());
                let token = encode(&header, &claims, signing_key)
                    .map_err(|e| PlatformError::new("apple_music", "auth", "failed to mint JWT").with_cause(e))?;
                Ok((token, Utc::now() + chrono::Duration::seconds(TOKEN_LIFETIME_SECS)))
            })
            .await
    }

    fn select_image(artwork: &Option<AppleArtwork>) -> Option<String> {
        artwork.as_ref().map(|art| {
            art.url
                .replace("{w}", ARTWORK_SIZE)
                .replace("{h}", ARTWORK_SIZE)
        })
    }

    fn normalize(&self, id: String, attrs: AppleSongAttributes) -> TrackInfo {
        TrackInfo {
            platform: "apple_music".to_string(),
            external_id: id.clone(),
            url: self.build_url(&id),
            title: attrs.name,
            artists: vec![attrs.artist_name],
            album: Some(attrs.album_name),
            isrc: attrs.isrc,
            duration_ms: attrs.duration_in_millis,
            release_date: attrs.release_date,
            explicit: attrs.content_rating.as_deref() == Some("explicit"),
            popularity: None,
            image_url: Self::select_image(&attrs.artwork),
            available: true,
        }
    }
}

#[derive(Deserialize)]
struct AppleResource {
    id: String,
    attributes: AppleSongAttributes,
}

#[derive(Deserialize)]
struct AppleSongAttributes {
    name: String,
    #[serde(rename = "artistName")]
    artist_name: String,
    #[serde(rename = "albumName")]
    album_name: String,
    isrc: Option<String>,
    #[serde(rename = "durationInMillis")]
    duration_in_millis: Option<u64>,
    #[serde(rename = "releaseDate")]
    release_date: Option<String>,
    #[serde(rename = "contentRating")]
    content_rating: Option<String>,
    artwork: Option<AppleArtwork>,
}

#[derive(Deserialize)]
struct AppleArtwork {
    url: String,
}

#[derive(Deserialize)]
struct AppleDataResponse<T> {
    data: Vec<T>,
}

#[derive(Deserialize)]
struct AppleSearchResults {
    results: AppleSearchSongs,
}

#[derive(Deserialize, Default)]
struct AppleSearchSongs {
    songs: Option<AppleDataResponse<AppleResource>>,
}

#[async_trait]
impl PlatformService for AppleMusicAdapter {
    fn platform_name(&self) -> &str {
        "apple_music"
    }

    fn url_patterns(&self) -> Vec<crate::models::URLPattern> {
        vec![crate::models::URLPattern::new("apple_music", self.url_pattern.clone(), 1)
            .with_description("album/song path")
            .with_examples(["https://music.apple.com/us/song/bohemian-rhapsody/1440857781"])]
    }

    fn parse_url(&self, url: &str) -> Option<TrackInfo> {
        let id = self.url_pattern.captures(url)?.get(1)?.as_str().to_string();
        Some(TrackInfo {
            platform: "apple_music".to_string(),
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
        let cache_key = format!("api:apple_music:track:{id}");
        if let Ok(Some(raw)) = self.cache.get(&cache_key).await {
            if let Ok(track) = serde_json::from_slice::<TrackInfo>(&raw) {
                return Ok(track);
            }
        }

        let url = format!("https://api.music.apple.com/v1/catalog/us/songs/{id}");
        let response: AppleDataResponse<AppleResource> = send_json_with_retry(
            || self.client.get(&url).bearer_auth(&token),
            "apple_music",
            "get_track",
        )
        .await?;
        let resource = response
            .data
            .into_iter()
            .next()
            .ok_or_else(|| PlatformError::not_found("apple_music", "get_track"))?;
        let track = self.normalize(resource.id, resource.attributes);
        if let Ok(bytes) = serde_json::to_vec(&track) {
            let _ = self.cache.set(&cache_key, &bytes, TRACK_CACHE_TTL).await;
        }
        Ok(track)
    }

    async fn search_track(&self, query: &SearchQuery) -> Result<Vec<TrackInfo>, PlatformError> {
        let token = self.ensure_token().await?;
        let limit = if query.limit == 0 { DEFAULT_LIMIT } else { query.limit.min(MAX_LIMIT) };

        let term = if let Some(isrc) = &query.isrc {
            format!("isrc:{isrc}")
        } else {
            query.query.clone().unwrap_or_else(|| query.as_free_text())
        };

        let cache_key = format!("api:apple_music:search:{term}:limit:{limit}");
        let ttl = if query.isrc.is_some() { ISRC_CACHE_TTL } else { SEARCH_CACHE_TTL };

        if let Ok(Some(raw)) = self.cache.get(&cache_key).await {
            if let Ok(tracks) = serde_json::from_slice::<Vec<TrackInfo>>(&raw) {
                return Ok(tracks);
            }
        }

        let response: AppleSearchResults = send_json_with_retry(
            || {
                self.client
                    .get("https://api.music.apple.com/v1/catalog/us/search")
                    .bearer_auth(&token)
                    .query(&[("term", term.as_str()), ("types", "songs"), ("limit", &limit.to_string())])
            },
            "apple_music",
            "search",
        )
        .await?;

        let results: Vec<TrackInfo> = response
            .results
            .songs
            .map(|s| s.data)
            .unwrap_or_default()
            .into_iter()
            .map(|r| self.normalize(r.id, r.attributes))
            .collect();

        if let Ok(bytes) = serde_json::to_vec(&results) {
            let _ = self.cache.set(&cache_key, &bytes, ttl).await;
        }
        Ok(results)
    }

    async fn get_track_by_isrc(&self, isrc: &str) -> Result<TrackInfo, PlatformError> {
        let results = self.search_track(&SearchQuery::by_isrc(isrc)).await?;
        results.into_iter().next().ok_or_else(|| PlatformError::not_found("apple_music", "get_by_isrc"))
    }

    fn build_url(&self, id: &str) -> String {
        format!("https://music.apple.com/us/song/_/{id}")
    }

    async fn health(&self) -> Result<(), PlatformError> {
        self.ensure_token().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::L1Cache;

    fn adapter() -> AppleMusicAdapter {
        AppleMusicAdapter::new(
            "KEYID123".to_string(),
            "TEAMID456".to_string(),
            "not a real pem",
            Arc::new(L1Cache::new(16, Duration::from_secs(60))),
        )
    }

    #[test]
    fn construction_survives_an_invalid_private_key() {
        let adapter = adapter();
        assert!(adapter.signing_key.is_none());
    }

    #[tokio::test]
    async fn health_fails_when_signing_key_failed_to_load() {
        let adapter = adapter();
        assert!(adapter.health().await.is_err());
    }

    #[test]
    fn parse_url_extracts_song_id_from_album_path() {
        let adapter = adapter();
        let track = adapter.parse_url("https://music.apple.com/us/song/bohemian-rhapsody/1440857781").unwrap();
        assert_eq!(track.external_id, "1440857781");
    }

    #[test]
    fn select_image_substitutes_both_dimensions() {
        let artwork = Some(AppleArtwork { url: "https://example.com/{w}x{h}bb.jpg".to_string() });
        assert_eq!(AppleMusicAdapter::select_image(&artwork), Some("https://example.com/400x400bb.jpg".to_string()));
    }

    #[test]
    fn select_image_is_none_without_artwork() {
        assert_eq!(AppleMusicAdapter::select_image(&None), None);
    }
}
