use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
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
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);
const AUTH_BASE_URL: &str = "https://auth.tidal.com";
const API_BASE_URL: &str = "https://openapi.tidal.com";

pub struct TidalAdapter {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    token: TokenCache,
    cache: Arc<dyn Cache>,
    /// Tidal track URLs come in two incompatible shapes; both are tried
    /// in order and the first match wins.
    url_patterns: Vec<Regex>,
    auth_base_url: String,
    api_base_url: String,
}

impl TidalAdapter {
    pub fn new(client_id: String, client_secret: String, cache: Arc<dyn Cache>) -> Self {
        Self {
            client: new_http_client(),
            client_id,
            client_secret,
            token: TokenCache::new(),
            cache,
            url_patterns: vec![
                Regex::new(r"(?i)(?:listen\.|www\.)?tidal\.com/(?:browse/)?track/(\d+)").unwrap(),
                Regex::new(r"(?i)tidal\.com/.*[?&]trackId=(\d+)").unwrap(),
            ],
            auth_base_url: AUTH_BASE_URL.to_string(),
            api_base_url: API_BASE_URL.to_string(),
        }
    }

    /// Redirects the adapter at a mock server instead of the real Tidal
    /// hosts. Used by integration tests driving a `wiremock` server.
    pub fn with_base_urls(mut self, auth_base_url: impl Into<String>, api_base_url: impl Into<String>) -> Self {
        self.auth_base_url = auth_base_url.into();
        self.api_base_url = api_base_url.into();
        self
    }

    async fn ensure_token(&self) -> Result<String, PlatformError> {
        self.token
            .get_or_refresh(TOKEN_REFRESH_MARGIN, || async {
                #[derive(Deserialize)]
                struct TokenResponse {
                    access_token: String,
                    expires_in: i64,
                }

                let token_url = format!("{}/v1/oauth2/token", self.auth_base_url);
                let response: TokenResponse = send_json_with_retry(
                    || {
                        self.client
                            .post(&token_url)
                            .basic_auth(&self.client_id, Some(&self.client_secret))
                            .form(&[("grant_type", "client_credentials"), ("scope", "READ_SEARCH")])
                    },
                    "tidal",
                    "auth",
                )
                .await?;

                Ok((response.access_token, Utc::now() + chrono::Duration::seconds(response.expires_in)))
            })
            .await
    }

    fn select_image(cover: &Option<String>) -> Option<String> {
        cover.as_ref().map(|id| format!("https://resources.tidal.com/images/{}/640x640.jpg", id.replace('-', "/")))
    }

    fn normalize(&self, resource: &TidalResource, included: &[TidalIncluded]) -> TrackInfo {
        let attrs = &resource.attributes;

        let artists: Vec<String> = resource
            .relationships
            .as_ref()
            .and_then(|r| r.artists.as_ref())
            .map(|rel| {
                rel.data
                    .iter()
                    .filter_map(|ref_item| {
                        included
                            .iter()
                            .find(|inc| inc.id == ref_item.id && inc.resource_type == "artists")
                            .and_then(|inc| inc.attributes.name.clone())
                    })
                    .collect()
            })
            .unwrap_or_default();

        let album_resource = resource
            .relationships
            .as_ref()
            .and_then(|r| r.albums.as_ref())
            .and_then(|rel| rel.data.first())
            .and_then(|ref_item| included.iter().find(|inc| inc.id == ref_item.id && inc.resource_type == "albums"));

        let album = album_resource.and_then(|inc| inc.attributes.title.clone());
        let cover_id = album_resource.and_then(|inc| inc.attributes.cover_art.clone());

        TrackInfo {
            platform: "tidal".to_string(),
            external_id: resource.id.clone(),
            url: self.build_url(&resource.id),
            title: attrs.title.clone().unwrap_or_default(),
            artists,
            album,
            isrc: attrs.isrc.clone(),
            duration_ms: attrs.duration.map(|s| s * 1000),
            release_date: None,
            explicit: attrs.explicit.unwrap_or(false),
            popularity: attrs.popularity.map(|p| (p * 100.0).round().clamp(0.0, 100.0) as u8),
            image_url: Self::select_image(&cover_id),
            available: true,
        }
    }
}

#[derive(Deserialize)]
struct TidalRef {
    id: String,
}

#[derive(Deserialize)]
struct TidalRelationship {
    data: Vec<TidalRef>,
}

#[derive(Deserialize, Default)]
struct TidalRelationships {
    artists: Option<TidalRelationship>,
    albums: Option<TidalRelationship>,
}

#[derive(Deserialize)]
struct TidalTrackAttributes {
    title: Option<String>,
    isrc: Option<String>,
    duration: Option<u64>,
    explicit: Option<bool>,
    popularity: Option<f64>,
}

#[derive(Deserialize)]
struct TidalResource {
    id: String,
    attributes: TidalTrackAttributes,
    relationships: Option<TidalRelationships>,
}

#[derive(Deserialize)]
struct TidalIncludedAttributes {
    name: Option<String>,
    title: Option<String>,
    #[serde(rename = "coverArt")]
    cover_art: Option<String>,
}

#[derive(Deserialize)]
struct TidalIncluded {
    id: String,
    #[serde(rename = "type")]
    resource_type: String,
    attributes: TidalIncludedAttributes,
}

#[derive(Deserialize)]
struct TidalSingleResponse {
    data: TidalResource,
    #[serde(default)]
    included: Vec<TidalIncluded>,
}

#[derive(Deserialize)]
struct TidalListResponse {
    data: Vec<TidalResource>,
    #[serde(default)]
    included: Vec<TidalIncluded>,
}

#[async_trait]
impl PlatformService for TidalAdapter {
    fn platform_name(&self) -> &str {
        "tidal"
    }

    fn url_patterns(&self) -> Vec<crate::models::URLPattern> {
        vec![
            crate::models::URLPattern::new("tidal", self.url_patterns[0].clone(), 1)
                .with_description("bare track path")
                .with_examples(["https://tidal.com/browse/track/12345"]),
            crate::models::URLPattern::new("tidal", self.url_patterns[1].clone(), 1)
                .with_description("trackId query param")
                .with_examples(["https://tidal.com/album/1?trackId=12345"]),
        ]
    }

    fn parse_url(&self, url: &str) -> Option<TrackInfo> {
        let id = self.url_patterns.iter().find_map(|p| p.captures(url).and_then(|c| c.get(1)).map(|m| m.as_str().to_string()))?;
        Some(TrackInfo {
            platform: "tidal".to_string(),
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
        let cache_key = format!("api:tidal:track:{id}");
        if let Ok(Some(raw)) = self.cache.get(&cache_key).await {
            if let Ok(track) = serde_json::from_slice::<TrackInfo>(&raw) {
                return Ok(track);
            }
        }

        let url = format!("{}/v2/tracks/{id}?countryCode=US&include=artists,albums", self.api_base_url);
        let response: TidalSingleResponse = send_json_with_retry(
            || {
                self.client
                    .get(&url)
                    .bearer_auth(&token)
                    .header("Content-Type", "application/vnd.api+json")
            },
            "tidal",
            "get_track",
        )
        .await?;

        let track = self.normalize(&response.data, &response.included);
        if let Ok(bytes) = serde_json::to_vec(&track) {
            let _ = self.cache.set(&cache_key, &bytes, TRACK_CACHE_TTL).await;
        }
        Ok(track)
    }

    async fn search_track(&self, query: &SearchQuery) -> Result<Vec<TrackInfo>, PlatformError> {
        let token = self.ensure_token().await?;
        let limit = if query.limit == 0 { DEFAULT_LIMIT } else { query.limit.min(MAX_LIMIT) };

        if let Some(isrc) = &query.isrc {
            let cache_key = format!("api:tidal:search:isrc:{isrc}:limit:{limit}");
            if let Ok(Some(raw)) = self.cache.get(&cache_key).await {
                if let Ok(tracks) = serde_json::from_slice::<Vec<TrackInfo>>(&raw) {
                    return Ok(tracks);
                }
            }

            let url = format!("{}/v2/tracks?countryCode=US&filter[isrc]={isrc}&include=artists,albums", self.api_base_url);
            let response: TidalListResponse = send_json_with_retry(
                || self.client.get(&url).bearer_auth(&token).header("Content-Type", "application/vnd.api+json"),
                "tidal",
                "search_by_isrc",
            )
            .await?;

            let results: Vec<TrackInfo> = response.data.iter().map(|r| self.normalize(r, &response.included)).collect();
            if let Ok(bytes) = serde_json::to_vec(&results) {
                let _ = self.cache.set(&cache_key, &bytes, ISRC_CACHE_TTL).await;
            }
            return Ok(results);
        }

        let term = query.query.clone().unwrap_or_else(|| query.as_free_text());
        let cache_key = format!("api:tidal:search:{term}:limit:{limit}");

        if let Ok(Some(raw)) = self.cache.get(&cache_key).await {
            if let Ok(tracks) = serde_json::from_slice::<Vec<TrackInfo>>(&raw) {
                return Ok(tracks);
            }
        }

        let params: HashMap<&str, String> = HashMap::from([
            ("countryCode", "US".to_string()),
            ("query", term),
            ("include", "artists,albums".to_string()),
            ("limit", limit.to_string()),
        ]);

        let search_url = format!("{}/v2/searchResults/tracks", self.api_base_url);
        let response: TidalListResponse = send_json_with_retry(
            || {
                self.client
                    .get(&search_url)
                    .bearer_auth(&token)
                    .header("Content-Type", "application/vnd.api+json")
                    .query(&params)
            },
            "tidal",
            "search",
        )
        .await?;

        let results: Vec<TrackInfo> = response.data.iter().map(|r| self.normalize(r, &response.included)).collect();
        if let Ok(bytes) = serde_json::to_vec(&results) {
            let _ = self.cache.set(&cache_key, &bytes, SEARCH_CACHE_TTL).await;
        }
        Ok(results)
    }

    async fn get_track_by_isrc(&self, isrc: &str) -> Result<TrackInfo, PlatformError> {
        let results = self.search_track(&SearchQuery::by_isrc(isrc)).await?;
        results.into_iter().next().ok_or_else(|| PlatformError::not_found("tidal", "get_by_isrc"))
    }

    fn build_url(&self, id: &str) -> String {
        format!("https://tidal.com/browse/track/{id}")
    }

    async fn health(&self) -> Result<(), PlatformError> {
        self.ensure_token().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::L1Cache;

    fn adapter() -> TidalAdapter {
        TidalAdapter::new("client".to_string(), "secret".to_string(), Arc::new(L1Cache::new(16, Duration::from_secs(60))))
    }

    #[test]
    fn parse_url_matches_bare_track_path() {
        let adapter = adapter();
        let track = adapter.parse_url("https://tidal.com/browse/track/77646168").unwrap();
        assert_eq!(track.external_id, "77646168");
    }

    #[test]
    fn parse_url_matches_track_id_query_param() {
        let adapter = adapter();
        let track = adapter.parse_url("https://tidal.com/album/1?trackId=77646168").unwrap();
        assert_eq!(track.external_id, "77646168");
    }

    #[test]
    fn select_image_rewrites_cover_id_to_resource_url() {
        let cover = Some("1234-5678-90ab".to_string());
        assert_eq!(
            TidalAdapter::select_image(&cover),
            Some("https://resources.tidal.com/images/1234/5678/90ab/640x640.jpg".to_string())
        );
    }

    #[test]
    fn normalize_resolves_artist_and_album_through_included() {
        let adapter = adapter();
        let resource = TidalResource {
            id: "77646168".to_string(),
            attributes: TidalTrackAttributes {
                title: Some("Bohemian Rhapsody".to_string()),
                isrc: Some("GBUM71507208".to_string()),
                duration: Some(354),
                explicit: Some(false),
                popularity: Some(0.9),
            },
            relationships: Some(TidalRelationships {
                artists: Some(TidalRelationship { data: vec![TidalRef { id: "a1".to_string() }] }),
                albums: Some(TidalRelationship { data: vec![TidalRef { id: "al1".to_string() }] }),
            }),
        };
        let included = vec![
            TidalIncluded {
                id: "a1".to_string(),
                resource_type: "artists".to_string(),
                attributes: TidalIncludedAttributes { name: Some("Queen".to_string()), title: None, cover_art: None },
            },
            TidalIncluded {
                id: "al1".to_string(),
                resource_type: "albums".to_string(),
                attributes: TidalIncludedAttributes {
                    name: None,
                    title: Some("A Night at the Opera".to_string()),
                    cover_art: Some("1234-5678".to_string()),
                },
            },
        ];

        let track = adapter.normalize(&resource, &included);
        assert_eq!(track.artists, vec!["Queen".to_string()]);
        assert_eq!(track.album, Some("A Night at the Opera".to_string()));
        assert_eq!(track.duration_ms, Some(354_000));
        assert_eq!(track.popularity, Some(90));
        assert!(track.image_url.unwrap().contains("1234/5678"));
    }
}
