use serde::{Deserialize, Serialize};

/// A single external track fetch as produced by a [`crate::platform::PlatformService`]
/// and consumed by the resolution service. Transient — never persisted as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackInfo {
    pub platform: String,
    pub external_id: String,
    pub url: String,
    pub title: String,
    pub artists: Vec<String>,
    pub album: Option<String>,
    pub isrc: Option<String>,
    pub duration_ms: Option<u64>,
    pub release_date: Option<String>,
    pub explicit: bool,
    pub popularity: Option<u8>,
    pub image_url: Option<String>,
    pub available: bool,
}

impl TrackInfo {
    pub fn primary_artist(&self) -> String {
        self.artists.join(", ")
    }
}

/// A scored, source-tagged track as produced by the search coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub track: TrackInfo,
    pub source: String,
    pub score: f64,
}
