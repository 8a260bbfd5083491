//! Scriptable fake [`PlatformService`] (C12) driving resolver/search tests
//! without real network access.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::PlatformService;
use crate::error::PlatformError;
use crate::models::{SearchQuery, TrackInfo};

#[derive(Default)]
pub struct FakePlatform {
    name: String,
    by_id: Mutex<HashMap<String, TrackInfo>>,
    by_isrc: Mutex<HashMap<String, TrackInfo>>,
    search_results: Mutex<Vec<TrackInfo>>,
    fail_isrc_lookup: Mutex<bool>,
    fail_search: Mutex<bool>,
}

impl FakePlatform {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_track(self, id: impl Into<String>, track: TrackInfo) -> Self {
        self.by_id.lock().unwrap().insert(id.into(), track);
        self
    }

    pub fn with_isrc(self, isrc: impl Into<String>, track: TrackInfo) -> Self {
        self.by_isrc.lock().unwrap().insert(isrc.into(), track);
        self
    }

    pub fn with_search_results(self, tracks: Vec<TrackInfo>) -> Self {
        *self.search_results.lock().unwrap() = tracks;
        self
    }

    pub fn failing_isrc_lookup(self) -> Self {
        *self.fail_isrc_lookup.lock().unwrap() = true;
        self
    }

    pub fn failing_search(self) -> Self {
        *self.fail_search.lock().unwrap() = true;
        self
    }
}

#[async_trait]
impl PlatformService for FakePlatform {
    fn platform_name(&self) -> &str {
        &self.name
    }

    fn url_patterns(&self) -> Vec<crate::models::URLPattern> {
        Vec::new()
    }

    fn parse_url(&self, url: &str) -> Option<TrackInfo> {
        self.by_id.lock().unwrap().values().find(|t| t.url == url).cloned()
    }

    async fn get_track_by_id(&self, id: &str) -> Result<TrackInfo, PlatformError> {
        self.by_id
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| PlatformError::not_found(&self.name, "get_track_by_id"))
    }

    async fn search_track(&self, _query: &SearchQuery) -> Result<Vec<TrackInfo>, PlatformError> {
        if *self.fail_search.lock().unwrap() {
            return Err(PlatformError::new(&self.name, "search_track", "simulated adapter failure"));
        }
        Ok(self.search_results.lock().unwrap().clone())
    }

    async fn get_track_by_isrc(&self, isrc: &str) -> Result<TrackInfo, PlatformError> {
        if *self.fail_isrc_lookup.lock().unwrap() {
            return Err(PlatformError::not_found(&self.name, "get_track_by_isrc"));
        }
        self.by_isrc
            .lock()
            .unwrap()
            .get(isrc)
            .cloned()
            .ok_or_else(|| PlatformError::not_found(&self.name, "get_track_by_isrc"))
    }

    fn build_url(&self, id: &str) -> String {
        format!("https://example.com/{}/{id}", self.name)
    }

    async fn health(&self) -> Result<(), PlatformError> {
        Ok(())
    }
}
