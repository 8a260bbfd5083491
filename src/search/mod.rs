//! Search Coordinator (C8) and Relevance Scorer (C7).

mod scorer;

pub use scorer::aggregate_popularity;

use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;

use crate::models::{SearchQuery, SearchResult};
use crate::platform::PlatformService;

pub struct SearchCoordinator {
    adapters: HashMap<String, Arc<dyn PlatformService>>,
    popularity_boost_multiplier: f64,
}

impl SearchCoordinator {
    pub fn new(adapters: HashMap<String, Arc<dyn PlatformService>>, popularity_boost_multiplier: f64) -> Self {
        Self {
            adapters,
            popularity_boost_multiplier,
        }
    }

    /// Fans out to every adapter matching `platform_filter` in parallel,
    /// swallowing per-adapter errors, then ranks the merged list with
    /// ISRC-grouping applied before scoring.
    pub async fn search_platforms(&self, query: &SearchQuery, platform_filter: Option<&str>, limit: u32) -> Vec<SearchResult> {
        let targets: Vec<(&String, &Arc<dyn PlatformService>)> = match platform_filter {
            Some(name) => self.adapters.get_key_value(name).into_iter().collect(),
            None => self.adapters.iter().collect(),
        };

        let fetches = targets.into_iter().map(|(name, adapter)| {
            let adapter = adapter.clone();
            let name = name.clone();
            let query = query.clone();
            async move {
                match adapter.search_track(&query).await {
                    Ok(tracks) => tracks
                        .into_iter()
                        .map(|track| SearchResult { track, source: name.clone(), score: 0.0 })
                        .collect::<Vec<_>>(),
                    Err(e) => {
                        tracing::warn!(platform = %name, error = %e, "search failed on adapter, skipping");
                        Vec::new()
                    }
                }
            }
        });

        let mut merged: Vec<SearchResult> = join_all(fetches).await.into_iter().flatten().collect();

        let scored: Vec<f64> = merged
            .iter()
            .enumerate()
            .map(|(i, result)| scorer::score(result, query, i, &merged, self.popularity_boost_multiplier))
            .collect();

        for (result, score) in merged.iter_mut().zip(scored) {
            result.score = score;
        }

        merged.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.source.cmp(&b.source))
                .then_with(|| a.track.external_id.cmp(&b.track.external_id))
        });

        merged.truncate(limit as usize);
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TrackInfo;
    use crate::platform::fake::FakePlatform;

    fn track(title: &str, artist: &str, popularity: Option<u8>) -> TrackInfo {
        TrackInfo {
            platform: "spotify".to_string(),
            external_id: "x".to_string(),
            url: "https://example.com/x".to_string(),
            title: title.to_string(),
            artists: vec![artist.to_string()],
            album: None,
            isrc: None,
            duration_ms: None,
            release_date: None,
            explicit: false,
            popularity,
            image_url: None,
            available: true,
        }
    }

    #[tokio::test]
    async fn canonical_recording_outranks_zero_popularity_cover() {
        let spotify = FakePlatform::new("spotify").with_search_results(vec![
            track("Bohemian Rhapsody", "Queen", Some(90)),
            track("Bohemian Rhapsody", "Cover Band", Some(0)),
        ]);
        let mut adapters: HashMap<String, Arc<dyn PlatformService>> = HashMap::new();
        adapters.insert("spotify".to_string(), Arc::new(spotify));

        let coordinator = SearchCoordinator::new(adapters, 1.0);
        let query = SearchQuery::free_form("Bohemian Rhapsody", 10);
        let results = coordinator.search_platforms(&query, None, 10).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].track.artists[0], "Queen");
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn a_failing_adapter_is_skipped_not_fatal() {
        let failing = FakePlatform::new("tidal").failing_search();
        let working = FakePlatform::new("spotify").with_search_results(vec![track("Test Song", "Test Artist", Some(50))]);

        let mut adapters: HashMap<String, Arc<dyn PlatformService>> = HashMap::new();
        adapters.insert("tidal".to_string(), Arc::new(failing));
        adapters.insert("spotify".to_string(), Arc::new(working));

        let coordinator = SearchCoordinator::new(adapters, 1.0);
        let query = SearchQuery::free_form("Test Song", 10);
        let results = coordinator.search_platforms(&query, None, 10).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source, "spotify");
    }

    #[tokio::test]
    async fn platform_filter_restricts_to_named_adapter() {
        let spotify = FakePlatform::new("spotify").with_search_results(vec![track("A", "X", Some(10))]);
        let tidal = FakePlatform::new("tidal").with_search_results(vec![track("B", "Y", Some(10))]);

        let mut adapters: HashMap<String, Arc<dyn PlatformService>> = HashMap::new();
        adapters.insert("spotify".to_string(), Arc::new(spotify));
        adapters.insert("tidal".to_string(), Arc::new(tidal));

        let coordinator = SearchCoordinator::new(adapters, 1.0);
        let query = SearchQuery::free_form("x", 10);
        let results = coordinator.search_platforms(&query, Some("tidal"), 10).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source, "tidal");
    }
}
