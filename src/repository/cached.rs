use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::SongRepository;
use crate::cache::{is_negative, Cache, NEGATIVE_SENTINEL};
use crate::error::RepositoryError;
use crate::models::Song;

const ENTITY_TTL: Duration = Duration::from_secs(3600);
const NEGATIVE_TTL: Duration = Duration::from_secs(300);
const SEARCH_TTL: Duration = Duration::from_secs(300);
const SEARCH_INVALIDATE_LIMITS: [u32; 4] = [10, 25, 50, 100];

/// Decorator over a [`SongRepository`] adding per-entity caching, negative
/// caching, and write-through invalidation. Search caches are *not*
/// invalidated on writes — their short TTL subsumes staleness.
pub struct CachedRepository {
    inner: Arc<dyn SongRepository>,
    cache: Arc<dyn Cache>,
}

impl CachedRepository {
    pub fn new(inner: Arc<dyn SongRepository>, cache: Arc<dyn Cache>) -> Self {
        Self { inner, cache }
    }

    fn key_id(id: &str) -> String {
        format!("song:id:{id}")
    }

    fn key_isrc(isrc: &str) -> String {
        format!("song:isrc:{isrc}")
    }

    fn key_platform(platform: &str, external_id: &str) -> String {
        format!("song:platform:{platform}:{external_id}")
    }

    fn key_prefix(prefix: &str) -> String {
        format!("song:prefix:{prefix}")
    }

    fn key_search(query: &str, limit: u32) -> String {
        format!("song:search:{query}:limit:{limit}")
    }

    async fn read_through<F, Fut>(&self, key: &str, ttl: Duration, fetch: F) -> Result<Option<Song>, RepositoryError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Option<Song>, RepositoryError>>,
    {
        match self.cache.get(key).await {
            Ok(Some(raw)) => {
                if is_negative(&raw) {
                    return Ok(None);
                }
                if let Ok(song) = serde_json::from_slice::<Song>(&raw) {
                    return Ok(Some(song));
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, key, "cache read failed, falling through to repository"),
        }

        let result = fetch().await?;
        self.populate(key, &result, ttl).await;
        Ok(result)
    }

    async fn populate(&self, key: &str, result: &Option<Song>, ttl: Duration) {
        let (bytes, ttl): (Vec<u8>, Duration) = match result {
            Some(song) => match serde_json::to_vec(song) {
                Ok(bytes) => (bytes, ttl),
                Err(e) => {
                    tracing::warn!(error = %e, key, "failed to encode song for cache");
                    return;
                }
            },
            None => (NEGATIVE_SENTINEL.to_vec(), NEGATIVE_TTL),
        };
        if let Err(e) = self.cache.set(key, &bytes, ttl).await {
            tracing::warn!(error = %e, key, "cache write failed");
        }
    }

    async fn invalidate_entity(&self, song: &Song) {
        let keys: Vec<String> = std::iter::once(Self::key_id(&song.id))
            .chain((!song.isrc.is_empty()).then(|| Self::key_isrc(&song.isrc)))
            .chain(song.platform_links.iter().map(|l| Self::key_platform(&l.platform, &l.external_id)))
            .collect();
        for key in keys {
            if let Err(e) = self.cache.delete(&key).await {
                tracing::warn!(error = %e, key, "cache invalidation failed");
            }
        }
    }

    /// Explicit hook: deletes the base search key plus the fixed set of
    /// limit-suffixed variants.
    pub async fn invalidate_search_cache(&self, query: &str) {
        for limit in SEARCH_INVALIDATE_LIMITS {
            let key = Self::key_search(query, limit);
            if let Err(e) = self.cache.delete(&key).await {
                tracing::warn!(error = %e, key, "search cache invalidation failed");
            }
        }
    }
}

#[async_trait]
impl SongRepository for CachedRepository {
    async fn save(&self, song: Song) -> Result<Song, RepositoryError> {
        let saved = self.inner.save(song).await?;
        self.invalidate_entity(&saved).await;
        Ok(saved)
    }

    async fn update(&self, song: &Song) -> Result<(), RepositoryError> {
        self.inner.update(song).await?;
        self.invalidate_entity(song).await;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Song>, RepositoryError> {
        let key = Self::key_id(id);
        let inner = self.inner.clone();
        let id = id.to_string();
        self.read_through(&key, ENTITY_TTL, || async move { inner.find_by_id(&id).await })
            .await
    }

    async fn find_by_isrc(&self, isrc: &str) -> Result<Option<Song>, RepositoryError> {
        let key = Self::key_isrc(isrc);
        let inner = self.inner.clone();
        let isrc = isrc.to_string();
        self.read_through(&key, ENTITY_TTL, || async move { inner.find_by_isrc(&isrc).await })
            .await
    }

    async fn find_by_platform_id(&self, platform: &str, external_id: &str) -> Result<Option<Song>, RepositoryError> {
        let key = Self::key_platform(platform, external_id);
        let inner = self.inner.clone();
        let platform = platform.to_string();
        let external_id = external_id.to_string();
        self.read_through(&key, ENTITY_TTL, || async move { inner.find_by_platform_id(&platform, &external_id).await })
            .await
    }

    async fn find_by_id_prefix(&self, prefix: &str) -> Result<Option<Song>, RepositoryError> {
        let key = Self::key_prefix(prefix);
        let inner = self.inner.clone();
        let prefix_owned = prefix.to_string();
        self.read_through(&key, ENTITY_TTL, || async move { inner.find_by_id_prefix(&prefix_owned).await })
            .await
    }

    async fn find_by_title_artist(&self, title: &str, artist: &str) -> Result<Vec<Song>, RepositoryError> {
        // Uncached: the resolver calls this only on the fuzzy-fallback path,
        // which is already rare relative to the indexed lookups above.
        self.inner.find_by_title_artist(title, artist).await
    }

    async fn search(&self, query: &str, limit: u32) -> Result<Vec<Song>, RepositoryError> {
        let key = Self::key_search(query, limit);
        match self.cache.get(&key).await {
            Ok(Some(raw)) if !is_negative(&raw) => {
                if let Ok(songs) = serde_json::from_slice::<Vec<Song>>(&raw) {
                    return Ok(songs);
                }
            }
            _ => {}
        }
        let results = self.inner.search(query, limit).await?;
        if let Ok(bytes) = serde_json::to_vec(&results) {
            if let Err(e) = self.cache.set(&key, &bytes, SEARCH_TTL).await {
                tracing::warn!(error = %e, key, "search cache write failed");
            }
        }
        Ok(results)
    }

    async fn find_many(&self, ids: &[String]) -> Result<Vec<Song>, RepositoryError> {
        let mut hits = Vec::new();
        let mut misses = Vec::new();
        for id in ids {
            let key = Self::key_id(id);
            match self.cache.get(&key).await {
                Ok(Some(raw)) if !is_negative(&raw) => {
                    if let Ok(song) = serde_json::from_slice::<Song>(&raw) {
                        hits.push(song);
                        continue;
                    }
                    misses.push(id.clone());
                }
                _ => misses.push(id.clone()),
            }
        }
        if !misses.is_empty() {
            let fetched = self.inner.find_many(&misses).await?;
            for song in &fetched {
                self.populate(&Self::key_id(&song.id), &Some(song.clone()), ENTITY_TTL).await;
            }
            hits.extend(fetched);
        }
        Ok(hits)
    }

    async fn save_many(&self, songs: Vec<Song>) -> Result<Vec<Song>, RepositoryError> {
        let saved = self.inner.save_many(songs).await?;
        for song in &saved {
            self.invalidate_entity(song).await;
        }
        Ok(saved)
    }

    async fn delete_by_id(&self, id: &str) -> Result<(), RepositoryError> {
        if let Ok(Some(song)) = self.inner.find_by_id(id).await {
            self.inner.delete_by_id(id).await?;
            self.invalidate_entity(&song).await;
        } else {
            self.inner.delete_by_id(id).await?;
        }
        Ok(())
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        self.inner.count().await
    }

    async fn find_by_isrc_batch(&self, isrcs: &[String]) -> Result<HashMap<String, Song>, RepositoryError> {
        let mut hits = HashMap::new();
        let mut misses = Vec::new();
        for isrc in isrcs {
            let key = Self::key_isrc(isrc);
            match self.cache.get(&key).await {
                Ok(Some(raw)) if !is_negative(&raw) => {
                    if let Ok(song) = serde_json::from_slice::<Song>(&raw) {
                        hits.insert(isrc.clone(), song);
                        continue;
                    }
                    misses.push(isrc.clone());
                }
                _ => misses.push(isrc.clone()),
            }
        }
        if !misses.is_empty() {
            let fetched = self.inner.find_by_isrc_batch(&misses).await?;
            for (isrc, song) in &fetched {
                self.populate(&Self::key_isrc(isrc), &Some(song.clone()), ENTITY_TTL).await;
            }
            hits.extend(fetched);
        }
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metadata;
    use crate::repository::InMemorySongRepository;

    // `TwoTierCache` needs a reachable redis URL; these tests exercise the
    // decorator's logic against the inner repository directly using a
    // no-op cache stand-in instead of spinning up network state.
    struct NullCache;

    #[async_trait]
    impl Cache for NullCache {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, crate::error::CacheError> {
            Ok(None)
        }
        async fn set(&self, _key: &str, _value: &[u8], _ttl: Duration) -> Result<(), crate::error::CacheError> {
            Ok(())
        }
        async fn delete(&self, _key: &str) -> Result<(), crate::error::CacheError> {
            Ok(())
        }
        async fn exists(&self, _key: &str) -> Result<bool, crate::error::CacheError> {
            Ok(false)
        }
        async fn health(&self) -> Result<(), crate::error::CacheError> {
            Ok(())
        }
        async fn close(&self) -> Result<(), crate::error::CacheError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn cache_miss_falls_through_to_repository() {
        let inner: Arc<dyn SongRepository> = Arc::new(InMemorySongRepository::new());
        let cache: Arc<dyn Cache> = Arc::new(NullCache);
        let cached = CachedRepository::new(inner.clone(), cache);

        let song = Song::new("Title".into(), "Artist".into(), None, "ISRC123".into(), Metadata::default());
        let saved = inner.save(song).await.unwrap();

        let found = cached.find_by_id(&saved.id).await.unwrap();
        assert_eq!(found.unwrap().title, "Title");
    }
}
