use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

use super::Cache;
use crate::error::CacheError;

struct Entry {
    value: Vec<u8>,
    expires_at: DateTime<Utc>,
}

/// Process-local bounded cache. On overflow, the entry with the
/// nearest-to-now `expires_at` is evicted (approximate LRU-by-expiry; not a
/// strict LRU, acceptable because entries are short-lived and read patterns
/// are hot). TTL is capped regardless of what the caller requests.
pub struct L1Cache {
    entries: RwLock<HashMap<String, Entry>>,
    max_entries: usize,
    max_ttl: Duration,
}

impl L1Cache {
    pub fn new(max_entries: usize, max_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries,
            max_ttl,
        }
    }

    fn cap_ttl(&self, ttl: Duration) -> Duration {
        if ttl == Duration::ZERO {
            self.max_ttl
        } else {
            ttl.min(self.max_ttl)
        }
    }

    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(key) {
                if entry.expires_at > Utc::now() {
                    return Some(entry.value.clone());
                }
            } else {
                return None;
            }
        }
        // Expired: upgrade to a write lock, re-validate, then remove.
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get(key) {
            if entry.expires_at <= Utc::now() {
                entries.remove(key);
            }
        }
        None
    }

    pub async fn set(&self, key: &str, value: &[u8], ttl: Duration) {
        let ttl = self.cap_ttl(ttl);
        let expires_at = Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_default();
        let mut entries = self.entries.write().await;
        self.evict_if_full(&mut entries, key);
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_vec(),
                expires_at,
            },
        );
    }

    pub async fn delete(&self, key: &str) {
        let mut entries = self.entries.write().await;
        entries.remove(key);
    }

    pub async fn exists(&self, key: &str) -> bool {
        self.get(key).await.is_some()
    }

    /// Drops every entry. There's no pool or connection to release, so this
    /// just frees the held memory ahead of shutdown.
    pub async fn close(&self) {
        self.entries.write().await.clear();
    }

    fn evict_if_full(&self, entries: &mut HashMap<String, Entry>, incoming_key: &str) {
        if entries.contains_key(incoming_key) || entries.len() < self.max_entries {
            return;
        }
        if let Some(nearest_key) = entries
            .iter()
            .min_by_key(|(_, e)| e.expires_at)
            .map(|(k, _)| k.clone())
        {
            entries.remove(&nearest_key);
        }
    }
}

/// Lets `L1Cache` stand in wherever a `Cache` is needed without an L2 -
/// mainly test fixtures that want a real (non-fake) in-process cache.
#[async_trait]
impl Cache for L1Cache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(L1Cache::get(self, key).await)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        L1Cache::set(self, key, value, ttl).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        L1Cache::delete(self, key).await;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        Ok(L1Cache::exists(self, key).await)
    }

    async fn health(&self) -> Result<(), CacheError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), CacheError> {
        L1Cache::close(self).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_after_write_within_ttl() {
        let cache = L1Cache::new(10, Duration::from_secs(3600));
        cache.set("k", b"v", Duration::from_secs(60)).await;
        assert_eq!(cache.get("k").await, Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn ttl_is_capped() {
        let cache = L1Cache::new(10, Duration::from_millis(50));
        cache.set("k", b"v", Duration::from_secs(3600)).await;
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn evicts_nearest_to_expiry_on_overflow() {
        let cache = L1Cache::new(2, Duration::from_secs(3600));
        cache.set("soon", b"a", Duration::from_secs(1)).await;
        cache.set("later", b"b", Duration::from_secs(60)).await;
        cache.set("newest", b"c", Duration::from_secs(60)).await;
        assert_eq!(cache.get("soon").await, None);
        assert_eq!(cache.get("later").await, Some(b"b".to_vec()));
        assert_eq!(cache.get("newest").await, Some(b"c".to_vec()));
    }
}
