use async_trait::async_trait;
use std::time::Duration;

use super::{Cache, L1Cache, L2Cache};
use crate::error::CacheError;

/// `get` consults L1 then L2, promoting L2 hits into L1 with the capped
/// TTL. `set` writes L2 first, then L1. `delete` removes from both.
pub struct TwoTierCache {
    l1: L1Cache,
    l2: L2Cache,
    l1_max_ttl: Duration,
}

impl TwoTierCache {
    pub fn new(l2_url: &str, l1_max_entries: usize, l1_max_ttl: Duration) -> Result<Self, CacheError> {
        Ok(Self {
            l1: L1Cache::new(l1_max_entries, l1_max_ttl),
            l2: L2Cache::connect(l2_url)?,
            l1_max_ttl,
        })
    }
}

#[async_trait]
impl Cache for TwoTierCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        if let Some(value) = self.l1.get(key).await {
            return Ok(Some(value));
        }
        let value = self.l2.get(key).await?;
        if let Some(value) = &value {
            self.l1.set(key, value, self.l1_max_ttl).await;
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        self.l2.set(key, value, ttl).await?;
        self.l1.set(key, value, ttl).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.l1.delete(key).await;
        self.l2.delete(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        if self.l1.exists(key).await {
            return Ok(true);
        }
        self.l2.exists(key).await
    }

    async fn health(&self) -> Result<(), CacheError> {
        self.l2.ping().await
    }

    async fn close(&self) -> Result<(), CacheError> {
        self.l1.close().await;
        self.l2.close();
        Ok(())
    }
}
