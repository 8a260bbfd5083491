use deadpool_redis::{redis::AsyncCommands, Config, Pool, Runtime};
use std::time::Duration;

use crate::error::CacheError;

/// Shared network cache reached through a pooled async connection, with
/// `get`/`set`/`del`/`exists`/`ping` primitives.
pub struct L2Cache {
    pool: Pool,
}

impl L2Cache {
    pub fn connect(url: &str) -> Result<Self, CacheError> {
        let cfg = Config::from_url(url);
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CacheError::new("connect", "-", e))?;
        Ok(Self { pool })
    }

    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| CacheError::new("get", key, e))?;
        let value: Option<Vec<u8>> = conn.get(key).await.map_err(|e| CacheError::new("get", key, e))?;
        Ok(value)
    }

    pub async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| CacheError::new("set", key, e))?;
        if ttl.is_zero() {
            conn.set::<_, _, ()>(key, value)
                .await
                .map_err(|e| CacheError::new("set", key, e))?;
        } else {
            conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
                .await
                .map_err(|e| CacheError::new("set", key, e))?;
        }
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| CacheError::new("delete", key, e))?;
        conn.del::<_, ()>(key).await.map_err(|e| CacheError::new("delete", key, e))?;
        Ok(())
    }

    pub async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| CacheError::new("exists", key, e))?;
        let exists: bool = conn.exists(key).await.map_err(|e| CacheError::new("exists", key, e))?;
        Ok(exists)
    }

    /// Closes the connection pool, rejecting any further checkouts.
    pub fn close(&self) {
        self.pool.close();
    }

    pub async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| CacheError::new("health_check", "-", e))?;
        deadpool_redis::redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| CacheError::new("health_check", "-", e))?;
        Ok(())
    }
}
