//! Two-tier cache (C1): a bounded in-process L1 over a shared network L2.

mod l1;
mod l2;
mod two_tier;

pub use l1::L1Cache;
pub use l2::L2Cache;
pub use two_tier::TwoTierCache;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::CacheError;

/// The literal sentinel value written for a negative cache hit.
pub const NEGATIVE_SENTINEL: &[u8] = b"null";

/// Byte-oriented KV contract with TTL. Keys are opaque strings; values are
/// opaque byte strings. A TTL of zero means "no expiry" at the L2 layer.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
    async fn exists(&self, key: &str) -> Result<bool, CacheError>;
    async fn health(&self) -> Result<(), CacheError>;
    /// Releases held resources (pool connections, in-process entries) ahead
    /// of shutdown. Idempotent; safe to call even if the cache is never
    /// used again afterward.
    async fn close(&self) -> Result<(), CacheError>;
}

/// Marks a value as a negative cache hit.
pub fn is_negative(value: &[u8]) -> bool {
    value == NEGATIVE_SENTINEL
}
