use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::error::PlatformError;

/// Generic bearer-token cache implementing the common token-refresh
/// protocol (§4.5): a read-locked fast path, and on staleness an upgrade
/// to a write lock that re-checks before minting a new token. Holding the
/// write lock across the refresh call is what coalesces concurrent
/// refreshes into exactly one token-endpoint call (S6).
pub struct TokenCache {
    state: RwLock<Option<(String, DateTime<Utc>)>>,
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCache {
    pub fn new() -> Self {
        Self { state: RwLock::new(None) }
    }

    pub async fn get_or_refresh<F, Fut>(&self, refresh_margin: Duration, refresh: F) -> Result<String, PlatformError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(String, DateTime<Utc>), PlatformError>>,
    {
        let margin = chrono::Duration::from_std(refresh_margin).unwrap_or_default();

        {
            let guard = self.state.read().await;
            if let Some((token, expires_at)) = guard.as_ref() {
                if *expires_at - margin > Utc::now() {
                    return Ok(token.clone());
                }
            }
        }

        let mut guard = self.state.write().await;
        if let Some((token, expires_at)) = guard.as_ref() {
            if *expires_at - margin > Utc::now() {
                return Ok(token.clone());
            }
        }

        let (token, expires_at) = refresh().await?;
        *guard = Some((token.clone(), expires_at));
        Ok(token)
    }
}
