//! Platform Adapter (C5): a uniform contract over heterogeneous
//! third-party music APIs.

mod apple_music;
#[cfg(test)]
pub mod fake;
mod http;
mod spotify;
mod tidal;
mod token;
mod url_registry;

pub use apple_music::AppleMusicAdapter;
pub use spotify::SpotifyAdapter;
pub use tidal::TidalAdapter;
pub use token::TokenCache;
pub use url_registry::UrlPatternRegistry;

use async_trait::async_trait;

use crate::error::PlatformError;
use crate::models::{SearchQuery, TrackInfo, URLPattern};

/// Uniform contract implemented once per platform.
#[async_trait]
pub trait PlatformService: Send + Sync {
    fn platform_name(&self) -> &str;

    /// The URL shapes this adapter recognizes, in match-priority order.
    /// Exposed for introspection and for feeding a [`UrlPatternRegistry`];
    /// `parse_url` below remains the adapter's authoritative matcher.
    fn url_patterns(&self) -> Vec<URLPattern>;

    /// A shallow parse that extracts only the external-id without a
    /// network call.
    fn parse_url(&self, url: &str) -> Option<TrackInfo>;

    async fn get_track_by_id(&self, id: &str) -> Result<TrackInfo, PlatformError>;
    async fn search_track(&self, query: &SearchQuery) -> Result<Vec<TrackInfo>, PlatformError>;
    async fn get_track_by_isrc(&self, isrc: &str) -> Result<TrackInfo, PlatformError>;
    fn build_url(&self, id: &str) -> String;
    async fn health(&self) -> Result<(), PlatformError>;
}
