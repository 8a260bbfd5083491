use std::collections::HashMap;
use std::sync::Arc;

use trackresolve::cache::{Cache, TwoTierCache};
use trackresolve::config::AppConfig;
use trackresolve::platform::{AppleMusicAdapter, PlatformService, SpotifyAdapter, TidalAdapter};
use trackresolve::repository::{CachedRepository, MongoSongRepository};
use trackresolve::resolution::ResolutionService;
use trackresolve::search::SearchCoordinator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env()?;

    let cache: Arc<dyn Cache> = Arc::new(TwoTierCache::new(&config.valkey_url, config.cache.l1_max_entries, config.cache.l1_max_ttl)?);

    let mongo = MongoSongRepository::connect(&config.mongodb_url).await?;
    let repository = Arc::new(CachedRepository::new(Arc::new(mongo), cache.clone()));

    let resolver = Arc::new(ResolutionService::new(repository.clone()));
    let mut search_adapters: HashMap<String, Arc<dyn PlatformService>> = HashMap::new();

    if let Some(spotify) = &config.spotify {
        let adapter: Arc<dyn PlatformService> = Arc::new(SpotifyAdapter::new(spotify.client_id.clone(), spotify.client_secret.clone(), cache.clone()));
        resolver.register_platform(adapter.clone()).await;
        search_adapters.insert("spotify".to_string(), adapter);
    }
    if let Some(apple_music) = &config.apple_music {
        let key_pem = std::fs::read_to_string(&apple_music.key_file)?;
        let adapter: Arc<dyn PlatformService> = Arc::new(AppleMusicAdapter::new(apple_music.key_id.clone(), apple_music.team_id.clone(), &key_pem, cache.clone()));
        resolver.register_platform(adapter.clone()).await;
        search_adapters.insert("apple_music".to_string(), adapter);
    }
    if let Some(tidal) = &config.tidal {
        let adapter: Arc<dyn PlatformService> = Arc::new(TidalAdapter::new(tidal.client_id.clone(), tidal.client_secret.clone(), cache.clone()));
        resolver.register_platform(adapter.clone()).await;
        search_adapters.insert("tidal".to_string(), adapter);
    }

    tracing::info!(platforms = ?resolver.supported_platforms().await, "registered platform adapters");

    let coordinator = SearchCoordinator::new(search_adapters, config.ranking.popularity_boost_multiplier);

    let sample_url = "https://open.spotify.com/track/4iV5W9uYEdYUVa79Axb7Rh";
    match resolver.resolve_from_url(sample_url).await {
        Ok(song) => tracing::info!(song_id = %song.id, title = %song.title, links = song.platform_links.len(), "resolved sample URL"),
        Err(e) => tracing::warn!(error = %e, "sample resolve failed (no credentials configured?)"),
    }

    let query = trackresolve::models::SearchQuery::free_form("Bohemian Rhapsody", 10);
    let results = coordinator.search_platforms(&query, None, 10).await;
    tracing::info!(count = results.len(), "sample search complete");

    Ok(())
}
