//! Environment-driven configuration, loaded once at startup.

use std::collections::HashMap;
use std::time::Duration;

use crate::error::ConfigError;

fn required(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Complete application configuration, assembled once in `main`.
#[derive(Clone)]
pub struct AppConfig {
    pub mongodb_url: String,
    pub valkey_url: String,
    pub spotify: Option<SpotifyCredentials>,
    pub apple_music: Option<AppleMusicCredentials>,
    pub tidal: Option<TidalCredentials>,
    pub ranking: RankingConfig,
    pub cache: CacheConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mongodb_url = required("MONGODB_URL")?;
        let valkey_url = required("VALKEY_URL")?;

        let spotify = SpotifyCredentials::from_env();
        let apple_music = AppleMusicCredentials::from_env();
        let tidal = TidalCredentials::from_env();

        if spotify.is_none() {
            tracing::warn!("SPOTIFY_CLIENT_ID/SPOTIFY_CLIENT_SECRET not set, spotify adapter disabled");
        }
        if apple_music.is_none() {
            tracing::warn!(
                "APPLE_MUSIC_KEY_ID/APPLE_MUSIC_TEAM_ID/APPLE_MUSIC_KEY_FILE not set, apple_music adapter disabled"
            );
        }
        if tidal.is_none() {
            tracing::warn!("TIDAL_CLIENT_ID/TIDAL_CLIENT_SECRET not set, tidal adapter disabled");
        }

        Ok(Self {
            mongodb_url,
            valkey_url,
            spotify,
            apple_music,
            tidal,
            ranking: RankingConfig::from_env(),
            cache: CacheConfig::from_env(),
        })
    }
}

#[derive(Clone)]
pub struct SpotifyCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl SpotifyCredentials {
    fn from_env() -> Option<Self> {
        Some(Self {
            client_id: std::env::var("SPOTIFY_CLIENT_ID").ok()?,
            client_secret: std::env::var("SPOTIFY_CLIENT_SECRET").ok()?,
        })
    }
}

#[derive(Clone)]
pub struct AppleMusicCredentials {
    pub key_id: String,
    pub team_id: String,
    pub key_file: String,
}

impl AppleMusicCredentials {
    fn from_env() -> Option<Self> {
        Some(Self {
            key_id: std::env::var("APPLE_MUSIC_KEY_ID").ok()?,
            team_id: std::env::var("APPLE_MUSIC_TEAM_ID").ok()?,
            key_file: std::env::var("APPLE_MUSIC_KEY_FILE").ok()?,
        })
    }
}

#[derive(Clone)]
pub struct TidalCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl TidalCredentials {
    fn from_env() -> Option<Self> {
        Some(Self {
            client_id: std::env::var("TIDAL_CLIENT_ID").ok()?,
            client_secret: std::env::var("TIDAL_CLIENT_SECRET").ok()?,
        })
    }
}

/// Weights and multipliers consumed by the relevance scorer (§4.7).
#[derive(Clone)]
pub struct RankingConfig {
    pub popularity_boost_multiplier: f64,
    pub popularity_platform_weights: HashMap<String, f64>,
}

impl RankingConfig {
    fn from_env() -> Self {
        let mut popularity_platform_weights = HashMap::new();
        popularity_platform_weights.insert("spotify".to_string(), 1.0);
        popularity_platform_weights.insert("tidal".to_string(), 0.8);
        popularity_platform_weights.insert("apple_music".to_string(), 0.0);

        Self {
            popularity_boost_multiplier: parse_env("POPULARITY_BOOST_MULTIPLIER", 1.0),
            popularity_platform_weights,
        }
    }
}

#[derive(Clone)]
pub struct CacheConfig {
    pub l1_max_entries: usize,
    pub l1_max_ttl: Duration,
}

impl CacheConfig {
    fn from_env() -> Self {
        Self {
            l1_max_entries: parse_env("CACHE_L1_MAX_ENTRIES", 10_000usize),
            l1_max_ttl: Duration::from_secs(parse_env("CACHE_L1_MAX_TTL_SECS", 3_600u64)),
        }
    }
}
