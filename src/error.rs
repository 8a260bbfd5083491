//! Error taxonomy shared across the cache, repository, platform-adapter, and
//! resolution/search layers.

use thiserror::Error;

/// Errors raised by the two-tier [`crate::cache::Cache`].
#[derive(Debug, Error)]
#[error("cache {operation} failed for key {key}: {cause}")]
pub struct CacheError {
    pub operation: String,
    pub key: String,
    pub cause: String,
}

impl CacheError {
    pub fn new(operation: impl Into<String>, key: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self {
            operation: operation.into(),
            key: key.into(),
            cause: cause.to_string(),
        }
    }
}

/// Errors raised by the song repository and its caching decorator.
#[derive(Debug, Error)]
#[error("repository {operation} failed: {cause}")]
pub struct RepositoryError {
    pub operation: String,
    pub cause: String,
}

impl RepositoryError {
    pub fn new(operation: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self {
            operation: operation.into(),
            cause: cause.to_string(),
        }
    }
}

/// Errors attributable to a specific platform adapter: auth, parsing,
/// network, or an unexpected upstream response.
#[derive(Debug, Error)]
#[error("platform error on {platform} during {operation}: {message}")]
pub struct PlatformError {
    pub platform: String,
    pub operation: String,
    pub message: String,
    pub url: Option<String>,
    pub cause: Option<String>,
}

impl PlatformError {
    pub fn new(platform: impl Into<String>, operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            operation: operation.into(),
            message: message.into(),
            url: None,
            cause: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_cause(mut self, cause: impl std::fmt::Display) -> Self {
        self.cause = Some(cause.to_string());
        self
    }

    pub fn unknown_platform(url: impl Into<String>) -> Self {
        let url = url.into();
        Self::new("unknown", "parse_url", "no registered URL pattern matched").with_url(url)
    }

    pub fn not_found(platform: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::new(platform, operation, "track not found")
    }

    pub fn is_not_found(&self) -> bool {
        self.message == "track not found"
    }
}

/// Fatal at construction time only: malformed or missing environment
/// configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingEnvVar(String),
    #[error("invalid value for environment variable {name}: {message}")]
    InvalidValue { name: String, message: String },
}

/// The top-level error returned by the resolution and search services.
///
/// `NotFound` is a distinct, non-error sentinel at the component-contract
/// level (repository/adapter lookups return `Option`); this variant only
/// exists so it can be threaded through `?` at call sites that want to
/// treat "definitely absent" uniformly with the other failure kinds.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
