//! Cross-platform music-track resolution and search engine.
//!
//! Given a URL from one streaming platform, resolves it to a canonical
//! [`models::Song`] enriched with equivalent links on every other
//! supported platform. Given a free-text query, searches all supported
//! platforms in parallel and returns a ranked, deduplicated result list.

pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod platform;
pub mod repository;
pub mod resolution;
pub mod search;

pub use config::AppConfig;
pub use error::{AppError, Result};
pub use resolution::ResolutionService;
pub use search::SearchCoordinator;
