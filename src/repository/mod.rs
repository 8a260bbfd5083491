//! Song Repository (C2) and its caching decorator (C3).

mod cached;
mod memory;
mod mongo;

pub use cached::CachedRepository;
pub use memory::InMemorySongRepository;
pub use mongo::MongoSongRepository;

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::RepositoryError;
use crate::models::Song;

/// Persistent canonical-song store with secondary lookups. `None` denotes
/// "not found" — never an error.
#[async_trait]
pub trait SongRepository: Send + Sync {
    async fn save(&self, song: Song) -> Result<Song, RepositoryError>;
    async fn update(&self, song: &Song) -> Result<(), RepositoryError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Song>, RepositoryError>;
    async fn find_by_isrc(&self, isrc: &str) -> Result<Option<Song>, RepositoryError>;
    async fn find_by_platform_id(&self, platform: &str, external_id: &str) -> Result<Option<Song>, RepositoryError>;
    async fn find_by_id_prefix(&self, prefix: &str) -> Result<Option<Song>, RepositoryError>;
    async fn find_by_title_artist(&self, title: &str, artist: &str) -> Result<Vec<Song>, RepositoryError>;
    async fn search(&self, query: &str, limit: u32) -> Result<Vec<Song>, RepositoryError>;
    async fn find_many(&self, ids: &[String]) -> Result<Vec<Song>, RepositoryError>;
    async fn save_many(&self, songs: Vec<Song>) -> Result<Vec<Song>, RepositoryError>;
    async fn delete_by_id(&self, id: &str) -> Result<(), RepositoryError>;
    async fn count(&self) -> Result<u64, RepositoryError>;
    async fn find_by_isrc_batch(&self, isrcs: &[String]) -> Result<HashMap<String, Song>, RepositoryError>;
}
