use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use super::SongRepository;
use crate::error::RepositoryError;
use crate::models::Song;

/// In-memory stand-in for [`MongoSongRepository`](super::MongoSongRepository),
/// used to drive resolution/search tests without a real database.
#[derive(Default)]
pub struct InMemorySongRepository {
    songs: Mutex<Vec<Song>>,
}

impl InMemorySongRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SongRepository for InMemorySongRepository {
    async fn save(&self, mut song: Song) -> Result<Song, RepositoryError> {
        song.id = Uuid::new_v4().to_string();
        let mut songs = self.songs.lock().unwrap();
        songs.push(song.clone());
        Ok(song)
    }

    async fn update(&self, song: &Song) -> Result<(), RepositoryError> {
        let mut songs = self.songs.lock().unwrap();
        let existing = songs
            .iter_mut()
            .find(|s| s.id == song.id)
            .ok_or_else(|| RepositoryError::new("update", "song not found"))?;
        *existing = song.clone();
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Song>, RepositoryError> {
        let songs = self.songs.lock().unwrap();
        Ok(songs.iter().find(|s| s.id == id).cloned())
    }

    async fn find_by_isrc(&self, isrc: &str) -> Result<Option<Song>, RepositoryError> {
        if isrc.is_empty() {
            return Ok(None);
        }
        let songs = self.songs.lock().unwrap();
        Ok(songs.iter().find(|s| s.isrc == isrc).cloned())
    }

    async fn find_by_platform_id(&self, platform: &str, external_id: &str) -> Result<Option<Song>, RepositoryError> {
        let songs = self.songs.lock().unwrap();
        Ok(songs
            .iter()
            .find(|s| s.platform_links.iter().any(|l| l.platform == platform && l.external_id == external_id))
            .cloned())
    }

    async fn find_by_id_prefix(&self, prefix: &str) -> Result<Option<Song>, RepositoryError> {
        let songs = self.songs.lock().unwrap();
        Ok(songs.iter().find(|s| s.id.starts_with(prefix)).cloned())
    }

    async fn find_by_title_artist(&self, title: &str, artist: &str) -> Result<Vec<Song>, RepositoryError> {
        let songs = self.songs.lock().unwrap();
        Ok(songs
            .iter()
            .filter(|s| s.title.eq_ignore_ascii_case(title) && s.artist.eq_ignore_ascii_case(artist))
            .cloned()
            .collect())
    }

    async fn search(&self, query: &str, limit: u32) -> Result<Vec<Song>, RepositoryError> {
        let needle = query.to_lowercase();
        let songs = self.songs.lock().unwrap();
        Ok(songs
            .iter()
            .filter(|s| {
                s.title.to_lowercase().contains(&needle)
                    || s.artist.to_lowercase().contains(&needle)
                    || s.album.as_deref().unwrap_or_default().to_lowercase().contains(&needle)
            })
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn find_many(&self, ids: &[String]) -> Result<Vec<Song>, RepositoryError> {
        let songs = self.songs.lock().unwrap();
        Ok(songs.iter().filter(|s| ids.contains(&s.id)).cloned().collect())
    }

    async fn save_many(&self, songs: Vec<Song>) -> Result<Vec<Song>, RepositoryError> {
        let mut saved = Vec::with_capacity(songs.len());
        for song in songs {
            saved.push(self.save(song).await?);
        }
        Ok(saved)
    }

    async fn delete_by_id(&self, id: &str) -> Result<(), RepositoryError> {
        let mut songs = self.songs.lock().unwrap();
        songs.retain(|s| s.id != id);
        Ok(())
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        Ok(self.songs.lock().unwrap().len() as u64)
    }

    async fn find_by_isrc_batch(&self, isrcs: &[String]) -> Result<HashMap<String, Song>, RepositoryError> {
        let songs = self.songs.lock().unwrap();
        Ok(songs
            .iter()
            .filter(|s| !s.isrc.is_empty() && isrcs.contains(&s.isrc))
            .map(|s| (s.isrc.clone(), s.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metadata;

    #[tokio::test]
    async fn save_assigns_id_and_find_by_id_round_trips() {
        let repo = InMemorySongRepository::new();
        let song = Song::new("Bohemian Rhapsody".into(), "Queen".into(), None, "GBUM71507208".into(), Metadata::default());
        let saved = repo.save(song).await.unwrap();
        assert!(!saved.id.is_empty());
        let found = repo.find_by_id(&saved.id).await.unwrap();
        assert_eq!(found.unwrap().title, "Bohemian Rhapsody");
    }

    #[tokio::test]
    async fn update_unknown_id_fails() {
        let repo = InMemorySongRepository::new();
        let song = Song::new("X".into(), "Y".into(), None, String::new(), Metadata::default());
        assert!(repo.update(&song).await.is_err());
    }
}
