use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, IndexModel};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use super::SongRepository;
use crate::error::RepositoryError;
use crate::models::{Metadata, PlatformLink, Song};

/// On-wire document shape for the `songs` collection. `id_hex` duplicates
/// `_id` as a plain string so `findByIDPrefix` can use an ordinary anchored
/// regex query instead of a collection scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SongDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    id_hex: String,
    schema_version: i32,
    isrc: String,
    title: String,
    artist: String,
    album: Option<String>,
    platform_links: Vec<PlatformLink>,
    metadata: Metadata,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    updated_at: DateTime<Utc>,
}

impl SongDocument {
    fn from_song(song: &Song) -> Result<Self, RepositoryError> {
        let id = if song.id.is_empty() {
            None
        } else {
            Some(ObjectId::parse_str(&song.id).map_err(|e| RepositoryError::new("encode", e))?)
        };
        Ok(Self {
            id,
            id_hex: song.id.clone(),
            schema_version: song.schema_version,
            isrc: song.isrc.clone(),
            title: song.title.clone(),
            artist: song.artist.clone(),
            album: song.album.clone(),
            platform_links: song.platform_links.clone(),
            metadata: song.metadata.clone(),
            created_at: song.created_at,
            updated_at: song.updated_at,
        })
    }

    fn into_song(self) -> Song {
        let id = self.id.map(|oid| oid.to_hex()).unwrap_or(self.id_hex);
        Song {
            id,
            schema_version: self.schema_version,
            isrc: self.isrc,
            title: self.title,
            artist: self.artist,
            album: self.album,
            platform_links: self.platform_links,
            metadata: self.metadata,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// MongoDB-backed [`SongRepository`]. Reconciles indexes once at
/// construction, before being handed to callers.
pub struct MongoSongRepository {
    collection: Collection<SongDocument>,
}

impl MongoSongRepository {
    pub async fn connect(mongodb_url: &str) -> Result<Self, RepositoryError> {
        let mut options = ClientOptions::parse(mongodb_url)
            .await
            .map_err(|e| RepositoryError::new("connect", e))?;
        options.max_pool_size = Some(20);
        options.min_pool_size = Some(5);
        options.max_idle_time = Some(Duration::from_secs(30));

        let client = Client::with_options(options).map_err(|e| RepositoryError::new("connect", e))?;
        let db_name = database_name_from_url(mongodb_url);
        let collection = client.database(&db_name).collection::<SongDocument>("songs");

        let repo = Self { collection };
        repo.reconcile_indexes().await?;
        Ok(repo)
    }

    /// Drops any pre-existing unique ISRC index and replaces it with a
    /// sparse, non-unique variant, then ensures the remaining indexes
    /// exist. The repository tolerates duplicate canonical rows for the
    /// same ISRC because cross-platform ISRC assignment is occasionally
    /// inconsistent; logical uniqueness is the resolver's job.
    async fn reconcile_indexes(&self) -> Result<(), RepositoryError> {
        let existing = self
            .collection
            .list_index_names()
            .await
            .map_err(|e| RepositoryError::new("list_indexes", e))?;

        if existing.contains(&"isrc_1".to_string()) {
            self.collection
                .drop_index("isrc_1")
                .await
                .map_err(|e| RepositoryError::new("drop_index", e))?;
        }

        let isrc_index = IndexModel::builder()
            .keys(doc! { "isrc": 1 })
            .options(IndexOptions::builder().sparse(true).unique(false).name("isrc_1".to_string()).build())
            .build();

        let title_artist_index = IndexModel::builder()
            .keys(doc! { "title": 1, "artist": 1 })
            .options(IndexOptions::builder().name("title_artist_1".to_string()).build())
            .build();

        let platform_link_index = IndexModel::builder()
            .keys(doc! { "platform_links.platform": 1, "platform_links.external_id": 1 })
            .options(IndexOptions::builder().name("platform_links_1".to_string()).build())
            .build();

        let text_index = IndexModel::builder()
            .keys(doc! { "title": "text", "artist": "text", "album": "text" })
            .options(IndexOptions::builder().name("text_search".to_string()).build())
            .build();

        let id_hex_index = IndexModel::builder()
            .keys(doc! { "id_hex": 1 })
            .options(IndexOptions::builder().name("id_hex_1".to_string()).build())
            .build();

        let created_at_index = IndexModel::builder()
            .keys(doc! { "created_at": 1 })
            .options(IndexOptions::builder().name("created_at_1".to_string()).build())
            .build();

        let updated_at_index = IndexModel::builder()
            .keys(doc! { "updated_at": 1 })
            .options(IndexOptions::builder().name("updated_at_1".to_string()).build())
            .build();

        self.collection
            .create_indexes([
                isrc_index,
                title_artist_index,
                platform_link_index,
                text_index,
                id_hex_index,
                created_at_index,
                updated_at_index,
            ])
            .await
            .map_err(|e| RepositoryError::new("create_indexes", e))?;

        Ok(())
    }
}

fn database_name_from_url(url: &str) -> String {
    url.rsplit('/')
        .next()
        .filter(|s| !s.is_empty() && !s.contains('?'))
        .unwrap_or("songshare")
        .split('?')
        .next()
        .unwrap_or("songshare")
        .to_string()
}

#[async_trait]
impl SongRepository for MongoSongRepository {
    async fn save(&self, mut song: Song) -> Result<Song, RepositoryError> {
        let oid = ObjectId::new();
        song.id = oid.to_hex();
        let mut document = SongDocument::from_song(&song)?;
        document.id = Some(oid);
        self.collection
            .insert_one(&document)
            .await
            .map_err(|e| RepositoryError::new("save", e))?;
        Ok(song)
    }

    async fn update(&self, song: &Song) -> Result<(), RepositoryError> {
        let oid = ObjectId::parse_str(&song.id).map_err(|e| RepositoryError::new("update", e))?;
        let document = SongDocument::from_song(song)?;
        let result = self
            .collection
            .replace_one(doc! { "_id": oid }, document)
            .await
            .map_err(|e| RepositoryError::new("update", e))?;
        if result.matched_count == 0 {
            return Err(RepositoryError::new("update", "song not found"));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Song>, RepositoryError> {
        let oid = match ObjectId::parse_str(id) {
            Ok(oid) => oid,
            Err(_) => return Ok(None),
        };
        let doc = self
            .collection
            .find_one(doc! { "_id": oid })
            .await
            .map_err(|e| RepositoryError::new("find_by_id", e))?;
        Ok(doc.map(SongDocument::into_song))
    }

    async fn find_by_isrc(&self, isrc: &str) -> Result<Option<Song>, RepositoryError> {
        if isrc.is_empty() {
            return Ok(None);
        }
        let doc = self
            .collection
            .find_one(doc! { "isrc": isrc })
            .await
            .map_err(|e| RepositoryError::new("find_by_isrc", e))?;
        Ok(doc.map(SongDocument::into_song))
    }

    async fn find_by_platform_id(&self, platform: &str, external_id: &str) -> Result<Option<Song>, RepositoryError> {
        let doc = self
            .collection
            .find_one(doc! {
                "platform_links": {
                    "$elemMatch": { "platform": platform, "external_id": external_id }
                }
            })
            .await
            .map_err(|e| RepositoryError::new("find_by_platform_id", e))?;
        Ok(doc.map(SongDocument::into_song))
    }

    async fn find_by_id_prefix(&self, prefix: &str) -> Result<Option<Song>, RepositoryError> {
        let pattern = format!("^{}", regex::escape(prefix));
        let doc = self
            .collection
            .find_one(doc! { "id_hex": { "$regex": pattern } })
            .await
            .map_err(|e| RepositoryError::new("find_by_id_prefix", e))?;
        Ok(doc.map(SongDocument::into_song))
    }

    async fn find_by_title_artist(&self, title: &str, artist: &str) -> Result<Vec<Song>, RepositoryError> {
        use futures::stream::TryStreamExt;
        let cursor = self
            .collection
            .find(doc! { "title": title, "artist": artist })
            .await
            .map_err(|e| RepositoryError::new("find_by_title_artist", e))?;
        let docs: Vec<SongDocument> = cursor
            .try_collect()
            .await
            .map_err(|e| RepositoryError::new("find_by_title_artist", e))?;
        Ok(docs.into_iter().map(SongDocument::into_song).collect())
    }

    async fn search(&self, query: &str, limit: u32) -> Result<Vec<Song>, RepositoryError> {
        use futures::stream::TryStreamExt;
        let cursor = self
            .collection
            .find(doc! { "$text": { "$search": query } })
            .limit(limit as i64)
            .await
            .map_err(|e| RepositoryError::new("search", e))?;
        let docs: Vec<SongDocument> = cursor.try_collect().await.map_err(|e| RepositoryError::new("search", e))?;
        Ok(docs.into_iter().map(SongDocument::into_song).collect())
    }

    async fn find_many(&self, ids: &[String]) -> Result<Vec<Song>, RepositoryError> {
        use futures::stream::TryStreamExt;
        let oids: Vec<ObjectId> = ids.iter().filter_map(|id| ObjectId::parse_str(id).ok()).collect();
        let cursor = self
            .collection
            .find(doc! { "_id": { "$in": oids } })
            .await
            .map_err(|e| RepositoryError::new("find_many", e))?;
        let docs: Vec<SongDocument> = cursor.try_collect().await.map_err(|e| RepositoryError::new("find_many", e))?;
        Ok(docs.into_iter().map(SongDocument::into_song).collect())
    }

    async fn save_many(&self, songs: Vec<Song>) -> Result<Vec<Song>, RepositoryError> {
        let mut saved = Vec::with_capacity(songs.len());
        for song in songs {
            saved.push(self.save(song).await?);
        }
        Ok(saved)
    }

    async fn delete_by_id(&self, id: &str) -> Result<(), RepositoryError> {
        let oid = ObjectId::parse_str(id).map_err(|e| RepositoryError::new("delete_by_id", e))?;
        self.collection
            .delete_one(doc! { "_id": oid })
            .await
            .map_err(|e| RepositoryError::new("delete_by_id", e))?;
        Ok(())
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        self.collection
            .count_documents(doc! {})
            .await
            .map_err(|e| RepositoryError::new("count", e))
    }

    async fn find_by_isrc_batch(&self, isrcs: &[String]) -> Result<HashMap<String, Song>, RepositoryError> {
        use futures::stream::TryStreamExt;
        let cursor = self
            .collection
            .find(doc! { "isrc": { "$in": isrcs } })
            .await
            .map_err(|e| RepositoryError::new("find_by_isrc_batch", e))?;
        let docs: Vec<SongDocument> = cursor
            .try_collect()
            .await
            .map_err(|e| RepositoryError::new("find_by_isrc_batch", e))?;
        Ok(docs
            .into_iter()
            .map(SongDocument::into_song)
            .map(|song| (song.isrc.clone(), song))
            .collect())
    }
}
