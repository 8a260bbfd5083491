use serde::{Deserialize, Serialize};

/// Any subset of {title, artist, album, isrc, free-form query, limit}.
/// Adapters pick the most specific interpretation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchQuery {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub isrc: Option<String>,
    pub query: Option<String>,
    pub limit: u32,
}

impl SearchQuery {
    pub fn free_form(query: impl Into<String>, limit: u32) -> Self {
        Self {
            query: Some(query.into()),
            limit,
            ..Default::default()
        }
    }

    pub fn by_title_artist(title: impl Into<String>, artist: impl Into<String>, limit: u32) -> Self {
        Self {
            title: Some(title.into()),
            artist: Some(artist.into()),
            limit,
            ..Default::default()
        }
    }

    pub fn by_isrc(isrc: impl Into<String>) -> Self {
        Self {
            isrc: Some(isrc.into()),
            limit: 1,
            ..Default::default()
        }
    }

    /// The raw text a fielded query collapses to when an adapter has no
    /// structured query support of its own.
    pub fn as_free_text(&self) -> String {
        if let Some(q) = &self.query {
            return q.clone();
        }
        [&self.title, &self.artist, &self.album]
            .into_iter()
            .flatten()
            .cloned()
            .collect::<Vec<_>>()
            .join(" ")
    }
}
