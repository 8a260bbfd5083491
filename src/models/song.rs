use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical, platform-agnostic record for a single recording.
///
/// Invariants (enforced by the repository and resolver, not by this type):
/// at most one [`PlatformLink`] per platform name; `(platform, external_id)`
/// unique across the store when present; ISRC unique across the store when
/// non-empty; `updated_at >= created_at` and strictly advances on mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Song {
    pub id: String,
    pub schema_version: i32,
    pub isrc: String,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub platform_links: Vec<PlatformLink>,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const CURRENT_SCHEMA_VERSION: i32 = 1;

impl Song {
    pub fn new(title: String, artist: String, album: Option<String>, isrc: String, metadata: Metadata) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            schema_version: CURRENT_SCHEMA_VERSION,
            isrc,
            title,
            artist,
            album,
            platform_links: Vec::new(),
            metadata,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_platform(&self, platform: &str) -> bool {
        self.platform_links.iter().any(|l| l.platform == platform)
    }

    pub fn link_for(&self, platform: &str) -> Option<&PlatformLink> {
        self.platform_links.iter().find(|l| l.platform == platform)
    }

    /// Adds a link if the platform is not already present, bumping
    /// `updated_at`. Returns whether a link was actually added.
    pub fn add_link_if_missing(&mut self, link: PlatformLink) -> bool {
        if self.has_platform(&link.platform) {
            return false;
        }
        self.platform_links.push(link);
        self.touch();
        true
    }

    pub fn touch(&mut self) {
        let next = Utc::now();
        self.updated_at = if next > self.updated_at {
            next
        } else {
            self.updated_at + chrono::Duration::nanoseconds(1)
        };
    }
}

/// An attachment on a canonical song pointing to a specific track on one
/// external platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformLink {
    pub platform: String,
    pub external_id: String,
    pub url: String,
    pub available: bool,
    pub confidence: f64,
    pub last_verified: DateTime<Utc>,
}

impl PlatformLink {
    pub fn new(platform: impl Into<String>, external_id: impl Into<String>, url: impl Into<String>, confidence: f64) -> Self {
        Self {
            platform: platform.into(),
            external_id: external_id.into(),
            url: url.into(),
            available: true,
            confidence,
            last_verified: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    pub duration_ms: Option<u64>,
    pub release_date: Option<String>,
    pub popularity: Option<u8>,
    pub genres: Vec<String>,
    pub explicit: bool,
    pub image_url: Option<String>,
    pub language: Option<String>,
}
