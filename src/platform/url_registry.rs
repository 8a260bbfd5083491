use tokio::sync::RwLock;

use crate::error::PlatformError;
use crate::models::URLPattern;

/// Thread-safe ordered collection of [`URLPattern`] records. Registrations
/// are rare, reads are common, hence the reader-writer lock.
///
/// `register` upserts by `(platform, description)`: re-registering a
/// pattern under the same description replaces it, but two distinctly
/// described patterns for the same platform coexist — this is how the
/// Tidal adapter keeps its bare `/track/<id>` shape and its `?trackId=`
/// shape as two separate, order-sensitive entries.
pub struct UrlPatternRegistry {
    patterns: RwLock<Vec<URLPattern>>,
}

impl Default for UrlPatternRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlPatternRegistry {
    pub fn new() -> Self {
        Self {
            patterns: RwLock::new(Vec::new()),
        }
    }

    pub async fn register(&self, pattern: URLPattern) -> Result<(), String> {
        pattern.validate()?;
        let mut patterns = self.patterns.write().await;
        if let Some(existing) = patterns
            .iter_mut()
            .find(|p| p.platform == pattern.platform && p.description == pattern.description)
        {
            *existing = pattern;
        } else {
            patterns.push(pattern);
        }
        Ok(())
    }

    pub async fn get_all(&self) -> Vec<URLPattern> {
        self.patterns.read().await.clone()
    }

    pub async fn supported_platforms(&self) -> Vec<String> {
        let patterns = self.patterns.read().await;
        let mut names: Vec<String> = patterns.iter().map(|p| p.platform.clone()).collect();
        names.sort();
        names.dedup();
        names
    }

    /// First registered pattern that matches wins.
    pub async fn parse(&self, url: &str) -> Result<(String, String), PlatformError> {
        let patterns = self.patterns.read().await;
        for pattern in patterns.iter() {
            if let Some(track_id) = pattern.extract(url) {
                return Ok((pattern.platform.clone(), track_id));
            }
        }
        Err(PlatformError::unknown_platform(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    fn tidal_track_pattern() -> URLPattern {
        URLPattern::new(
            "tidal",
            Regex::new(r"(?i)(?:listen\.|www\.)?tidal\.com/(?:browse/)?track/(\d+)").unwrap(),
            1,
        )
        .with_description("bare track path")
        .with_examples(["https://tidal.com/browse/track/12345"])
    }

    fn tidal_query_pattern() -> URLPattern {
        URLPattern::new("tidal", Regex::new(r"(?i)tidal\.com/.*[?&]trackId=(\d+)").unwrap(), 1)
            .with_description("trackId query param")
            .with_examples(["https://tidal.com/album/1?trackId=12345"])
    }

    #[tokio::test]
    async fn tidal_keeps_both_distinct_shapes() {
        let registry = UrlPatternRegistry::new();
        registry.register(tidal_track_pattern()).await.unwrap();
        registry.register(tidal_query_pattern()).await.unwrap();
        assert_eq!(registry.get_all().await.len(), 2);

        let (platform, id) = registry.parse("https://tidal.com/browse/track/999").await.unwrap();
        assert_eq!(platform, "tidal");
        assert_eq!(id, "999");

        let (platform, id) = registry.parse("https://tidal.com/album/1?trackId=777").await.unwrap();
        assert_eq!(platform, "tidal");
        assert_eq!(id, "777");
    }

    #[tokio::test]
    async fn unmatched_url_is_platform_error() {
        let registry = UrlPatternRegistry::new();
        registry.register(tidal_track_pattern()).await.unwrap();
        let err = registry.parse("https://youtube.com/watch?v=fJ9rUzIMcZQ").await.unwrap_err();
        assert_eq!(err.platform, "unknown");
        assert_eq!(err.operation, "parse_url");
    }
}
