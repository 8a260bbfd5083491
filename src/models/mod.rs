pub mod search;
pub mod song;
pub mod track;
pub mod url_pattern;

pub use search::SearchQuery;
pub use song::{Metadata, PlatformLink, Song};
pub use track::{SearchResult, TrackInfo};
pub use url_pattern::URLPattern;
