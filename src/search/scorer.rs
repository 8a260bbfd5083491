use crate::models::{SearchQuery, SearchResult, TrackInfo};

const TEXT_MATCH_CAP: f64 = 60.0;
const POPULARITY_CAP: f64 = 35.0;
const CONTEXT_CAP: f64 = 15.0;

/// Pure relevance-scoring function (C7). `index` is this result's position
/// in `all_results`, used to exclude itself when falling back to
/// ISRC/artist-sibling popularity.
pub fn score(result: &SearchResult, query: &SearchQuery, index: usize, all_results: &[SearchResult], popularity_boost_multiplier: f64) -> f64 {
    text_match(&result.track, query) + popularity(result, index, all_results) * popularity_boost_multiplier + context(&result.track, result.source.as_str())
}

fn text_match(track: &TrackInfo, query: &SearchQuery) -> f64 {
    let query_text = query.as_free_text().to_lowercase();
    let query_text = query_text.trim();
    if query_text.is_empty() {
        return 0.0;
    }
    let title = track.title.to_lowercase();

    let mut total = if title == query_text {
        50.0
    } else if title.starts_with(query_text) {
        40.0
    } else if title.contains(query_text) {
        30.0
    } else if fuzzy_contains(&title, query_text) {
        25.0
    } else {
        0.0
    };

    let query_artist = query.artist.as_deref().unwrap_or(query_text).to_lowercase();
    let artist_exact = track.artists.iter().any(|a| a.to_lowercase() == query_artist);
    let artist_partial = track.artists.iter().any(|a| {
        let a = a.to_lowercase();
        a.contains(&query_artist) || query_artist.contains(&a)
    });
    if artist_exact {
        total += 10.0;
    } else if artist_partial {
        total += 5.0;
    }

    total.min(TEXT_MATCH_CAP)
}

fn fuzzy_contains(a: &str, b: &str) -> bool {
    let a = a.replace(' ', "");
    let b = b.replace(' ', "");
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(&b) || b.contains(&a)
}

/// Direct popularity, else max among same-ISRC results, else average of
/// this artist's other results, else 0 — then logarithmically quantized.
fn popularity(result: &SearchResult, index: usize, all_results: &[SearchResult]) -> f64 {
    let raw = if let Some(p) = result.track.popularity {
        p as f64
    } else if let Some(isrc) = result.track.isrc.as_deref().filter(|s| !s.is_empty()) {
        all_results
            .iter()
            .filter(|r| r.track.isrc.as_deref() == Some(isrc))
            .filter_map(|r| r.track.popularity)
            .map(|p| p as f64)
            .fold(0.0_f64, f64::max)
    } else {
        let siblings: Vec<f64> = all_results
            .iter()
            .enumerate()
            .filter(|(i, r)| *i != index && r.track.artists.iter().any(|a| result.track.artists.contains(a)))
            .filter_map(|(_, r)| r.track.popularity)
            .map(|p| p as f64)
            .collect();
        if siblings.is_empty() {
            0.0
        } else {
            siblings.iter().sum::<f64>() / siblings.len() as f64
        }
    };

    quantize(raw)
}

fn quantize(popularity: f64) -> f64 {
    if popularity >= 85.0 {
        35.0
    } else if popularity >= 70.0 {
        28.0
    } else if popularity >= 50.0 {
        20.0
    } else if popularity >= 30.0 {
        12.0
    } else if popularity >= 10.0 {
        6.0
    } else {
        0.0
    }
}

fn context(track: &TrackInfo, source: &str) -> f64 {
    let mut total = 0.0;

    if let Some(year) = release_year(track.release_date.as_deref()) {
        let current_year = release_year(Some(&chrono::Utc::now().format("%Y-%m-%d").to_string())).unwrap_or(year);
        let age = current_year - year;
        total += if age <= 1 {
            5.0
        } else if age <= 3 {
            3.0
        } else if age <= 5 {
            1.0
        } else {
            0.0
        };
    }

    let mut completeness = 0;
    if track.isrc.as_deref().is_some_and(|s| !s.is_empty()) {
        completeness += 1;
    }
    if track.image_url.is_some() {
        completeness += 1;
    }
    if track.duration_ms.is_some_and(|d| d > 0) {
        completeness += 1;
    }
    if track.release_date.as_deref().is_some_and(|s| !s.is_empty()) {
        completeness += 1;
    }
    if !track.artists.is_empty() {
        completeness += 1;
    }
    total += completeness.min(5) as f64;

    if source == "local" {
        total += 2.0;
    }

    total.min(CONTEXT_CAP)
}

fn release_year(date: Option<&str>) -> Option<i32> {
    date.and_then(|d| d.get(0..4)).and_then(|y| y.parse().ok())
}

/// Per-ISRC aggregate popularity weighted by platform reliability, falling
/// back to the unweighted mean when no weight matches.
pub fn aggregate_popularity(isrc: &str, all_results: &[SearchResult], platform_weights: &std::collections::HashMap<String, f64>) -> Option<f64> {
    let matches: Vec<&SearchResult> = all_results.iter().filter(|r| r.track.isrc.as_deref() == Some(isrc)).collect();
    if matches.is_empty() {
        return None;
    }

    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    let mut unweighted_sum = 0.0;
    let mut unweighted_count = 0;

    for result in &matches {
        let Some(popularity) = result.track.popularity else { continue };
        unweighted_sum += popularity as f64;
        unweighted_count += 1;
        if let Some(weight) = platform_weights.get(&result.track.platform) {
            weighted_sum += popularity as f64 * weight;
            weight_total += weight;
        }
    }

    if weight_total > 0.0 {
        Some(weighted_sum / weight_total)
    } else if unweighted_count > 0 {
        Some(unweighted_sum / unweighted_count as f64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(title: &str, artists: Vec<&str>, popularity: Option<u8>, source: &str) -> SearchResult {
        SearchResult {
            track: TrackInfo {
                platform: "spotify".to_string(),
                external_id: "x".to_string(),
                url: "https://example.com".to_string(),
                title: title.to_string(),
                artists: artists.into_iter().map(String::from).collect(),
                album: None,
                isrc: None,
                duration_ms: None,
                release_date: None,
                explicit: false,
                popularity,
                image_url: None,
                available: true,
            },
            source: source.to_string(),
            score: 0.0,
        }
    }

    #[test]
    fn canonical_outranks_cover_with_zero_popularity() {
        let query = SearchQuery::free_form("Bohemian Rhapsody", 10);
        let canonical = result("Bohemian Rhapsody", vec!["Queen"], Some(90), "spotify");
        let cover = result("Bohemian Rhapsody", vec!["Cover Band"], Some(0), "spotify");
        let all = vec![canonical.clone(), cover.clone()];

        let canonical_score = score(&canonical, &query, 0, &all, 1.0);
        let cover_score = score(&cover, &query, 1, &all, 1.0);

        assert!(canonical_score > cover_score);
        assert!(canonical_score <= 110.0);
    }

    #[test]
    fn score_is_bounded() {
        let query = SearchQuery::free_form("x", 10);
        let r = result("x", vec!["x"], Some(100), "local");
        let all = vec![r.clone()];
        let s = score(&r, &query, 0, &all, 1.0);
        assert!((0.0..=110.0).contains(&s));
    }

    #[test]
    fn exact_title_scores_higher_than_contains() {
        let query = SearchQuery::free_form("queen", 10);
        let exact = result("queen", vec![], None, "spotify");
        let contains = result("a queen somewhere", vec![], None, "spotify");
        let all = vec![exact.clone(), contains.clone()];
        assert!(score(&exact, &query, 0, &all, 1.0) > score(&contains, &query, 1, &all, 1.0));
    }
}
