use crate::models::{Song, TrackInfo};

/// Match-confidence scorer used internally by the resolver to decide
/// whether a candidate track is the same recording as an existing song.
/// Not the relevance scorer used by search (`crate::search::scorer`).
pub fn match_confidence(candidate: &TrackInfo, song: &Song) -> f64 {
    if let (Some(candidate_isrc), song_isrc) = (&candidate.isrc, &song.isrc) {
        if !candidate_isrc.is_empty() && !song_isrc.is_empty() && candidate_isrc == song_isrc {
            return 1.0;
        }
    }

    let mut confidence = 0.0;

    if candidate.title.to_lowercase() == song.title.to_lowercase() {
        confidence += 0.5;
    } else if fuzzy_contains(&candidate.title, &song.title) {
        confidence += 0.3;
    }

    let artist_match = candidate.artists.iter().any(|a| {
        let a = a.to_lowercase();
        let s = song.artist.to_lowercase();
        a == s || a.contains(&s) || s.contains(&a)
    });
    if artist_match {
        confidence += 0.4;
    }

    if let (Some(candidate_album), Some(song_album)) = (&candidate.album, &song.album) {
        if !candidate_album.is_empty() && !song_album.is_empty() && candidate_album.to_lowercase() == song_album.to_lowercase() {
            confidence += 0.1;
        }
    }

    confidence.min(1.0)
}

fn fuzzy_contains(a: &str, b: &str) -> bool {
    let a = a.to_lowercase().replace(' ', "");
    let b = b.to_lowercase().replace(' ', "");
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(&b) || b.contains(&a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metadata;

    fn song(title: &str, artist: &str, isrc: &str) -> Song {
        Song::new(title.to_string(), artist.to_string(), None, isrc.to_string(), Metadata::default())
    }

    fn track(title: &str, artists: Vec<&str>, isrc: Option<&str>) -> TrackInfo {
        TrackInfo {
            platform: "spotify".to_string(),
            external_id: "x".to_string(),
            url: "https://example.com".to_string(),
            title: title.to_string(),
            artists: artists.into_iter().map(String::from).collect(),
            album: None,
            isrc: isrc.map(String::from),
            duration_ms: None,
            release_date: None,
            explicit: false,
            popularity: None,
            image_url: None,
            available: true,
        }
    }

    #[test]
    fn matching_isrc_scores_one() {
        let s = song("Bohemian Rhapsody", "Queen", "GBUM71507208");
        let t = track("Some Other Title", vec!["Nobody"], Some("GBUM71507208"));
        assert_eq!(match_confidence(&t, &s), 1.0);
    }

    #[test]
    fn title_and_artist_match_without_isrc() {
        let s = song("Bohemian Rhapsody", "Queen", "");
        let t = track("Bohemian Rhapsody", vec!["Queen"], None);
        assert_eq!(match_confidence(&t, &s), 0.9);
    }

    #[test]
    fn no_signal_scores_zero() {
        let s = song("Bohemian Rhapsody", "Queen", "");
        let t = track("Unrelated", vec!["Someone Else"], None);
        assert_eq!(match_confidence(&t, &s), 0.0);
    }

    #[rstest::rstest]
    #[case::title_only("Bohemian Rhapsody", "Queen", "Bohemian Rhapsody", "Someone Else", 0.5)]
    #[case::artist_only("Bohemian Rhapsody", "Queen", "Unrelated Title", "Queen", 0.4)]
    #[case::fuzzy_title("A Night at the Opera", "Queen", "a night at the opera (remastered)", "Queen", 0.7)]
    #[case::artist_substring("Bohemian Rhapsody", "Queen", "Bohemian Rhapsody", "Queen (Remastered)", 0.9)]
    fn weighted_signals_sum_without_isrc(
        #[case] song_title: &str,
        #[case] song_artist: &str,
        #[case] candidate_title: &str,
        #[case] candidate_artist: &str,
        #[case] expected: f64,
    ) {
        let s = song(song_title, song_artist, "");
        let t = track(candidate_title, vec![candidate_artist], None);
        assert!((match_confidence(&t, &s) - expected).abs() < 1e-9);
    }
}
