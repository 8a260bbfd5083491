//! End-to-end HTTP/JSON normalization test for the Tidal adapter (C5),
//! mirroring the teacher's wiremock-backed provider sandbox tests.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use trackresolve::cache::L1Cache;
use trackresolve::platform::{PlatformService, TidalAdapter};

#[tokio::test]
async fn get_track_by_id_normalizes_json_api_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-abc",
            "expires_in": 3600,
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2/tracks/77646168"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "id": "77646168",
                "attributes": {
                    "title": "Bohemian Rhapsody",
                    "isrc": "GBUM71507208",
                    "duration": 354,
                    "explicit": false,
                    "popularity": 0.9
                },
                "relationships": {
                    "artists": { "data": [{ "id": "a1" }] },
                    "albums": { "data": [{ "id": "al1" }] }
                }
            },
            "included": [
                {
                    "id": "a1",
                    "type": "artists",
                    "attributes": { "name": "Queen" }
                },
                {
                    "id": "al1",
                    "type": "albums",
                    "attributes": { "title": "A Night at the Opera", "coverArt": "1234-5678" }
                }
            ]
        })))
        .mount(&server)
        .await;

    let cache = Arc::new(L1Cache::new(16, Duration::from_secs(60)));
    let adapter = TidalAdapter::new("client".to_string(), "secret".to_string(), cache).with_base_urls(server.uri(), server.uri());

    let track = adapter.get_track_by_id("77646168").await.unwrap();

    assert_eq!(track.title, "Bohemian Rhapsody");
    assert_eq!(track.artists, vec!["Queen".to_string()]);
    assert_eq!(track.album, Some("A Night at the Opera".to_string()));
    assert_eq!(track.isrc, Some("GBUM71507208".to_string()));
    assert_eq!(track.duration_ms, Some(354_000));
    assert_eq!(track.popularity, Some(90));
    assert!(track.image_url.unwrap().contains("1234/5678"));
}

#[tokio::test]
async fn get_track_by_id_propagates_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-abc",
            "expires_in": 3600,
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2/tracks/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let cache = Arc::new(L1Cache::new(16, Duration::from_secs(60)));
    let adapter = TidalAdapter::new("client".to_string(), "secret".to_string(), cache).with_base_urls(server.uri(), server.uri());

    let err = adapter.get_track_by_id("missing").await.unwrap_err();
    assert_eq!(err.platform, "tidal");
}
