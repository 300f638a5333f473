//! Integration tests for the reqwest-backed crawler
//!
//! These tests use wiremock to create mock catalog servers and run full
//! traversals end-to-end through the HTTP client.

use crate::common::{found, not_found, video_json};
use catalog_crawler::config::Config;
use catalog_crawler::crawler::{Backoff, SearchQuery};
use catalog_crawler::thumbnails::ThumbnailDownloader;
use catalog_crawler::{
    CrawlError, Crawler, FetchMode, ReqwestCatalogClient, TransportError, VideoId,
    VideoIdSequence,
};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at the mock server
fn create_test_config(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.api.base_url = server.uri();
    config.client.timeout_secs = 5;
    config
}

/// Mounts a lookup response for one video id
async fn mount_lookup(server: &MockServer, video_id: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("data", "xyz.Videos.getVideoById"))
        .and(query_param("video_id", video_id))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_lookup_sends_catalog_parameters() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("output", "json"))
        .and(query_param("thumbsize", "big"))
        .and(query_param("data", "xyz.Videos.getVideoById"))
        .and(query_param("video_id", "1231"))
        .respond_with(ResponseTemplate::new(200).set_body_json(found(123)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let crawler = Crawler::from_config(&create_test_config(&mock_server)).unwrap();
    let record = crawler
        .get_video("1231".parse().unwrap())
        .await
        .unwrap()
        .expect("video should be found");

    assert_eq!(record.id, "1231");
    assert_eq!(record.published_on, "2023-03-01");
    assert_eq!(record.published_at, "2023-03-01T10:00:00Z");
    assert_eq!(record.views, 1200);
    assert_eq!(record.rating, 4.5);
    assert_eq!(record.tags, vec!["funny-cats", "pets"]);
    assert_eq!(record.thumbs.len(), 2);
}

#[tokio::test]
async fn test_sequential_crawl_stops_on_rate_limit() {
    let mock_server = MockServer::start().await;

    mount_lookup(&mock_server, "11", found(1)).await;
    mount_lookup(&mock_server, "21", found(2)).await;
    mount_lookup(&mock_server, "31", json!({"code": 1005})).await;

    // Nothing after the stop may be requested
    Mock::given(method("GET"))
        .and(query_param("video_id", "41"))
        .respond_with(ResponseTemplate::new(200).set_body_json(found(4)))
        .expect(0)
        .mount(&mock_server)
        .await;

    let crawler = Crawler::from_config(&create_test_config(&mock_server)).unwrap();
    let outcome = crawler
        .fetch_by_ids(VideoIdSequence::ascending(VideoId::from_numeric(1), Some(5)))
        .await
        .unwrap();

    let ids: Vec<&str> = outcome.records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["11", "21"]);
    assert_eq!(
        outcome.stop.as_ref().map(|s| s.reason()),
        Some("Too many requests.")
    );
}

#[tokio::test]
async fn test_crawl_stops_at_publication_bound() {
    let mock_server = MockServer::start().await;

    mount_lookup(&mock_server, "11", found(1)).await;
    mount_lookup(
        &mock_server,
        "21",
        json!({"video": video_json(2, "2023-03-05 00:00:00")}),
    )
    .await;

    let mut config = create_test_config(&mock_server);
    config.stopping.until = Some("2023-03-03T00:00:00Z".to_string());

    let crawler = Crawler::from_config(&config).unwrap();
    let outcome = crawler
        .fetch_by_ids(VideoIdSequence::ascending(VideoId::from_numeric(1), None))
        .await
        .unwrap();

    assert_eq!(outcome.records.len(), 1);
    assert!(outcome
        .stop
        .unwrap()
        .reason()
        .starts_with("Publish date is subsequent to end datetime"));
}

#[tokio::test]
async fn test_descending_crawl_excludes_seed() {
    let mock_server = MockServer::start().await;

    mount_lookup(&mock_server, "91", found(9)).await;
    mount_lookup(&mock_server, "81", not_found()).await;
    mount_lookup(&mock_server, "71", found(7)).await;

    Mock::given(method("GET"))
        .and(query_param("video_id", "101"))
        .respond_with(ResponseTemplate::new(200).set_body_json(found(10)))
        .expect(0)
        .mount(&mock_server)
        .await;

    let crawler = Crawler::from_config(&create_test_config(&mock_server)).unwrap();
    let outcome = crawler
        .fetch_by_ids(VideoIdSequence::descending(VideoId::from_numeric(10), Some(3)))
        .await
        .unwrap();

    let ids: Vec<&str> = outcome.records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["91", "71"]);
    assert_eq!(outcome.not_found, 1);
}

#[tokio::test]
async fn test_not_found_with_error_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param("video_id", "51"))
        .respond_with(ResponseTemplate::new(404).set_body_json(not_found()))
        .mount(&mock_server)
        .await;

    let crawler = Crawler::from_config(&create_test_config(&mock_server)).unwrap();
    let record = crawler.get_video(VideoId::from_numeric(5)).await.unwrap();

    assert!(record.is_none());
}

#[tokio::test]
async fn test_sequential_transport_error_is_fatal() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let crawler = Crawler::from_config(&create_test_config(&mock_server)).unwrap();
    let result = crawler
        .fetch_by_ids(VideoIdSequence::ascending(VideoId::from_numeric(1), Some(3)))
        .await;

    assert!(matches!(
        result,
        Err(CrawlError::Transport(TransportError::Status { status: 500, .. }))
    ));
}

#[tokio::test]
async fn test_concurrent_mode_retries_server_errors() {
    let mock_server = MockServer::start().await;

    // First attempt fails, the retry succeeds
    Mock::given(method("GET"))
        .and(query_param("video_id", "11"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;
    mount_lookup(&mock_server, "11", found(1)).await;
    mount_lookup(&mock_server, "21", found(2)).await;

    let crawler = Crawler::from_config(&create_test_config(&mock_server))
        .unwrap()
        .with_mode(FetchMode::Concurrent { max_concurrency: 2 })
        .with_backoff(Backoff::new(
            Duration::from_millis(5),
            Duration::from_millis(20),
        ));

    let outcome = crawler
        .fetch_by_ids(VideoIdSequence::ascending(VideoId::from_numeric(1), Some(2)))
        .await
        .unwrap();

    let ids: Vec<&str> = outcome.records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["11", "21"]);
}

#[tokio::test]
async fn test_search_pages_with_query() {
    let mock_server = MockServer::start().await;

    let mut first = video_json(1, "2023-03-01 10:00:00");
    first["tags"] = json!([{"tag_name": "Big Cats"}]);
    let mut second = video_json(2, "2023-03-02 10:00:00");
    second["tags"] = json!([]);

    Mock::given(method("GET"))
        .and(query_param("data", "xyz.Videos.searchVideos"))
        .and(query_param("query", "cats"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "videos": [{"video": first}, not_found()]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("data", "xyz.Videos.searchVideos"))
        .and(query_param("query", "cats"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "videos": [{"video": second}]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let query = SearchQuery {
        query: Some("cats".to_string()),
        ..SearchQuery::default()
    };
    let crawler = Crawler::from_config(&create_test_config(&mock_server))
        .unwrap()
        .with_mode(FetchMode::Concurrent { max_concurrency: 4 });
    let outcome = crawler.fetch_by_pages(2, &query).await.unwrap();

    let ids: Vec<&str> = outcome.records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["11", "21"]);
    assert_eq!(outcome.records[0].tags, vec!["big-cats"]);
    assert_eq!(outcome.not_found, 1);
}

#[tokio::test]
async fn test_thumbnails_keep_input_order() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/a.jpg"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"hello".to_vec())
                .set_delay(Duration::from_millis(50)),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/missing.jpg"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hi".to_vec()))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server);
    let client = ReqwestCatalogClient::from_config(&config.api, &config.client).unwrap();
    let downloader = ThumbnailDownloader::new(client.http().clone(), 2);

    let urls = vec![
        format!("{}/a.jpg", mock_server.uri()),
        format!("{}/missing.jpg", mock_server.uri()),
        format!("{}/b.jpg", mock_server.uri()),
    ];
    let results = downloader.download(&urls).await;

    assert_eq!(results.len(), 3);
    assert_eq!(
        results[0].as_ref().unwrap().hash(),
        "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
    );
    assert!(matches!(
        results[1],
        Err(CrawlError::Transport(TransportError::Status { status: 404, .. }))
    ));
    assert_eq!(results[2].as_ref().unwrap().base64(), "aGk=");
}
