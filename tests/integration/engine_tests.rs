//! Engine properties exercised with in-process catalog clients

use crate::common::found;
use catalog_crawler::crawler::{CatalogClient, RequestParams, RequestTarget};
use catalog_crawler::stopping::{FailurePatienceStopper, TooManyRequestsStopper};
use catalog_crawler::{
    CrawlError, Crawler, FetchMode, StoppingChain, TransportError, VideoId, VideoIdSequence,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Answers every lookup after a delay, tracking how many requests overlap
struct TrackingClient {
    delay: Duration,
    rate_limited_at: Option<u64>,
    open: AtomicUsize,
    max_open: AtomicUsize,
    requested: Mutex<Vec<u64>>,
}

impl TrackingClient {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            rate_limited_at: None,
            open: AtomicUsize::new(0),
            max_open: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
        }
    }

    fn requested(&self) -> Vec<u64> {
        self.requested.lock().unwrap().clone()
    }
}

impl CatalogClient for TrackingClient {
    async fn get(&self, params: &RequestParams) -> Result<Value, TransportError> {
        let id = match params.target() {
            RequestTarget::Video(id) => id.numeric_value(),
            RequestTarget::SearchPage { page, .. } => u64::from(*page),
        };
        self.requested.lock().unwrap().push(id);

        if self.rate_limited_at == Some(id) {
            return Ok(json!({"code": 1005}));
        }

        let now_open = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_open.fetch_max(now_open, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.open.fetch_sub(1, Ordering::SeqCst);

        Ok(found(id))
    }
}

#[tokio::test]
async fn test_concurrency_ceiling_is_respected() {
    let client = Arc::new(TrackingClient::new(Duration::from_millis(20)));
    let crawler =
        Crawler::new(Arc::clone(&client)).with_mode(FetchMode::Concurrent { max_concurrency: 2 });

    let outcome = crawler
        .fetch_by_ids(VideoIdSequence::ascending(VideoId::from_numeric(1), Some(10)))
        .await
        .unwrap();

    assert_eq!(outcome.records.len(), 10);
    assert!(client.max_open.load(Ordering::SeqCst) <= 2);
    assert_eq!(client.max_open.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_concurrent_results_in_submission_order() {
    let client = Arc::new(TrackingClient::new(Duration::from_millis(5)));
    let crawler =
        Crawler::new(Arc::clone(&client)).with_mode(FetchMode::Concurrent { max_concurrency: 8 });

    let outcome = crawler
        .fetch_by_ids(VideoIdSequence::descending(VideoId::from_numeric(30), Some(25)))
        .await
        .unwrap();

    let expected: Vec<String> = (5..30).rev().map(|id| format!("{}1", id)).collect();
    let actual: Vec<String> = outcome.records.into_iter().map(|r| r.id).collect();
    assert_eq!(actual, expected);
}

#[tokio::test]
async fn test_concurrent_stop_halts_admission() {
    let mut client = TrackingClient::new(Duration::from_millis(20));
    client.rate_limited_at = Some(3);
    let client = Arc::new(client);

    let crawler = Crawler::new(Arc::clone(&client))
        .with_mode(FetchMode::Concurrent { max_concurrency: 2 })
        .with_stoppers(StoppingChain::new().with(TooManyRequestsStopper::new()));

    // Unbounded sequence: only the stop can end this run
    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        crawler.fetch_by_ids(VideoIdSequence::ascending(VideoId::from_numeric(1), None)),
    )
    .await
    .expect("run did not stop")
    .unwrap();

    assert!(outcome.stopped());

    let requested = client.requested();
    assert!(
        requested.len() <= 4,
        "requests kept flowing after the stop: {:?}",
        requested
    );

    // Every request was either evaluated or drained and discarded
    assert_eq!(outcome.responses + outcome.discarded, requested.len());
    assert!(outcome.records.iter().all(|r| r.id != "31"));
}

#[tokio::test]
async fn test_sequential_issues_one_request_at_a_time() {
    let client = Arc::new(TrackingClient::new(Duration::from_millis(5)));
    let crawler = Crawler::new(Arc::clone(&client));

    let outcome = crawler
        .fetch_by_ids(VideoIdSequence::ascending(VideoId::from_numeric(1), Some(5)))
        .await
        .unwrap();

    assert_eq!(outcome.records.len(), 5);
    assert_eq!(client.max_open.load(Ordering::SeqCst), 1);
    assert_eq!(client.requested(), vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_patience_counts_consecutive_misses_only() {
    /// Every third id exists
    struct SparseClient;

    impl CatalogClient for SparseClient {
        async fn get(&self, params: &RequestParams) -> Result<Value, TransportError> {
            match params.target() {
                RequestTarget::Video(id) if id.numeric_value() % 3 == 0 => {
                    Ok(found(id.numeric_value()))
                }
                _ => Ok(json!({"code": 2002})),
            }
        }
    }

    let crawler = Crawler::new(SparseClient)
        .with_stoppers(StoppingChain::new().with(FailurePatienceStopper::new(3)));
    let outcome = crawler
        .fetch_by_ids(VideoIdSequence::ascending(VideoId::from_numeric(1), Some(30)))
        .await
        .unwrap();

    assert!(!outcome.stopped());
    assert_eq!(outcome.records.len(), 10);
    assert_eq!(outcome.not_found, 20);
}

#[tokio::test]
async fn test_cancellation_ends_run() {
    let client = TrackingClient::new(Duration::from_millis(50));
    let crawler = Crawler::new(client).with_mode(FetchMode::Concurrent { max_concurrency: 4 });

    let cancel = crawler.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(120)).await;
        cancel.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        crawler.fetch_by_ids(VideoIdSequence::ascending(VideoId::from_numeric(1), None)),
    )
    .await
    .expect("run ignored cancellation");

    assert!(matches!(result, Err(CrawlError::Cancelled)));
}

#[tokio::test]
async fn test_drained_failure_after_stop_is_discarded() {
    /// Id 1 is throttled after a short wait; id 2 fails for good a bit later
    struct ThrottledThenBroken;

    impl CatalogClient for ThrottledThenBroken {
        async fn get(&self, params: &RequestParams) -> Result<Value, TransportError> {
            let id = match params.target() {
                RequestTarget::Video(id) => id.numeric_value(),
                RequestTarget::SearchPage { page, .. } => u64::from(*page),
            };
            if id == 1 {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(json!({"code": 1005, "message": "slow down"}))
            } else {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Err(TransportError::Status {
                    url: "http://catalog.test/".to_string(),
                    status: 400,
                })
            }
        }
    }

    let crawler = Crawler::new(ThrottledThenBroken)
        .with_mode(FetchMode::Concurrent { max_concurrency: 2 })
        .with_stoppers(StoppingChain::new().with(TooManyRequestsStopper::new()));

    let outcome = crawler
        .fetch_by_ids(VideoIdSequence::ascending(VideoId::from_numeric(1), Some(5)))
        .await
        .expect("a stopped run must not surface drained failures");

    assert_eq!(outcome.stop.as_ref().map(|s| s.reason()), Some("slow down"));
    assert!(outcome.records.is_empty());
    assert_eq!(outcome.responses, 1);
    assert_eq!(outcome.discarded, 1);
}

#[tokio::test]
async fn test_concurrent_traversal_runs_on_spawned_task() {
    let client = Arc::new(TrackingClient::new(Duration::from_millis(5)));
    let crawler = Arc::new(
        Crawler::new(Arc::clone(&client)).with_mode(FetchMode::Concurrent { max_concurrency: 3 }),
    );

    let handle = {
        let crawler = Arc::clone(&crawler);
        tokio::spawn(async move {
            crawler
                .fetch_by_ids(VideoIdSequence::ascending(VideoId::from_numeric(1), Some(6)))
                .await
        })
    };

    let outcome = handle.await.unwrap().unwrap();
    assert_eq!(outcome.records.len(), 6);
    assert_eq!(client.requested().len(), 6);
}
