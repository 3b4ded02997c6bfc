//! End-to-end requester behaviour through the public API.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reviewscrape::scrapers::requester::{
    OutboundRequest, RequestOptions, Requester, RequesterConfig, Transport, TransportError,
    TransportResponse,
};
use reviewscrape::scrapers::{FetchError, PageQuery, ReviewScraper};
use reviewscrape::storage::{JsonlSink, StoredReview};
use tempfile::TempDir;
use tokio::time::Instant;

/// Replays status codes (None = network failure) and records send times.
struct StubTransport {
    script: Mutex<VecDeque<Option<(u16, &'static str)>>>,
    fallback: Option<(u16, &'static str)>,
    sent_at: Mutex<Vec<Instant>>,
}

impl StubTransport {
    fn new(
        script: Vec<Option<(u16, &'static str)>>,
        fallback: Option<(u16, &'static str)>,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            sent_at: Mutex::new(Vec::new()),
        })
    }

    fn sends(&self) -> Vec<Instant> {
        self.sent_at.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn send(
        &self,
        _request: &OutboundRequest,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError> {
        self.sent_at.lock().unwrap().push(Instant::now());
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback);
        match step {
            Some((code, body)) => Ok(TransportResponse::new(
                StatusCode::from_u16(code).unwrap(),
                body.as_bytes().to_vec(),
            )),
            None => Err(TransportError::Timeout(timeout)),
        }
    }
}

fn config(rate_limit: u32, max_retries: u32) -> RequesterConfig {
    RequesterConfig {
        rate_limit,
        max_retries,
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn consecutive_successes_respect_base_interval() {
    let transport = StubTransport::new(Vec::new(), Some((200, "ok")));
    let requester = Requester::with_transport(config(120, 5), transport.clone()).unwrap();

    for _ in 0..10 {
        let response = requester
            .get("https://api.example.com/items", RequestOptions::new())
            .await
            .unwrap();
        assert_eq!(response.attempts, 1);
    }

    let sends = transport.sends();
    assert_eq!(sends.len(), 10);
    for pair in sends.windows(2) {
        assert!(pair[1].duration_since(pair[0]) >= Duration::from_millis(500));
    }
}

#[tokio::test(start_paused = true)]
async fn rate_limited_twice_then_ok() {
    let transport = StubTransport::new(
        vec![Some((429, "")), Some((429, "")), Some((200, "done"))],
        None,
    );
    let requester = Requester::with_transport(config(60, 3), transport.clone()).unwrap();

    let response = requester
        .get("https://api.example.com/reviews", RequestOptions::new())
        .await
        .unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.text(), "done");
    assert_eq!(response.attempts, 3);
    assert_eq!(transport.sends().len(), 3);

    let stats = requester.stats().await;
    assert_eq!(stats.current_interval, Duration::from_secs(1));
    assert!(!stats.in_backoff);
}

#[tokio::test(start_paused = true)]
async fn every_attempt_failing_is_an_explicit_failure() {
    let transport = StubTransport::new(Vec::new(), None);
    let requester = Requester::with_transport(config(60, 5), transport.clone()).unwrap();

    let err = requester
        .get("https://api.example.com/reviews", RequestOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::NoResponse { attempts: 5, .. }));
    assert_eq!(transport.sends().len(), 5);
}

#[tokio::test(start_paused = true)]
async fn backoff_slows_following_fetches_until_reset() {
    let transport = StubTransport::new(vec![Some((429, ""))], Some((200, "ok")));
    let requester = Requester::with_transport(config(60, 5), transport.clone()).unwrap();

    requester
        .get("https://api.example.com/a", RequestOptions::new())
        .await
        .unwrap();
    requester
        .get("https://api.example.com/b", RequestOptions::new())
        .await
        .unwrap();

    let sends = transport.sends();
    // 429 -> 4s wait, 200 -> back to 1s.
    assert!(sends[1].duration_since(sends[0]) >= Duration::from_secs(4));
    assert!(sends[2].duration_since(sends[1]) >= Duration::from_secs(1));
    assert!(sends[2].duration_since(sends[1]) < Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn scrape_page_into_jsonl_file() {
    let body = r#"{"success":1,"query_summary":{"total_reviews":1},"reviews":[{"recommendationid":"9"}],"cursor":"next"}"#;
    let transport = StubTransport::new(vec![Some((500, "")), Some((200, body))], None);
    let requester = Requester::with_transport(config(60, 3), transport.clone()).unwrap();
    let scraper = ReviewScraper::with_base_url(requester, "https://api.example.com/appreviews");

    let dir = TempDir::new().unwrap();
    let sink = JsonlSink::open(&dir.path().join("reviews.jsonl")).await.unwrap();
    let summary = scraper
        .scrape_page(440, &PageQuery::default(), &sink)
        .await
        .unwrap();

    assert_eq!(summary.saved, 1);
    assert_eq!(summary.cursor.as_deref(), Some("next"));
    assert_eq!(transport.sends().len(), 2);

    let contents = tokio::fs::read_to_string(sink.path()).await.unwrap();
    let stored: StoredReview = serde_json::from_str(contents.trim()).unwrap();
    assert_eq!(stored.app_id, 440);
    assert_eq!(stored.recommendation_id(), Some("9"));
}
