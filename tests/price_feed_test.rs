//! Price feed tests: band validation, bounded retry, polling behavior.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tipvault::domain::TimeMs;
use tipvault::pricefeed::{
    spawn_price_poller, HttpPriceFeed, MockPriceFeed, PriceFeed, PriceFeedError,
};
use tipvault::retry::RetryPolicy;

#[derive(Clone)]
struct FeedServer {
    response: Arc<Mutex<serde_json::Value>>,
    status: Arc<Mutex<u16>>,
    hits: Arc<AtomicU32>,
}

impl FeedServer {
    fn set_price(&self, price: f64) {
        *self.response.lock().unwrap() = serde_json::json!({
            "price": price,
            "timestamp": 1_700_000_000_000i64,
            "source": "CoinGecko",
            "cached": false,
        });
    }

    fn hits(&self) -> u32 {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Serve a scripted price body on an ephemeral local port.
async fn start_feed_server() -> (FeedServer, String) {
    let server = FeedServer {
        response: Arc::new(Mutex::new(serde_json::json!({
            "price": 50_000.0,
            "timestamp": 1_700_000_000_000i64,
            "source": "CoinGecko",
            "cached": false,
        }))),
        status: Arc::new(Mutex::new(200)),
        hits: Arc::new(AtomicU32::new(0)),
    };

    async fn handler(State(server): State<FeedServer>) -> (axum::http::StatusCode, Json<serde_json::Value>) {
        server.hits.fetch_add(1, Ordering::SeqCst);
        let status =
            axum::http::StatusCode::from_u16(*server.status.lock().unwrap()).unwrap();
        (status, Json(server.response.lock().unwrap().clone()))
    }

    let app = Router::new()
        .route("/price", get(handler))
        .with_state(server.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (server, format!("http://{}/price", addr))
}

fn one_shot_retry() -> RetryPolicy {
    RetryPolicy::new(1, Duration::from_millis(1), Duration::from_millis(1))
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(5), Duration::from_millis(20))
}

const BAND: (f64, f64) = (10_000.0, 200_000.0);

#[tokio::test]
async fn valid_price_converts_to_wad_by_flooring() {
    let (server, url) = start_feed_server().await;
    server.set_price(51_234.5);

    let feed = HttpPriceFeed::new(url, BAND, one_shot_retry());
    let sample = feed.fetch().await.unwrap();
    assert_eq!(sample.price_usd, 51_234.5);
    assert_eq!(sample.timestamp_ms.as_ms(), 1_700_000_000_000);
    // floor(51234.5 * 1e18), allowing for binary float representation.
    let expected = 51_234_500_000_000_000_000_000u128;
    let diff = sample.price_wad.raw().abs_diff(expected);
    assert!(diff < 1_000_000, "wad off by {}", diff);
}

#[tokio::test]
async fn price_below_band_is_rejected_despite_http_200() {
    let (server, url) = start_feed_server().await;
    server.set_price(5_000.0);

    let feed = HttpPriceFeed::new(url, BAND, one_shot_retry());
    match feed.fetch().await.unwrap_err() {
        PriceFeedError::OutOfBand { price } => assert_eq!(price, 5_000.0),
        other => panic!("expected OutOfBand, got {:?}", other),
    }
}

#[tokio::test]
async fn price_above_band_is_rejected_despite_http_200() {
    let (server, url) = start_feed_server().await;
    server.set_price(250_000.0);

    let feed = HttpPriceFeed::new(url, BAND, one_shot_retry());
    assert!(matches!(
        feed.fetch().await.unwrap_err(),
        PriceFeedError::OutOfBand { .. }
    ));
}

#[tokio::test]
async fn band_edges_are_accepted() {
    let (server, url) = start_feed_server().await;
    let feed = HttpPriceFeed::new(url, BAND, one_shot_retry());

    server.set_price(10_000.0);
    assert!(feed.fetch().await.is_ok());
    server.set_price(200_000.0);
    assert!(feed.fetch().await.is_ok());
}

#[tokio::test]
async fn fetch_makes_exactly_three_attempts_on_server_errors() {
    let (server, url) = start_feed_server().await;
    *server.status.lock().unwrap() = 500;

    let feed = HttpPriceFeed::new(url, BAND, fast_retry());
    let err = feed.fetch().await.unwrap_err();
    assert!(matches!(err, PriceFeedError::Http { status: 500 }));
    assert_eq!(server.hits(), 3);
}

#[tokio::test]
async fn fetch_recovers_mid_retry() {
    let (server, url) = start_feed_server().await;
    *server.status.lock().unwrap() = 503;

    let feed = HttpPriceFeed::new(url.clone(), BAND, fast_retry());
    let server_flip = server.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(8)).await;
        *server_flip.status.lock().unwrap() = 200;
    });

    let sample = feed.fetch().await.unwrap();
    assert_eq!(sample.price_usd, 50_000.0);
    assert!(server.hits() >= 2);
}

#[tokio::test]
async fn poller_publishes_initial_sample_and_refetches_on_demand() {
    let feed = Arc::new(
        MockPriceFeed::new()
            .with_price(50_000, TimeMs::new(1_000))
            .with_price(51_000, TimeMs::new(2_000)),
    );
    let handle = spawn_price_poller(
        feed.clone(),
        Duration::from_secs(3_600),
        Duration::from_millis(600_000),
    );

    wait_until(|| handle.latest_sample().is_some()).await;
    assert_eq!(handle.latest_sample().unwrap().price_usd, 50_000.0);
    assert_eq!(feed.calls(), 1);

    handle.refetch();
    wait_until(|| handle.latest_sample().map(|s| s.price_usd) == Some(51_000.0)).await;
    assert_eq!(feed.calls(), 2);
}

#[tokio::test]
async fn failed_poll_keeps_last_sample_visible() {
    let feed = Arc::new(
        MockPriceFeed::new()
            .with_price(50_000, TimeMs::new(1_000))
            .with_error(PriceFeedError::Network("upstream down".to_string())),
    );
    let handle = spawn_price_poller(
        feed.clone(),
        Duration::from_secs(3_600),
        Duration::from_millis(600_000),
    );

    wait_until(|| handle.latest_sample().is_some()).await;
    handle.refetch();
    wait_until(|| handle.current().last_error.is_some()).await;

    let state = handle.current();
    assert_eq!(state.sample.unwrap().price_usd, 50_000.0);
    assert!(state.last_error.unwrap().contains("upstream down"));
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within timeout");
}
