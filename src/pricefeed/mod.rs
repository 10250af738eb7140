//! BTC/USD price feed: fetch, validation, polling, staleness.

use crate::domain::{TimeMs, Wad};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub mod http;
pub mod mock;
pub mod poller;

pub use http::HttpPriceFeed;
pub use mock::MockPriceFeed;
pub use poller::{spawn_price_poller, PriceHandle, PriceState};

/// Where a sample came from according to the upstream cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    Live,
    Cached,
}

/// One BTC/USD observation. Replaced wholesale on every successful fetch,
/// never partially updated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BtcPriceSample {
    pub price_usd: f64,
    /// `floor(price_usd * 1e18)`.
    pub price_wad: Wad,
    pub timestamp_ms: TimeMs,
    pub source: PriceSource,
}

impl BtcPriceSample {
    /// Staleness is derived on every read: a sample goes stale purely by
    /// clock advancement, with no new fetch involved.
    pub fn is_stale(&self, now: TimeMs, threshold: Duration) -> bool {
        now.saturating_elapsed_since(self.timestamp_ms) > threshold.as_millis() as i64
    }
}

/// Price feed abstraction; one fetch attempt cycle (including bounded
/// retries) per call.
#[async_trait]
pub trait PriceFeed: Send + Sync + fmt::Debug {
    async fn fetch(&self) -> Result<BtcPriceSample, PriceFeedError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum PriceFeedError {
    /// Connection-level failure.
    Network(String),
    /// Non-success HTTP status.
    Http { status: u16 },
    /// Body did not decode.
    Parse(String),
    /// HTTP 200 but the price is outside the sane band.
    OutOfBand { price: f64 },
}

impl fmt::Display for PriceFeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceFeedError::Network(msg) => write!(f, "Network error: {}", msg),
            PriceFeedError::Http { status } => write!(f, "HTTP error {}", status),
            PriceFeedError::Parse(msg) => write!(f, "Parse error: {}", msg),
            PriceFeedError::OutOfBand { price } => {
                write!(f, "Price {} outside the sane band", price)
            }
        }
    }
}

impl std::error::Error for PriceFeedError {}

/// Wire shape of the upstream price-cache endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct PriceQuote {
    pub price: f64,
    /// Epoch milliseconds the quote was produced.
    pub timestamp: i64,
    pub source: Option<String>,
    #[serde(default)]
    pub cached: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(at_ms: i64) -> BtcPriceSample {
        BtcPriceSample {
            price_usd: 50_000.0,
            price_wad: Wad::from_int(50_000),
            timestamp_ms: TimeMs::new(at_ms),
            source: PriceSource::Live,
        }
    }

    #[test]
    fn fifteen_minute_old_sample_is_stale() {
        let now = TimeMs::new(20 * 60 * 1000);
        let s = sample(now.as_ms() - 15 * 60 * 1000);
        assert!(s.is_stale(now, Duration::from_millis(600_000)));
    }

    #[test]
    fn three_minute_old_sample_is_fresh() {
        let now = TimeMs::new(20 * 60 * 1000);
        let s = sample(now.as_ms() - 3 * 60 * 1000);
        assert!(!s.is_stale(now, Duration::from_millis(600_000)));
    }

    #[test]
    fn staleness_flips_with_clock_only() {
        let s = sample(0);
        let threshold = Duration::from_millis(600_000);
        assert!(!s.is_stale(TimeMs::new(600_000), threshold));
        assert!(s.is_stale(TimeMs::new(600_001), threshold));
    }

    #[test]
    fn quote_deserializes_from_wire_json() {
        let quote: PriceQuote = serde_json::from_str(
            r#"{"price": 51234.5, "timestamp": 1700000000000, "source": "CoinGecko", "cached": false}"#,
        )
        .unwrap();
        assert_eq!(quote.price, 51_234.5);
        assert!(!quote.cached);
    }
}
