//! Mock price feed for testing without network calls.

use super::{BtcPriceSample, PriceFeed, PriceFeedError, PriceSource};
use crate::domain::{TimeMs, Wad};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// Returns scripted outcomes in order; the final one repeats once the
/// script is exhausted.
#[derive(Debug, Default)]
pub struct MockPriceFeed {
    script: Mutex<VecDeque<Result<BtcPriceSample, PriceFeedError>>>,
    last: Mutex<Option<Result<BtcPriceSample, PriceFeedError>>>,
    calls: AtomicU32,
}

impl MockPriceFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(self, price_usd: u64, at: TimeMs) -> Self {
        self.with_sample(BtcPriceSample {
            price_usd: price_usd as f64,
            price_wad: Wad::from_int(price_usd),
            timestamp_ms: at,
            source: PriceSource::Live,
        })
    }

    pub fn with_sample(self, sample: BtcPriceSample) -> Self {
        self.script.lock().unwrap().push_back(Ok(sample));
        self
    }

    pub fn with_error(self, error: PriceFeedError) -> Self {
        self.script.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceFeed for MockPriceFeed {
    async fn fetch(&self) -> Result<BtcPriceSample, PriceFeedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().unwrap();
        let mut last = self.last.lock().unwrap();
        match script.pop_front() {
            Some(outcome) => {
                *last = Some(outcome.clone());
                outcome
            }
            None => last
                .clone()
                .unwrap_or(Err(PriceFeedError::Network("mock exhausted".to_string()))),
        }
    }
}
