//! HTTP price feed client.

use super::{BtcPriceSample, PriceFeed, PriceFeedError, PriceQuote, PriceSource};
use crate::domain::{TimeMs, Wad};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

/// Fetches BTC/USD from the upstream price-cache endpoint.
///
/// A 200 response with a price outside the configured band is still a
/// failure and is retried like any other; after the bounded attempts are
/// exhausted the last error surfaces. No fallback price is ever invented.
#[derive(Debug, Clone)]
pub struct HttpPriceFeed {
    client: Client,
    url: String,
    band: (f64, f64),
    retry: RetryPolicy,
}

impl HttpPriceFeed {
    pub fn new(url: String, band: (f64, f64), retry: RetryPolicy) -> Self {
        Self {
            client: Client::new(),
            url,
            band,
            retry,
        }
    }

    async fn fetch_once(&self) -> Result<BtcPriceSample, PriceFeedError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| PriceFeedError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PriceFeedError::Http {
                status: status.as_u16(),
            });
        }

        let quote: PriceQuote = response
            .json()
            .await
            .map_err(|e| PriceFeedError::Parse(e.to_string()))?;

        let (lo, hi) = self.band;
        if !quote.price.is_finite() || quote.price < lo || quote.price > hi {
            return Err(PriceFeedError::OutOfBand { price: quote.price });
        }

        let price_wad = Wad::from_f64_floor(quote.price)
            .ok_or(PriceFeedError::OutOfBand { price: quote.price })?;

        Ok(BtcPriceSample {
            price_usd: quote.price,
            price_wad,
            timestamp_ms: TimeMs::new(quote.timestamp),
            source: if quote.cached {
                PriceSource::Cached
            } else {
                PriceSource::Live
            },
        })
    }
}

#[async_trait]
impl PriceFeed for HttpPriceFeed {
    async fn fetch(&self) -> Result<BtcPriceSample, PriceFeedError> {
        let mut attempt = 1;
        loop {
            match self.fetch_once().await {
                Ok(sample) => {
                    debug!(price = sample.price_usd, "BTC price fetched");
                    return Ok(sample);
                }
                Err(e) if !self.retry.is_last(attempt) => {
                    let delay = self.retry.delay_after(attempt);
                    warn!(attempt, error = %e, "price fetch failed, retrying in {:?}", delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "price fetch failed, giving up");
                    return Err(e);
                }
            }
        }
    }
}
