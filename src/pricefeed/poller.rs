//! Background price polling with manual refetch.

use super::{BtcPriceSample, PriceFeed, PriceFeedError};
use crate::domain::TimeMs;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::warn;

/// Latest observed price state. The previous sample stays visible while a
/// fetch is in flight or failing; only `fetching`/`last_error` change.
#[derive(Debug, Clone, Default)]
pub struct PriceState {
    pub sample: Option<BtcPriceSample>,
    pub fetching: bool,
    pub last_error: Option<String>,
}

/// Read/refetch handle to a running poller task.
#[derive(Debug, Clone)]
pub struct PriceHandle {
    rx: watch::Receiver<PriceState>,
    refetch_tx: mpsc::Sender<()>,
    staleness: Duration,
}

impl PriceHandle {
    pub fn current(&self) -> PriceState {
        self.rx.borrow().clone()
    }

    pub fn latest_sample(&self) -> Option<BtcPriceSample> {
        self.rx.borrow().sample
    }

    /// Staleness of the latest sample as of now; `true` when no sample
    /// exists at all.
    pub fn is_stale(&self) -> bool {
        match self.latest_sample() {
            Some(sample) => sample.is_stale(TimeMs::now(), self.staleness),
            None => true,
        }
    }

    /// Force an out-of-band fetch regardless of the interval timer.
    pub fn refetch(&self) {
        let _ = self.refetch_tx.try_send(());
    }

    /// Wait until the poller publishes a state change.
    pub async fn changed(&mut self) {
        let _ = self.rx.changed().await;
    }
}

/// Spawn the polling task: one fetch immediately, then on every interval
/// tick or refetch request.
pub fn spawn_price_poller(
    feed: Arc<dyn PriceFeed>,
    poll_interval: Duration,
    staleness: Duration,
) -> PriceHandle {
    let (state_tx, state_rx) = watch::channel(PriceState::default());
    let (refetch_tx, mut refetch_rx) = mpsc::channel::<()>(4);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                cmd = refetch_rx.recv() => {
                    if cmd.is_none() {
                        // All handles dropped; nothing can observe us.
                        return;
                    }
                }
            }
            fetch_and_publish(feed.as_ref(), &state_tx).await;
            if state_tx.is_closed() {
                return;
            }
        }
    });

    PriceHandle {
        rx: state_rx,
        refetch_tx,
        staleness,
    }
}

async fn fetch_and_publish(feed: &dyn PriceFeed, state_tx: &watch::Sender<PriceState>) {
    state_tx.send_modify(|s| {
        s.fetching = true;
    });

    let outcome: Result<BtcPriceSample, PriceFeedError> = feed.fetch().await;
    state_tx.send_modify(|s| {
        s.fetching = false;
        match outcome {
            Ok(sample) => {
                s.sample = Some(sample);
                s.last_error = None;
            }
            Err(ref e) => {
                // Keep the last-known sample visible alongside the error.
                s.last_error = Some(e.to_string());
                warn!(error = %e, "price poll failed");
            }
        }
    });
}
