//! Balance monitor task and per-address registry.

use super::BalanceSnapshot;
use crate::chain::ChainClient;
use crate::domain::{Address, Wad};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::warn;

#[derive(Debug)]
enum MonitorCmd {
    /// Poll after the fixed optimistic-settle delay.
    PollAfterDelay,
    /// Poll immediately.
    PollNow,
}

/// Handle to a running balance monitor.
///
/// Optimistic updates apply synchronously to the published snapshot (the
/// displayed balance must drop before any network round-trip) while the
/// follow-up poll is scheduled on the monitor task.
#[derive(Debug, Clone)]
pub struct BalanceHandle {
    state_tx: Arc<watch::Sender<BalanceSnapshot>>,
    cmd_tx: mpsc::Sender<MonitorCmd>,
}

impl BalanceHandle {
    pub fn current(&self) -> BalanceSnapshot {
        *self.state_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<BalanceSnapshot> {
        self.state_tx.subscribe()
    }

    /// Decrement the displayed balance by `amount_sent` now (clamped at
    /// zero), then poll after the settle delay.
    pub fn update_optimistically(&self, amount_sent: Wad) {
        self.state_tx.send_modify(|s| s.apply_optimistic(amount_sent));
        let _ = self.cmd_tx.try_send(MonitorCmd::PollAfterDelay);
    }

    /// Drop any optimistic override and poll immediately.
    pub fn refetch(&self) {
        self.state_tx.send_modify(BalanceSnapshot::clear_optimistic);
        let _ = self.cmd_tx.try_send(MonitorCmd::PollNow);
    }
}

/// Spawn a monitor polling `address` on a fixed interval.
pub fn spawn_balance_monitor(
    chain: Arc<dyn ChainClient>,
    address: Address,
    poll_interval: Duration,
    optimistic_refetch_delay: Duration,
) -> BalanceHandle {
    let state_tx = Arc::new(watch::channel(BalanceSnapshot::default()).0);
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<MonitorCmd>(8);

    let task_tx = state_tx.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    poll_once(chain.as_ref(), &address, &task_tx).await;
                }
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(MonitorCmd::PollAfterDelay) => {
                            tokio::time::sleep(optimistic_refetch_delay).await;
                            poll_once(chain.as_ref(), &address, &task_tx).await;
                        }
                        Some(MonitorCmd::PollNow) => {
                            poll_once(chain.as_ref(), &address, &task_tx).await;
                        }
                        None => return,
                    }
                }
            }
        }
    });

    BalanceHandle { state_tx, cmd_tx }
}

async fn poll_once(
    chain: &dyn ChainClient,
    address: &Address,
    state_tx: &watch::Sender<BalanceSnapshot>,
) {
    match chain.balance_of(address).await {
        Ok(balance) => state_tx.send_modify(|s| s.apply_poll(balance)),
        Err(e) => warn!(%address, error = %e, "balance poll failed"),
    }
}

/// Monitors keyed by address. No address, no monitor, no polling: callers
/// with nothing to watch get nothing back, and report null balances.
#[derive(Debug)]
pub struct BalanceRegistry {
    chain: Arc<dyn ChainClient>,
    poll_interval: Duration,
    optimistic_refetch_delay: Duration,
    monitors: Mutex<HashMap<String, BalanceHandle>>,
}

impl BalanceRegistry {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        poll_interval: Duration,
        optimistic_refetch_delay: Duration,
    ) -> Self {
        BalanceRegistry {
            chain,
            poll_interval,
            optimistic_refetch_delay,
            monitors: Mutex::new(HashMap::new()),
        }
    }

    pub fn get_or_spawn(&self, address: &Address) -> BalanceHandle {
        let mut monitors = self.monitors.lock().unwrap();
        monitors
            .entry(address.as_str().to_string())
            .or_insert_with(|| {
                spawn_balance_monitor(
                    self.chain.clone(),
                    address.clone(),
                    self.poll_interval,
                    self.optimistic_refetch_delay,
                )
            })
            .clone()
    }

    pub fn get(&self, address: &Address) -> Option<BalanceHandle> {
        self.monitors.lock().unwrap().get(address.as_str()).cloned()
    }
}
