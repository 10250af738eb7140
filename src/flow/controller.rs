//! Borrow flow controller.

use super::{BorrowRequest, BorrowStep, FlowError, FlowSnapshot, FlowState};
use crate::chain::{ChainClient, ChainError, TxReceipt};
use crate::domain::{Address, PositionId, TimeMs, TxHash};
use crate::engine::{classify_chain_error, ErrorKind};
use crate::retry::RetryPolicy;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// How a completed run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutcome {
    Completed(TxHash),
    Cancelled,
}

#[derive(Debug, Default)]
struct Progress {
    approve_tx: Option<TxHash>,
    deposit: Option<(TxHash, PositionId)>,
    transfer_tx: Option<TxHash>,
}

enum StepRun {
    Done,
    Cancelled,
}

/// One borrowing session: strictly sequential steps, bounded auto-retry on
/// steps 2 and 3, cooperative cancellation between steps.
#[derive(Debug)]
pub struct BorrowFlow {
    chain: Arc<dyn ChainClient>,
    step_retry: RetryPolicy,
    token: Option<Address>,
    vault: Option<Address>,
    request: BorrowRequest,
    progress: Mutex<Progress>,
    state_tx: watch::Sender<FlowSnapshot>,
    cancelled: AtomicBool,
    run_lock: tokio::sync::Mutex<()>,
}

impl BorrowFlow {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        step_retry: RetryPolicy,
        token: Option<Address>,
        vault: Option<Address>,
        request: BorrowRequest,
    ) -> Arc<Self> {
        let (state_tx, _) = watch::channel(FlowSnapshot::default());
        Arc::new(BorrowFlow {
            chain,
            step_retry,
            token,
            vault,
            request,
            progress: Mutex::new(Progress::default()),
            state_tx,
            cancelled: AtomicBool::new(false),
            run_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<FlowSnapshot> {
        self.state_tx.subscribe()
    }

    pub fn snapshot(&self) -> FlowSnapshot {
        self.state_tx.borrow().clone()
    }

    pub fn request(&self) -> &BorrowRequest {
        &self.request
    }

    /// Run the flow from the first incomplete step. Re-entrant: an already
    /// finished step is never resubmitted.
    pub async fn run(&self) -> Result<FlowOutcome, FlowError> {
        let _guard = self.run_lock.lock().await;
        self.cancelled.store(false, Ordering::SeqCst);

        let (token, vault) = match (self.token.clone(), self.vault.clone()) {
            (Some(t), Some(v)) => (t, v),
            _ => {
                let err = FlowError::Config(
                    "collateral token or vault address not configured".to_string(),
                );
                self.fail(BorrowStep::Approve, err.clone());
                return Err(err);
            }
        };

        if self.with_progress(|p| p.approve_tx.is_none()) {
            match self.step_approve(&token, &vault).await? {
                StepRun::Cancelled => return Ok(FlowOutcome::Cancelled),
                StepRun::Done => {}
            }
        }
        if self.is_cancelled() {
            return Ok(FlowOutcome::Cancelled);
        }

        if self.with_progress(|p| p.deposit.is_none()) {
            match self.step_deposit(&vault).await? {
                StepRun::Cancelled => return Ok(FlowOutcome::Cancelled),
                StepRun::Done => {}
            }
        }
        if self.is_cancelled() {
            return Ok(FlowOutcome::Cancelled);
        }

        if self.with_progress(|p| p.transfer_tx.is_none()) {
            match self.step_transfer(&vault).await? {
                StepRun::Cancelled => return Ok(FlowOutcome::Cancelled),
                StepRun::Done => {}
            }
        }

        let tx = self
            .with_progress(|p| p.transfer_tx.clone())
            .expect("transfer step just completed");
        info!(tx = %tx, "borrow flow complete");
        Ok(FlowOutcome::Completed(tx))
    }

    /// Re-dispatch the failed step and continue. Step 1 gets exactly one
    /// fresh attempt; steps 2 and 3 re-enter the bounded auto-retry loop.
    pub async fn retry(&self) -> Result<FlowOutcome, FlowError> {
        if !matches!(self.snapshot().state, FlowState::Failed { .. }) {
            return Err(FlowError::NotFailed);
        }
        self.run().await
    }

    /// Cooperative cancel: clears the visible current-step/error state and
    /// stops progression. Confirmed steps are not reversed (collateral
    /// already locked stays locked) and `completed_steps` keeps them.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.publish(FlowState::Idle);
        info!("borrow flow cancelled");
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    async fn step_approve(&self, token: &Address, vault: &Address) -> Result<StepRun, FlowError> {
        if self.is_cancelled() {
            return Ok(StepRun::Cancelled);
        }
        let step = BorrowStep::Approve;
        self.publish(FlowState::Preparing { step, attempt: 1 });

        let outcome = async {
            let tx = self
                .chain
                .approve_collateral(token, vault, self.request.collateral_amount)
                .await?;
            self.publish(FlowState::Confirming {
                step,
                tx_hash: tx.clone(),
                attempt: 1,
            });
            receipt_to_result(self.chain.wait_for_confirmation(&tx).await?)
        }
        .await;

        match outcome {
            Ok(receipt) => {
                let tx = receipt.tx_hash;
                self.with_progress(|p| p.approve_tx = Some(tx.clone()));
                self.publish(FlowState::Approved { tx_hash: tx });
                Ok(StepRun::Done)
            }
            Err(chain_err) => {
                // Approval needs fresh wallet interaction each time, so any
                // failure surfaces immediately: no automatic retry here.
                let err = self.classify(step, &chain_err);
                self.fail(step, err.clone());
                Err(err)
            }
        }
    }

    async fn step_deposit(&self, vault: &Address) -> Result<StepRun, FlowError> {
        let step = BorrowStep::Deposit;
        let mut attempt = 1u32;
        loop {
            if self.is_cancelled() {
                return Ok(StepRun::Cancelled);
            }
            self.publish(FlowState::Preparing { step, attempt });

            let outcome = async {
                let tx = self
                    .chain
                    .deposit_and_mint(
                        vault,
                        self.request.collateral_amount,
                        self.request.tip_amount,
                    )
                    .await?;
                self.publish(FlowState::Confirming {
                    step,
                    tx_hash: tx.clone(),
                    attempt,
                });
                receipt_to_result(self.chain.wait_for_confirmation(&tx).await?)
            }
            .await;

            match outcome {
                Ok(receipt) => {
                    // Block number as position id is a stand-in until the
                    // vault emits a decodable position event.
                    let Some(position_id) = receipt.block_number.map(PositionId) else {
                        let err = FlowError::MissingPosition;
                        self.fail(step, err.clone());
                        return Err(err);
                    };
                    let tx = receipt.tx_hash;
                    self.with_progress(|p| p.deposit = Some((tx.clone(), position_id)));
                    self.publish(FlowState::Deposited {
                        tx_hash: tx,
                        position_id,
                    });
                    return Ok(StepRun::Done);
                }
                Err(chain_err) => {
                    let err = self.classify(step, &chain_err);
                    if !err.retryable() || self.step_retry.is_last(attempt) {
                        self.fail(step, err.clone());
                        return Err(err);
                    }
                    tokio::time::sleep(self.step_retry.delay_after(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn step_transfer(&self, vault: &Address) -> Result<StepRun, FlowError> {
        let step = BorrowStep::Transfer;
        // Step 3 must not start without a position from step 2.
        let Some((_, position_id)) = self.with_progress(|p| p.deposit.clone()) else {
            let err = FlowError::MissingPosition;
            self.fail(step, err.clone());
            return Err(err);
        };

        let mut attempt = 1u32;
        loop {
            if self.is_cancelled() {
                return Ok(StepRun::Cancelled);
            }
            self.publish(FlowState::Preparing { step, attempt });

            let outcome = async {
                let tx = self
                    .chain
                    .execute_transfer(
                        vault,
                        position_id,
                        &self.request.recipient,
                        self.request.message.as_deref(),
                    )
                    .await?;
                self.publish(FlowState::Confirming {
                    step,
                    tx_hash: tx.clone(),
                    attempt,
                });
                receipt_to_result(self.chain.wait_for_confirmation(&tx).await?)
            }
            .await;

            match outcome {
                Ok(receipt) => {
                    let tx = receipt.tx_hash;
                    self.with_progress(|p| p.transfer_tx = Some(tx.clone()));
                    self.publish(FlowState::Complete {
                        tx_hash: tx,
                        completed_at: TimeMs::now(),
                    });
                    return Ok(StepRun::Done);
                }
                Err(chain_err) => {
                    let err = self.classify(step, &chain_err);
                    if !err.retryable() || self.step_retry.is_last(attempt) {
                        self.fail(step, err.clone());
                        return Err(err);
                    }
                    tokio::time::sleep(self.step_retry.delay_after(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }

    fn classify(&self, step: BorrowStep, chain_err: &ChainError) -> FlowError {
        let classified = classify_chain_error(step.number(), &chain_err.to_string());
        if classified.kind == ErrorKind::UserRejected {
            // A rejection is a decision, not a defect; keep it out of the
            // error logs.
            debug!(step = %step, "user rejected the transaction");
        } else {
            warn!(step = %step, error = %classified.raw, "chain call failed");
        }
        FlowError::Chain(classified)
    }

    fn fail(&self, step: BorrowStep, error: FlowError) {
        self.publish(FlowState::Failed { step, error });
    }

    fn publish(&self, state: FlowState) {
        let snapshot = self.build_snapshot(state);
        self.state_tx.send_replace(snapshot);
    }

    fn build_snapshot(&self, state: FlowState) -> FlowSnapshot {
        let p = self.progress.lock().unwrap();
        let mut completed_steps = Vec::new();
        if p.approve_tx.is_some() {
            completed_steps.push(1);
        }
        if p.deposit.is_some() {
            completed_steps.push(2);
        }
        if p.transfer_tx.is_some() {
            completed_steps.push(3);
        }
        FlowSnapshot {
            state,
            completed_steps,
            approve_tx: p.approve_tx.clone(),
            deposit_tx: p.deposit.as_ref().map(|d| d.0.clone()),
            transfer_tx: p.transfer_tx.clone(),
            position_id: p.deposit.as_ref().map(|d| d.1),
        }
    }

    fn with_progress<T>(&self, f: impl FnOnce(&mut Progress) -> T) -> T {
        let mut p = self.progress.lock().unwrap();
        f(&mut p)
    }
}

fn receipt_to_result(receipt: TxReceipt) -> Result<TxReceipt, ChainError> {
    if receipt.status {
        Ok(receipt)
    } else {
        let text = match &receipt.revert_reason {
            Some(reason) => format!("execution reverted: {}", reason),
            None => "execution reverted".to_string(),
        };
        Err(ChainError::Provider(text))
    }
}
