//! Scripted chain client for tests: no network, observable call counts.

use super::{ChainClient, ChainError, TxReceipt};
use crate::domain::{Address, PositionId, TxHash, Wad};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Debug, Default)]
struct Scripts {
    approve_errors: VecDeque<ChainError>,
    deposit_errors: VecDeque<ChainError>,
    transfer_errors: VecDeque<ChainError>,
    /// Consumed per confirmation wait; when empty a default confirmed
    /// receipt with an incrementing block number is produced.
    receipts: VecDeque<ReceiptScript>,
    balances: VecDeque<Wad>,
}

#[derive(Debug, Clone)]
enum ReceiptScript {
    Confirmed,
    Reverted(Option<String>),
    MissingBlockNumber,
}

/// Mock chain client. Submissions succeed with generated transaction hashes
/// unless errors are queued; queued errors are consumed one per call.
#[derive(Debug, Default)]
pub struct MockChainClient {
    scripts: Mutex<Scripts>,
    current_balance: Mutex<Wad>,
    /// Chronological record of submissions, for sequencing assertions.
    operations: Mutex<Vec<&'static str>>,
    tx_counter: AtomicU64,
    next_block: AtomicU64,
    approve_calls: AtomicU32,
    deposit_calls: AtomicU32,
    transfer_calls: AtomicU32,
    balance_calls: AtomicU32,
}

impl MockChainClient {
    pub fn new() -> Self {
        let mock = Self::default();
        mock.next_block.store(1_000, Ordering::SeqCst);
        mock
    }

    pub fn queue_approve_error(&self, message: &str) {
        self.scripts
            .lock()
            .unwrap()
            .approve_errors
            .push_back(ChainError::Provider(message.to_string()));
    }

    pub fn queue_deposit_error(&self, message: &str) {
        self.scripts
            .lock()
            .unwrap()
            .deposit_errors
            .push_back(ChainError::Provider(message.to_string()));
    }

    pub fn queue_transfer_error(&self, message: &str) {
        self.scripts
            .lock()
            .unwrap()
            .transfer_errors
            .push_back(ChainError::Provider(message.to_string()));
    }

    /// Queue an ordinary confirmed receipt, useful for interleaving with
    /// scripted ones.
    pub fn queue_confirmed_receipt(&self) {
        self.scripts
            .lock()
            .unwrap()
            .receipts
            .push_back(ReceiptScript::Confirmed);
    }

    pub fn queue_reverted_receipt(&self, reason: Option<&str>) {
        self.scripts
            .lock()
            .unwrap()
            .receipts
            .push_back(ReceiptScript::Reverted(reason.map(|s| s.to_string())));
    }

    pub fn queue_receipt_without_block_number(&self) {
        self.scripts
            .lock()
            .unwrap()
            .receipts
            .push_back(ReceiptScript::MissingBlockNumber);
    }

    pub fn set_balance(&self, balance: Wad) {
        *self.current_balance.lock().unwrap() = balance;
    }

    /// Queue a one-shot balance; polls consume the queue before falling back
    /// to the current balance.
    pub fn queue_balance(&self, balance: Wad) {
        self.scripts.lock().unwrap().balances.push_back(balance);
    }

    pub fn approve_calls(&self) -> u32 {
        self.approve_calls.load(Ordering::SeqCst)
    }

    pub fn deposit_calls(&self) -> u32 {
        self.deposit_calls.load(Ordering::SeqCst)
    }

    pub fn transfer_calls(&self) -> u32 {
        self.transfer_calls.load(Ordering::SeqCst)
    }

    pub fn balance_calls(&self) -> u32 {
        self.balance_calls.load(Ordering::SeqCst)
    }

    pub fn operations(&self) -> Vec<&'static str> {
        self.operations.lock().unwrap().clone()
    }

    fn record(&self, op: &'static str) {
        self.operations.lock().unwrap().push(op);
    }

    fn next_tx_hash(&self) -> TxHash {
        let n = self.tx_counter.fetch_add(1, Ordering::SeqCst) + 1;
        TxHash::parse(&format!("0x{:064x}", n)).expect("generated hash is well-formed")
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn approve_collateral(
        &self,
        _token: &Address,
        _spender: &Address,
        _amount: Wad,
    ) -> Result<TxHash, ChainError> {
        self.approve_calls.fetch_add(1, Ordering::SeqCst);
        self.record("approve");
        if let Some(err) = self.scripts.lock().unwrap().approve_errors.pop_front() {
            return Err(err);
        }
        Ok(self.next_tx_hash())
    }

    async fn deposit_and_mint(
        &self,
        _vault: &Address,
        _collateral: Wad,
        _tip: Wad,
    ) -> Result<TxHash, ChainError> {
        self.deposit_calls.fetch_add(1, Ordering::SeqCst);
        self.record("deposit");
        if let Some(err) = self.scripts.lock().unwrap().deposit_errors.pop_front() {
            return Err(err);
        }
        Ok(self.next_tx_hash())
    }

    async fn execute_transfer(
        &self,
        _vault: &Address,
        _position: PositionId,
        _recipient: &Address,
        _message: Option<&str>,
    ) -> Result<TxHash, ChainError> {
        self.transfer_calls.fetch_add(1, Ordering::SeqCst);
        self.record("transfer");
        if let Some(err) = self.scripts.lock().unwrap().transfer_errors.pop_front() {
            return Err(err);
        }
        Ok(self.next_tx_hash())
    }

    async fn wait_for_confirmation(&self, tx: &TxHash) -> Result<TxReceipt, ChainError> {
        self.record("receipt");
        let script = self.scripts.lock().unwrap().receipts.pop_front();
        match script {
            Some(ReceiptScript::Reverted(reason)) => Ok(TxReceipt {
                tx_hash: tx.clone(),
                block_number: Some(self.next_block.fetch_add(1, Ordering::SeqCst)),
                status: false,
                revert_reason: reason,
            }),
            Some(ReceiptScript::MissingBlockNumber) => Ok(TxReceipt {
                tx_hash: tx.clone(),
                block_number: None,
                status: true,
                revert_reason: None,
            }),
            Some(ReceiptScript::Confirmed) | None => Ok(TxReceipt {
                tx_hash: tx.clone(),
                block_number: Some(self.next_block.fetch_add(1, Ordering::SeqCst)),
                status: true,
                revert_reason: None,
            }),
        }
    }

    async fn balance_of(&self, _owner: &Address) -> Result<Wad, ChainError> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        self.record("balance");
        if let Some(b) = self.scripts.lock().unwrap().balances.pop_front() {
            *self.current_balance.lock().unwrap() = b;
            return Ok(b);
        }
        Ok(*self.current_balance.lock().unwrap())
    }
}
