//! Three-step BTC-collateral borrowing flow.
//!
//! approve collateral -> deposit & mint -> execute transfer, strictly
//! sequential, with bounded observable retry on steps 2 and 3.

use crate::domain::{Address, PositionId, TimeMs, TxHash, Wad};
use crate::engine::ClassifiedError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use uuid::Uuid;

pub mod controller;

pub use controller::{BorrowFlow, FlowOutcome};

/// The three on-chain writes, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BorrowStep {
    Approve,
    Deposit,
    Transfer,
}

impl BorrowStep {
    pub fn number(self) -> u8 {
        match self {
            BorrowStep::Approve => 1,
            BorrowStep::Deposit => 2,
            BorrowStep::Transfer => 3,
        }
    }
}

impl std::fmt::Display for BorrowStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BorrowStep::Approve => write!(f, "approve collateral"),
            BorrowStep::Deposit => write!(f, "deposit & mint"),
            BorrowStep::Transfer => write!(f, "execute transfer"),
        }
    }
}

/// Flow state as a tagged union. A position id exists only once the deposit
/// confirms, so "transferring without a position" cannot be represented.
#[derive(Debug, Clone)]
pub enum FlowState {
    Idle,
    Preparing {
        step: BorrowStep,
        attempt: u32,
    },
    Confirming {
        step: BorrowStep,
        tx_hash: TxHash,
        attempt: u32,
    },
    /// Step 1 confirmed.
    Approved { tx_hash: TxHash },
    /// Step 2 confirmed; the position is now known.
    Deposited {
        tx_hash: TxHash,
        position_id: PositionId,
    },
    Complete {
        tx_hash: TxHash,
        completed_at: TimeMs,
    },
    Failed {
        step: BorrowStep,
        error: FlowError,
    },
}

#[derive(Debug, Clone, Error)]
pub enum FlowError {
    /// Vault or collateral token address missing. Fatal, checked before any
    /// chain call.
    #[error("configuration error: {0}")]
    Config(String),
    /// The confirmed deposit carried no usable position reference. Fatal
    /// precondition failure for step 3, not a transient error.
    #[error("position id missing from confirmed deposit")]
    MissingPosition,
    #[error("flow is not in a failed state")]
    NotFailed,
    #[error("{0}")]
    Chain(ClassifiedError),
}

impl FlowError {
    /// Whether offering a manual retry makes sense. Mirrors the
    /// classification rule: everything except a user rejection is worth
    /// retrying; configuration and position failures are not.
    pub fn retryable(&self) -> bool {
        match self {
            FlowError::Chain(c) => c.retryable,
            _ => false,
        }
    }

    pub fn classified(&self) -> Option<&ClassifiedError> {
        match self {
            FlowError::Chain(c) => Some(c),
            _ => None,
        }
    }
}

/// Inputs to one borrow flow run.
#[derive(Debug, Clone)]
pub struct BorrowRequest {
    pub payer: Address,
    pub recipient: Address,
    /// USD amount being tipped (wad).
    pub tip_amount: Wad,
    /// BTC amount to lock (wad), computed by the collateral calculator.
    pub collateral_amount: Wad,
    pub message: Option<String>,
}

/// Published view of a flow: current state plus the monotonically growing
/// record of finished steps. `completed_steps` never loses a member during
/// one run, cancellation included.
#[derive(Debug, Clone)]
pub struct FlowSnapshot {
    pub state: FlowState,
    pub completed_steps: Vec<u8>,
    pub approve_tx: Option<TxHash>,
    pub deposit_tx: Option<TxHash>,
    pub transfer_tx: Option<TxHash>,
    pub position_id: Option<PositionId>,
}

impl Default for FlowSnapshot {
    fn default() -> Self {
        FlowSnapshot {
            state: FlowState::Idle,
            completed_steps: Vec::new(),
            approve_tx: None,
            deposit_tx: None,
            transfer_tx: None,
            position_id: None,
        }
    }
}

/// Live borrow flows keyed by session id.
#[derive(Debug, Default)]
pub struct FlowRegistry {
    flows: Mutex<HashMap<Uuid, Arc<BorrowFlow>>>,
}

impl FlowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: Uuid, flow: Arc<BorrowFlow>) {
        self.flows.lock().unwrap().insert(id, flow);
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<BorrowFlow>> {
        self.flows.lock().unwrap().get(id).cloned()
    }
}
