//! Gateway to the wallet bridge and vault/token contracts.
//!
//! The blockchain is an external collaborator: this module abstracts the
//! writes the borrow flow performs (approve, deposit & mint, transfer), the
//! confirmation wait, and the balance read. Implementations must surface the
//! raw provider error text so the engine can classify it.

use crate::domain::{Address, PositionId, TxHash, Wad};
use async_trait::async_trait;
use std::fmt;

pub mod http;
pub mod mock;

pub use http::HttpChainClient;
pub use mock::MockChainClient;

/// Confirmation outcome for a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    /// Missing on providers that confirm without a block reference.
    pub block_number: Option<u64>,
    /// False means the transaction reverted on-chain.
    pub status: bool,
    /// Provider-extracted revert reason, when the transaction failed.
    pub revert_reason: Option<String>,
}

#[async_trait]
pub trait ChainClient: Send + Sync + fmt::Debug {
    /// ERC-20-style approval of `amount` collateral to `spender`.
    async fn approve_collateral(
        &self,
        token: &Address,
        spender: &Address,
        amount: Wad,
    ) -> Result<TxHash, ChainError>;

    /// Deposit collateral into the vault and mint the tip amount.
    async fn deposit_and_mint(
        &self,
        vault: &Address,
        collateral: Wad,
        tip: Wad,
    ) -> Result<TxHash, ChainError>;

    /// Transfer the minted tip from an open position to the recipient.
    async fn execute_transfer(
        &self,
        vault: &Address,
        position: PositionId,
        recipient: &Address,
        message: Option<&str>,
    ) -> Result<TxHash, ChainError>;

    /// Wait for one confirmation. No client-side deadline beyond the
    /// implementation's own polling limit: a stuck transaction manifests as
    /// prolonged waiting, not a timeout error.
    async fn wait_for_confirmation(&self, tx: &TxHash) -> Result<TxReceipt, ChainError>;

    /// Current token balance of `owner`.
    async fn balance_of(&self, owner: &Address) -> Result<Wad, ChainError>;
}

/// Error from the wallet bridge or provider. `Provider` carries the raw
/// message text verbatim for substring classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    Network(String),
    Http { status: u16, message: String },
    Provider(String),
    Parse(String),
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainError::Network(msg) => write!(f, "network error: {}", msg),
            ChainError::Http { status, message } => {
                write!(f, "http error {}: {}", status, message)
            }
            ChainError::Provider(msg) => write!(f, "{}", msg),
            ChainError::Parse(msg) => write!(f, "parse error: {}", msg),
        }
    }
}

impl std::error::Error for ChainError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_raw_text() {
        // Classification depends on the provider text passing through intact.
        let e = ChainError::Provider("User denied transaction signature".to_string());
        assert_eq!(e.to_string(), "User denied transaction signature");
    }

    #[test]
    fn network_error_is_prefixed() {
        let e = ChainError::Network("connection refused".to_string());
        assert_eq!(e.to_string(), "network error: connection refused");
    }
}
