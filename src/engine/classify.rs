//! Classification of chain/wallet errors into user-meaningful categories.
//!
//! The underlying call layer surfaces heterogeneous provider text; the only
//! uniform handle on it is case-insensitive substring inspection.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UserRejected,
    InsufficientGas,
    InsufficientBalance,
    Network,
    Contract,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A classified chain error: user-facing message plus raw provider text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    /// Flow step (1-3) the error occurred in.
    pub step: u8,
    pub message: String,
    pub raw: String,
    pub retryable: bool,
    pub severity: Severity,
    pub hint: String,
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step {}: {}", self.step, self.message)
    }
}

/// Classify raw provider error text from flow step `step`.
pub fn classify_chain_error(step: u8, raw: &str) -> ClassifiedError {
    let lower = raw.to_lowercase();

    let kind = if lower.contains("user rejected") || lower.contains("user denied") {
        ErrorKind::UserRejected
    } else if lower.contains("insufficient funds") || lower.contains("gas") {
        ErrorKind::InsufficientGas
    } else if lower.contains("insufficient balance") {
        ErrorKind::InsufficientBalance
    } else if lower.contains("network") || lower.contains("rpc") || lower.contains("timeout") {
        ErrorKind::Network
    } else if lower.contains("revert") {
        ErrorKind::Contract
    } else {
        ErrorKind::Unknown
    };

    let message = match kind {
        ErrorKind::UserRejected => "Transaction cancelled in your wallet.".to_string(),
        ErrorKind::InsufficientGas => {
            "Not enough funds to cover network fees.".to_string()
        }
        ErrorKind::InsufficientBalance => "Not enough balance for this amount.".to_string(),
        ErrorKind::Network => "The network is not responding right now.".to_string(),
        ErrorKind::Contract => extract_revert_reason(raw)
            .unwrap_or_else(|| "Transaction failed. Your funds are safe.".to_string()),
        ErrorKind::Unknown => "Something went wrong. Your funds are safe.".to_string(),
    };

    ClassifiedError {
        kind,
        step,
        message,
        raw: raw.to_string(),
        retryable: kind != ErrorKind::UserRejected,
        severity: severity_of(kind),
        hint: hint_of(kind).to_string(),
    }
}

fn severity_of(kind: ErrorKind) -> Severity {
    match kind {
        ErrorKind::UserRejected => Severity::Info,
        ErrorKind::InsufficientGas | ErrorKind::InsufficientBalance | ErrorKind::Network => {
            Severity::Warning
        }
        ErrorKind::Contract | ErrorKind::Unknown => Severity::Error,
    }
}

fn hint_of(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::UserRejected => "No changes were made. Try again when you're ready.",
        ErrorKind::InsufficientGas => "Top up gas from a faucet, then retry.",
        ErrorKind::InsufficientBalance => "Lower the amount or pay with MUSD instead.",
        ErrorKind::Network => "Check your connection and retry.",
        ErrorKind::Contract => "Retry, or switch to paying with MUSD.",
        ErrorKind::Unknown => "Retry, or switch to paying with MUSD.",
    }
}

/// Pull a human-readable reason out of revert-style error text.
fn extract_revert_reason(raw: &str) -> Option<String> {
    // ASCII lowering keeps byte offsets aligned with `raw`.
    let lower = raw.to_ascii_lowercase();
    let idx = lower.find("execution reverted")?;
    let tail = &raw[idx + "execution reverted".len()..];
    let tail = tail.strip_prefix(':').unwrap_or(tail);
    let reason: String = tail
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .chars()
        .take_while(|c| *c != '\n' && *c != '(')
        .collect();
    let reason = reason.trim().to_string();
    if reason.is_empty() {
        None
    } else {
        Some(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_rejection_is_not_retryable_and_quiet() {
        let e = classify_chain_error(1, "MetaMask Tx Signature: User denied transaction");
        assert_eq!(e.kind, ErrorKind::UserRejected);
        assert!(!e.retryable);
        assert_eq!(e.severity, Severity::Info);
    }

    #[test]
    fn classification_is_case_insensitive() {
        let e = classify_chain_error(2, "INSUFFICIENT FUNDS for gas * price + value");
        assert_eq!(e.kind, ErrorKind::InsufficientGas);
        assert!(e.retryable);
    }

    #[test]
    fn insufficient_balance_without_gas_words() {
        let e = classify_chain_error(2, "transfer amount exceeds: insufficient balance");
        assert_eq!(e.kind, ErrorKind::InsufficientBalance);
    }

    #[test]
    fn network_rpc_timeout_all_map_to_network() {
        for raw in ["rpc error: code -32000", "request timeout", "network unreachable"] {
            assert_eq!(classify_chain_error(3, raw).kind, ErrorKind::Network);
        }
    }

    #[test]
    fn revert_reason_is_extracted() {
        let e = classify_chain_error(2, "execution reverted: vault is paused");
        assert_eq!(e.kind, ErrorKind::Contract);
        assert_eq!(e.message, "vault is paused");
        assert_eq!(e.severity, Severity::Error);
    }

    #[test]
    fn bare_revert_falls_back_to_generic_message() {
        let e = classify_chain_error(2, "transaction revert");
        assert_eq!(e.kind, ErrorKind::Contract);
        assert_eq!(e.message, "Transaction failed. Your funds are safe.");
    }

    #[test]
    fn unknown_text_is_retryable_unknown() {
        let e = classify_chain_error(2, "wat");
        assert_eq!(e.kind, ErrorKind::Unknown);
        assert!(e.retryable);
    }
}
