//! Pure computation: collateral math, display formatting, error taxonomy.

pub mod classify;
pub mod collateral;
pub mod format;

pub use classify::{classify_chain_error, ClassifiedError, ErrorKind, Severity};
pub use collateral::{
    max_tip_from_collateral, minimum_btc_required, required_collateral, usd_value,
    CollateralError,
};
pub use format::{format_btc, format_usd};
