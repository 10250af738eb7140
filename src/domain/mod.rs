//! Domain types for the tipping and borrowing flows.
//!
//! This module provides:
//! - Fixed-point monetary math via the Wad wrapper (1e18 scaling)
//! - Domain primitives: TimeMs, Address, Username, TxHash, PositionId
//! - Input validation and message sanitization
//! - Payment link construction

pub mod claim;
pub mod payment_link;
pub mod primitives;
pub mod validation;
pub mod wad;

pub use claim::Claim;
pub use payment_link::{payment_url, PayTarget};
pub use primitives::{
    Address, AddressParseError, PositionId, TimeMs, TxHash, TxHashParseError, Username,
    UsernameParseError,
};
pub use validation::{sanitize_message, validate_amount, ValidationError, MAX_MESSAGE_CHARS};
pub use wad::{Wad, WadError, WAD};
