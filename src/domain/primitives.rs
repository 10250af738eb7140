//! Domain primitives: TimeMs, Address, Username, TxHash, PositionId.

use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Time in milliseconds since Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeMs(pub i64);

impl TimeMs {
    pub fn new(ms: i64) -> Self {
        TimeMs(ms)
    }

    pub fn as_ms(&self) -> i64 {
        self.0
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        let ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        TimeMs(ms)
    }

    pub fn saturating_elapsed_since(&self, earlier: TimeMs) -> i64 {
        self.0.saturating_sub(earlier.0)
    }
}

/// An EVM account address, stored in EIP-55 checksummed form.
///
/// Parsing accepts any hex casing; equality is therefore case-insensitive
/// with respect to the original input.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressParseError {
    #[error("address must start with 0x")]
    MissingPrefix,
    #[error("address must be 40 hex characters, got {0}")]
    BadLength(usize),
    #[error("address contains non-hex characters")]
    NotHex,
}

impl Address {
    pub fn parse(s: &str) -> Result<Self, AddressParseError> {
        let s = s.trim();
        let body = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or(AddressParseError::MissingPrefix)?;
        if body.len() != 40 {
            return Err(AddressParseError::BadLength(body.len()));
        }
        if !body.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AddressParseError::NotHex);
        }
        Ok(Address(format!(
            "0x{}",
            eip55_checksum(&body.to_ascii_lowercase())
        )))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the all-zero address, used as an "unconfigured" sentinel.
    pub fn is_placeholder(&self) -> bool {
        self.0[2..].chars().all(|c| c == '0')
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s)
    }
}

/// EIP-55 mixed-case checksum over a lowercase 40-char hex body.
pub(crate) fn eip55_checksum(lower: &str) -> String {
    let mut hasher = Keccak256::new();
    hasher.update(lower.as_bytes());
    let hash = hasher.finalize();

    lower
        .chars()
        .enumerate()
        .map(|(i, c)| {
            if c.is_ascii_digit() {
                return c;
            }
            let nibble = if i % 2 == 0 {
                hash[i / 2] >> 4
            } else {
                hash[i / 2] & 0x0f
            };
            if nibble >= 8 {
                c.to_ascii_uppercase()
            } else {
                c
            }
        })
        .collect()
}

/// A claimed handle, normalized: one leading `@` stripped, lowercased.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Username(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsernameParseError {
    #[error("username must be 3-20 characters, got {0}")]
    BadLength(usize),
    #[error("username may only contain a-z, 0-9 and underscore")]
    BadCharacter,
}

impl Username {
    pub fn parse(raw: &str) -> Result<Self, UsernameParseError> {
        let trimmed = raw.trim();
        let stripped = trimmed.strip_prefix('@').unwrap_or(trimmed);
        let normalized = stripped.to_ascii_lowercase();
        if normalized.len() < 3 || normalized.len() > 20 {
            return Err(UsernameParseError::BadLength(normalized.len()));
        }
        if !normalized
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(UsernameParseError::BadCharacter);
        }
        Ok(Username(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A transaction hash (0x + 64 hex), opaque to this service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHash(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed transaction hash: {0}")]
pub struct TxHashParseError(String);

impl TxHash {
    pub fn parse(s: &str) -> Result<Self, TxHashParseError> {
        let body = s
            .strip_prefix("0x")
            .ok_or_else(|| TxHashParseError(s.to_string()))?;
        if body.len() != 64 || !body.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TxHashParseError(s.to_string()));
        }
        Ok(TxHash(format!("0x{}", body.to_ascii_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an open borrowing position on the vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PositionId(pub u64);

impl PositionId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_parse_applies_eip55_checksum() {
        // Canonical EIP-55 test vector.
        let addr = Address::parse("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").unwrap();
        assert_eq!(addr.as_str(), "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed");
    }

    #[test]
    fn address_parse_is_case_insensitive() {
        let lower = Address::parse("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").unwrap();
        let upper = Address::parse("0x5AAEB6053F3E94C9B9A09F33669435E7EF1BEAED").unwrap();
        assert_eq!(lower, upper);
    }

    #[test]
    fn address_parse_rejects_malformed() {
        assert!(Address::parse("5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").is_err());
        assert!(Address::parse("0x1234").is_err());
        assert!(Address::parse("0xzzzeb6053f3e94c9b9a09f33669435e7ef1beaed").is_err());
    }

    #[test]
    fn placeholder_address_detected() {
        let zero = Address::parse("0x0000000000000000000000000000000000000000").unwrap();
        assert!(zero.is_placeholder());
        let real = Address::parse("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").unwrap();
        assert!(!real.is_placeholder());
    }

    #[test]
    fn username_normalizes_at_and_case() {
        let a = Username::parse("@Alice").unwrap();
        let b = Username::parse("alice").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "alice");
    }

    #[test]
    fn username_rejects_bad_forms() {
        assert!(Username::parse("ab").is_err());
        assert!(Username::parse("a".repeat(21).as_str()).is_err());
        assert!(Username::parse("has space").is_err());
        assert!(Username::parse("dash-ed").is_err());
    }

    #[test]
    fn tx_hash_parse() {
        let h = TxHash::parse(&format!("0x{}", "ab".repeat(32))).unwrap();
        assert_eq!(h.as_str().len(), 66);
        assert!(TxHash::parse("0x1234").is_err());
        assert!(TxHash::parse("nohash").is_err());
    }

    #[test]
    fn time_elapsed() {
        let earlier = TimeMs::new(1_000);
        let later = TimeMs::new(4_000);
        assert_eq!(later.saturating_elapsed_since(earlier), 3_000);
        assert_eq!(earlier.saturating_elapsed_since(later), 0);
    }
}
