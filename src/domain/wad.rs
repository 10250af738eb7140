//! Wad fixed-point numeric type: non-negative integers scaled by 1e18.
//!
//! All monetary and BTC quantities in the system use this representation.
//! Products of two wad-scaled values are computed in 256 bits and divided
//! by 1e18 (or another wad) exactly once, with floor semantics throughout.

use primitive_types::U256;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The wad scale factor, 10^18.
pub const WAD: u128 = 1_000_000_000_000_000_000;

/// A non-negative fixed-point value scaled by 1e18.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Wad(u128);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WadError {
    #[error("invalid decimal literal: {0}")]
    InvalidLiteral(String),
    #[error("more than 18 fractional digits: {0}")]
    TooManyFractionalDigits(String),
    #[error("value out of range")]
    Overflow,
    #[error("division by zero")]
    DivisionByZero,
}

impl Wad {
    pub const ZERO: Wad = Wad(0);
    /// One whole unit (1.0), i.e. 10^18 raw.
    pub const ONE: Wad = Wad(WAD);

    /// Wrap an already-scaled raw integer.
    pub const fn from_raw(raw: u128) -> Self {
        Wad(raw)
    }

    /// Scale a whole-number amount (e.g. a USD price of 50_000).
    pub const fn from_int(n: u64) -> Self {
        Wad(n as u128 * WAD)
    }

    /// Convert a float by flooring `value * 1e18`.
    ///
    /// Returns `None` for NaN, infinities, negatives, and values whose
    /// scaled form exceeds the raw range.
    pub fn from_f64_floor(value: f64) -> Option<Self> {
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        let scaled = (value * WAD as f64).floor();
        if scaled >= u128::MAX as f64 {
            return None;
        }
        Some(Wad(scaled as u128))
    }

    pub const fn raw(self) -> u128 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, rhs: Wad) -> Option<Wad> {
        self.0.checked_add(rhs.0).map(Wad)
    }

    pub fn checked_sub(self, rhs: Wad) -> Option<Wad> {
        self.0.checked_sub(rhs.0).map(Wad)
    }

    /// Subtraction clamped at zero.
    pub fn saturating_sub(self, rhs: Wad) -> Wad {
        Wad(self.0.saturating_sub(rhs.0))
    }

    /// Floor of `self * mul / div`, computed without intermediate overflow.
    ///
    /// This is the single primitive behind all ratio math: multiplying two
    /// wad-scaled values yields an extra 1e18 factor which the divisor (a
    /// wad itself) cancels.
    pub fn mul_div_floor(self, mul: Wad, div: Wad) -> Result<Wad, WadError> {
        if div.is_zero() {
            return Err(WadError::DivisionByZero);
        }
        let product = U256::from(self.0) * U256::from(mul.0);
        let quotient = product / U256::from(div.0);
        if quotient > U256::from(u128::MAX) {
            return Err(WadError::Overflow);
        }
        Ok(Wad(quotient.as_u128()))
    }

    /// Parse a decimal literal such as `"10"`, `"0.25"` or `"0.0004305"`.
    ///
    /// At most 18 fractional digits are accepted; signs and exponents are not.
    pub fn from_decimal_str(s: &str) -> Result<Self, WadError> {
        let s = s.trim();
        if s.is_empty() || s == "." {
            return Err(WadError::InvalidLiteral(s.to_string()));
        }
        let (int_part, frac_part) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(WadError::InvalidLiteral(s.to_string()));
        }
        if !int_part.chars().all(|c| c.is_ascii_digit())
            || !frac_part.chars().all(|c| c.is_ascii_digit())
        {
            return Err(WadError::InvalidLiteral(s.to_string()));
        }
        if frac_part.len() > 18 {
            return Err(WadError::TooManyFractionalDigits(s.to_string()));
        }

        let int_value: u128 = if int_part.is_empty() {
            0
        } else {
            int_part
                .parse()
                .map_err(|_| WadError::Overflow)?
        };
        let mut frac_value: u128 = if frac_part.is_empty() {
            0
        } else {
            frac_part.parse().map_err(|_| WadError::Overflow)?
        };
        for _ in frac_part.len()..18 {
            frac_value = frac_value.checked_mul(10).ok_or(WadError::Overflow)?;
        }

        int_value
            .checked_mul(WAD)
            .and_then(|v| v.checked_add(frac_value))
            .map(Wad)
            .ok_or(WadError::Overflow)
    }

    /// Canonical decimal rendering with trailing fractional zeros trimmed.
    pub fn to_decimal_string(self) -> String {
        let int = self.0 / WAD;
        let frac = self.0 % WAD;
        if frac == 0 {
            return int.to_string();
        }
        let frac = format!("{:018}", frac);
        let frac = frac.trim_end_matches('0');
        format!("{}.{}", int, frac)
    }
}

impl fmt::Display for Wad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal_string())
    }
}

impl FromStr for Wad {
    type Err = WadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Wad::from_decimal_str(s)
    }
}
