//! Pure collateral math for BTC-backed borrowing.
//!
//! Everything here is side-effect free and operates on validated,
//! non-negative wad inputs. Floor division is used throughout, so the
//! forward/inverse pair is only approximately inverse: round-trips may
//! differ by one minimal unit and callers must tolerate that.

use crate::config::BorrowingConfig;
use crate::domain::{Wad, WadError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollateralError {
    #[error("BTC price must be positive")]
    ZeroPrice,
    #[error("collateral math overflow")]
    Overflow,
}

impl From<WadError> for CollateralError {
    fn from(err: WadError) -> Self {
        match err {
            WadError::DivisionByZero => CollateralError::ZeroPrice,
            _ => CollateralError::Overflow,
        }
    }
}

/// BTC collateral required to borrow `tip_amount` USD:
/// `tip * effective_ratio / price`, floored. Zero tip yields exactly zero.
pub fn required_collateral(
    cfg: &BorrowingConfig,
    tip_amount: Wad,
    btc_price: Wad,
) -> Result<Wad, CollateralError> {
    if btc_price.is_zero() {
        return Err(CollateralError::ZeroPrice);
    }
    if tip_amount.is_zero() {
        return Ok(Wad::ZERO);
    }
    Ok(tip_amount.mul_div_floor(cfg.effective_ratio, btc_price)?)
}

/// Largest USD tip a BTC balance can collateralize:
/// `balance * price / effective_ratio`, floored.
pub fn max_tip_from_collateral(
    cfg: &BorrowingConfig,
    btc_balance: Wad,
    btc_price: Wad,
) -> Result<Wad, CollateralError> {
    if btc_price.is_zero() {
        return Err(CollateralError::ZeroPrice);
    }
    if btc_balance.is_zero() {
        return Ok(Wad::ZERO);
    }
    Ok(btc_balance.mul_div_floor(btc_price, cfg.effective_ratio)?)
}

/// Minimum BTC needed to borrow a notional $1 tip at a whole-dollar BTC
/// price. Gates enablement of the borrow option in clients.
pub fn minimum_btc_required(
    cfg: &BorrowingConfig,
    btc_price_usd: u64,
) -> Result<Wad, CollateralError> {
    required_collateral(cfg, Wad::ONE, Wad::from_int(btc_price_usd))
}

/// USD value of a BTC amount at the given price: `amount * price / 1e18`.
pub fn usd_value(btc_amount: Wad, btc_price: Wad) -> Result<Wad, CollateralError> {
    Ok(btc_amount.mul_div_floor(btc_price, Wad::ONE)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> BorrowingConfig {
        BorrowingConfig::default()
    }

    #[test]
    fn zero_tip_needs_zero_collateral() {
        let got = required_collateral(&cfg(), Wad::ZERO, Wad::from_int(50_000)).unwrap();
        assert_eq!(got, Wad::ZERO);
    }

    #[test]
    fn ten_dollar_tip_at_fifty_k() {
        // 10 * 2.1525 / 50000 = 0.0004305 BTC
        let got = required_collateral(&cfg(), Wad::from_int(10), Wad::from_int(50_000)).unwrap();
        assert_eq!(got, Wad::from_decimal_str("0.0004305").unwrap());
    }

    #[test]
    fn zero_price_is_an_error_not_a_panic() {
        assert_eq!(
            required_collateral(&cfg(), Wad::from_int(10), Wad::ZERO).unwrap_err(),
            CollateralError::ZeroPrice
        );
        assert_eq!(
            max_tip_from_collateral(&cfg(), Wad::from_int(1), Wad::ZERO).unwrap_err(),
            CollateralError::ZeroPrice
        );
    }

    #[test]
    fn monotonic_in_tip_amount() {
        let cfg = cfg();
        let price = Wad::from_int(50_000);
        let mut last = Wad::ZERO;
        for tip in [1u64, 5, 10, 100, 1_000_000] {
            let got = required_collateral(&cfg, Wad::from_int(tip), price).unwrap();
            assert!(got >= last);
            last = got;
        }
    }

    #[test]
    fn higher_price_needs_less_collateral() {
        let cfg = cfg();
        let tip = Wad::from_int(100);
        let low = required_collateral(&cfg, tip, Wad::from_int(30_000)).unwrap();
        let high = required_collateral(&cfg, tip, Wad::from_int(100_000)).unwrap();
        assert!(high < low);
    }

    #[test]
    fn round_trip_within_one_unit() {
        let cfg = cfg();
        for tip in ["0.01", "1", "100", "1000000"] {
            for price in [30_000u64, 50_000, 100_000] {
                let tip = Wad::from_decimal_str(tip).unwrap();
                let price = Wad::from_int(price);
                let collateral = required_collateral(&cfg, tip, price).unwrap();
                let back = max_tip_from_collateral(&cfg, collateral, price).unwrap();
                let diff = tip.raw().abs_diff(back.raw());
                assert!(diff <= 1, "tip={} back={} diff={}", tip, back, diff);
            }
        }
    }

    #[test]
    fn effective_ratio_holds_within_four_decimals() {
        // Collateral value in USD over tip value approximates 2.1525.
        let cfg = cfg();
        let tip = Wad::from_int(100);
        let price = Wad::from_int(50_000);
        let collateral = required_collateral(&cfg, tip, price).unwrap();
        let value = usd_value(collateral, price).unwrap();
        let ratio = value.mul_div_floor(Wad::ONE, tip).unwrap();
        let expected = Wad::from_decimal_str("2.1525").unwrap();
        let diff = ratio.raw().abs_diff(expected.raw());
        assert!(diff < 100_000_000_000_000, "ratio={}", ratio); // < 1e-4
    }

    #[test]
    fn minimum_btc_for_one_dollar() {
        // 1 * 2.1525 / 50000 = 0.00004305 BTC
        let got = minimum_btc_required(&cfg(), 50_000).unwrap();
        assert_eq!(got, Wad::from_decimal_str("0.00004305").unwrap());
    }

    #[test]
    fn zero_balance_affords_zero_tip() {
        let got = max_tip_from_collateral(&cfg(), Wad::ZERO, Wad::from_int(50_000)).unwrap();
        assert_eq!(got, Wad::ZERO);
    }
}
