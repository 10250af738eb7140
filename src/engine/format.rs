//! Display formatting for monetary values.

use crate::domain::Wad;
use rust_decimal::{Decimal, RoundingStrategy};

/// Render a USD wad with thousands separators and exactly two decimals,
/// e.g. `1,234.56`. Midpoints round to even (standard numeric formatting).
pub fn format_usd(amount: Wad) -> String {
    let rounded = to_decimal(amount).round_dp(2);
    with_separators(&format!("{:.2}", rounded))
}

/// Render a BTC wad with exactly six decimals, zero-padded and truncated
/// toward zero, consistent with the floor arithmetic that produced it.
pub fn format_btc(amount: Wad) -> String {
    let truncated = to_decimal(amount).round_dp_with_strategy(6, RoundingStrategy::ToZero);
    format!("{:.6}", truncated)
}

fn to_decimal(amount: Wad) -> Decimal {
    // Wad raw values of realistic magnitude fit i128; clamp the pathological
    // rest rather than panic in a display path.
    let raw = i128::try_from(amount.raw()).unwrap_or(i128::MAX);
    Decimal::from_i128_with_scale(raw, 18)
}

fn with_separators(formatted: &str) -> String {
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, f),
        None => (formatted, ""),
    };
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    let digits: Vec<char> = int_part.chars().collect();
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*c);
    }
    if frac_part.is_empty() {
        grouped
    } else {
        format!("{}.{}", grouped, frac_part)
    }
}
