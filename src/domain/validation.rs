//! Input validation applied before any network or chain call.

use crate::domain::wad::{Wad, WadError};
use thiserror::Error;

/// Maximum length of a tip/thank-you message after sanitization.
pub const MAX_MESSAGE_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("amount is required")]
    MissingAmount,
    #[error("amount is not a valid decimal: {0}")]
    MalformedAmount(String),
    #[error("amount must be greater than zero")]
    NonPositiveAmount,
}

/// Parse and validate a user-supplied USD amount.
///
/// Accepts plain decimal strings with at most 18 fractional digits and
/// requires a strictly positive value.
pub fn validate_amount(raw: &str) -> Result<Wad, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingAmount);
    }
    let amount = Wad::from_decimal_str(trimmed).map_err(|e| match e {
        WadError::InvalidLiteral(s) | WadError::TooManyFractionalDigits(s) => {
            ValidationError::MalformedAmount(s)
        }
        _ => ValidationError::MalformedAmount(trimmed.to_string()),
    })?;
    if amount.is_zero() {
        return Err(ValidationError::NonPositiveAmount);
    }
    Ok(amount)
}

/// Sanitize a free-text message.
///
/// `script` and `style` elements are removed together with their content,
/// every other tag is stripped, the result is trimmed and truncated to
/// [`MAX_MESSAGE_CHARS`] characters.
pub fn sanitize_message(raw: &str) -> String {
    let without_blocks = strip_element_with_content(raw, "script");
    let without_blocks = strip_element_with_content(&without_blocks, "style");
    let stripped = strip_tags(&without_blocks);
    let trimmed = stripped.trim();
    truncate_chars(trimmed, MAX_MESSAGE_CHARS)
}

/// Remove `<name ...> ... </name>` spans, case-insensitively.
/// An unterminated opening tag swallows the rest of the input.
fn strip_element_with_content(input: &str, name: &str) -> String {
    let open = format!("<{}", name);
    let close = format!("</{}", name);
    // ASCII lowering keeps byte offsets aligned with `input`.
    let lower = input.to_ascii_lowercase();
    let mut out = String::with_capacity(input.len());
    let mut pos = 0;

    while let Some(start) = lower[pos..].find(&open) {
        let start = pos + start;
        out.push_str(&input[pos..start]);
        match lower[start..].find(&close) {
            Some(rel) => {
                let close_start = start + rel;
                match lower[close_start..].find('>') {
                    Some(end_rel) => pos = close_start + end_rel + 1,
                    None => return out,
                }
            }
            None => return out,
        }
    }
    out.push_str(&input[pos..]);
    out
}

/// Drop everything between `<` and the next `>`; an unterminated `<`
/// drops the remainder.
fn strip_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c == '<' {
            for t in chars.by_ref() {
                if t == '>' {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_accepts_positive_decimals() {
        assert_eq!(validate_amount("10").unwrap(), Wad::from_int(10));
        assert_eq!(
            validate_amount(" 0.25 ").unwrap(),
            Wad::from_decimal_str("0.25").unwrap()
        );
    }

    #[test]
    fn amount_rejects_zero_negative_and_garbage() {
        assert_eq!(
            validate_amount("0").unwrap_err(),
            ValidationError::NonPositiveAmount
        );
        assert!(matches!(
            validate_amount("-5").unwrap_err(),
            ValidationError::MalformedAmount(_)
        ));
        assert!(matches!(
            validate_amount("ten").unwrap_err(),
            ValidationError::MalformedAmount(_)
        ));
        assert_eq!(validate_amount("  ").unwrap_err(), ValidationError::MissingAmount);
    }

    #[test]
    fn sanitize_removes_script_with_content() {
        assert_eq!(sanitize_message("<script>alert(1)</script>Hello"), "Hello");
        assert_eq!(
            sanitize_message("<SCRIPT src=x>alert(1)</SCRIPT>Hi"),
            "Hi"
        );
    }

    #[test]
    fn sanitize_strips_other_tags_but_keeps_text() {
        assert_eq!(sanitize_message("<b>bold</b> words"), "bold words");
        assert_eq!(sanitize_message("a <img src=x> b"), "a  b");
    }

    #[test]
    fn sanitize_handles_unterminated_tags() {
        assert_eq!(sanitize_message("hi <script>gone"), "hi");
        assert_eq!(sanitize_message("hi <b unclosed"), "hi");
    }

    #[test]
    fn sanitize_truncates_to_exactly_200_chars() {
        let long = "x".repeat(300);
        let out = sanitize_message(&long);
        assert_eq!(out.chars().count(), 200);
    }

    #[test]
    fn sanitize_trims_whitespace() {
        assert_eq!(sanitize_message("  hello  "), "hello");
    }
}
