//! Shareable payment URL construction.

use crate::domain::primitives::{Address, Username};
use crate::domain::wad::Wad;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

/// Who a payment link points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayTarget {
    Username(Username),
    Address(Address),
}

/// Build a payment URL of the form `/pay/@<name>` or `/pay?to=<address>`,
/// with optional `amount` and `message` query parameters.
///
/// The message is trimmed and percent-encoded; a blank message omits the
/// parameter entirely rather than emitting an empty one.
pub fn payment_url(
    base_url: &str,
    target: &PayTarget,
    amount: Option<Wad>,
    message: Option<&str>,
) -> String {
    let base = base_url.trim_end_matches('/');
    let mut params: Vec<String> = Vec::new();

    let path = match target {
        PayTarget::Username(name) => format!("{}/pay/@{}", base, name),
        PayTarget::Address(addr) => {
            params.push(format!("to={}", addr));
            format!("{}/pay", base)
        }
    };

    if let Some(amount) = amount {
        params.push(format!("amount={}", amount.to_decimal_string()));
    }
    if let Some(message) = message {
        let trimmed = message.trim();
        if !trimmed.is_empty() {
            params.push(format!(
                "message={}",
                utf8_percent_encode(trimmed, NON_ALPHANUMERIC)
            ));
        }
    }

    if params.is_empty() {
        path
    } else {
        format!("{}?{}", path, params.join("&"))
    }
}
