//! A claimed `@username` record.

use crate::domain::primitives::{Address, Username};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A username claim binding a handle to a wallet address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub username: Username,
    pub wallet_address: Address,
    pub claimed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thankyou_message: Option<String>,
}

impl Claim {
    pub fn new(
        username: Username,
        wallet_address: Address,
        claimed_at: DateTime<Utc>,
        thankyou_message: Option<String>,
    ) -> Self {
        Claim {
            username,
            wallet_address,
            claimed_at,
            thankyou_message,
        }
    }
}
