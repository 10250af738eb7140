//! Payment link construction endpoint.

use crate::api::AppState;
use crate::domain::{
    payment_url, sanitize_message, validate_amount, Address, PayTarget, Username,
};
use crate::error::AppError;
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct PayLinkQuery {
    /// Recipient wallet address; mutually exclusive with `username`.
    pub to: Option<String>,
    pub username: Option<String>,
    pub amount: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayLinkResponse {
    pub url: String,
}

pub async fn get_pay_link(
    Query(params): Query<PayLinkQuery>,
    State(state): State<AppState>,
) -> Result<Json<PayLinkResponse>, AppError> {
    let target = match (params.to.as_deref(), params.username.as_deref()) {
        (Some(to), None) => PayTarget::Address(
            Address::parse(to).map_err(|e| AppError::BadRequest(e.to_string()))?,
        ),
        (None, Some(name)) => PayTarget::Username(
            Username::parse(name).map_err(|e| AppError::BadRequest(e.to_string()))?,
        ),
        _ => {
            return Err(AppError::BadRequest(
                "exactly one of to/username is required".to_string(),
            ))
        }
    };

    let amount = params
        .amount
        .as_deref()
        .map(validate_amount)
        .transpose()?;

    let message = params.message.as_deref().map(sanitize_message);

    let url = payment_url(
        &state.config.public_base_url,
        &target,
        amount,
        message.as_deref(),
    );
    Ok(Json(PayLinkResponse { url }))
}
