//! Username lookup and claim endpoints.

use crate::api::AppState;
use crate::auth::{claim_message, verify_personal_signature};
use crate::domain::{sanitize_message, Address, Claim, TimeMs, Username};
use crate::error::AppError;
use crate::ratelimit::RateDecision;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Lookup responses may be cached briefly by clients and CDNs.
const LOOKUP_CACHE_CONTROL: &str = "public, max-age=300";

#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    pub username: Option<String>,
}

/// `GET /v1/username?username=<name>`. The `@` is optional; `@alice` and
/// `alice` resolve to the identical record.
pub async fn lookup_username(
    Query(params): Query<LookupQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let raw = params
        .username
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest("username parameter is required".to_string()))?;

    let username = Username::parse(raw).map_err(|e| AppError::BadRequest(e.to_string()))?;
    let claim = state
        .repo
        .get_claim(&username)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("username @{} not found", username)))?;

    Ok((
        [(header::CACHE_CONTROL, LOOKUP_CACHE_CONTROL)],
        Json(claim),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimBody {
    pub username: String,
    pub wallet_address: String,
    /// The signed message; must match the canonical claim shape exactly.
    pub message: String,
    pub signature: String,
    pub thankyou_message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimResponse {
    pub success: bool,
    pub username: Username,
    pub wallet_address: Address,
}

/// `POST /v1/username`: validate, verify the wallet signature, then claim.
/// Uniqueness conflicts surface as 409; the limiter answers 429.
pub async fn claim_username(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ClaimBody>,
) -> Result<Json<ClaimResponse>, AppError> {
    let client_key = client_key(&headers);
    if state.limiter.check(&client_key, TimeMs::now()).await == RateDecision::Limited {
        return Err(AppError::RateLimited(
            "too many claim attempts, slow down".to_string(),
        ));
    }

    let username =
        Username::parse(&body.username).map_err(|e| AppError::BadRequest(e.to_string()))?;
    let wallet_address =
        Address::parse(&body.wallet_address).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let expected = claim_message(&username);
    if body.message != expected {
        return Err(AppError::BadRequest(format!(
            "message must be exactly {:?}",
            expected
        )));
    }
    if !verify_personal_signature(&body.message, &body.signature, wallet_address.as_str()) {
        return Err(AppError::Unauthorized(
            "signature does not match the wallet address".to_string(),
        ));
    }

    let thankyou_message = body
        .thankyou_message
        .as_deref()
        .map(sanitize_message)
        .filter(|m| !m.is_empty());

    let claim = Claim::new(
        username.clone(),
        wallet_address.clone(),
        Utc::now(),
        thankyou_message,
    );
    let inserted = state.repo.insert_claim(&claim).await?;
    if !inserted {
        return Err(AppError::Conflict(format!(
            "username @{} is already taken",
            username
        )));
    }

    info!(username = %username, wallet = %wallet_address, "username claimed");
    Ok(Json(ClaimResponse {
        success: true,
        username,
        wallet_address,
    }))
}

/// Rate-limit key: first hop of X-Forwarded-For when present, otherwise a
/// shared local bucket.
fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "local".to_string())
}
