//! Monitored balance endpoints.

use crate::api::AppState;
use crate::domain::{validate_amount, Address};
use crate::engine::format_usd;
use crate::error::AppError;
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct BalanceQuery {
    pub address: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub address: Option<String>,
    /// Authoritative on-chain value (wad string), null until first poll.
    pub on_chain_wad: Option<String>,
    /// Value a client should display: optimistic override if present.
    pub displayed_wad: Option<String>,
    pub formatted: Option<String>,
    pub optimistic: bool,
}

/// Without an address there is nothing to poll: balances report as null,
/// not zero, and no monitor is spawned.
pub async fn get_balance(
    Query(params): Query<BalanceQuery>,
    State(state): State<AppState>,
) -> Result<Json<BalanceResponse>, AppError> {
    let Some(raw) = params.address.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(Json(BalanceResponse {
            address: None,
            on_chain_wad: None,
            displayed_wad: None,
            formatted: None,
            optimistic: false,
        }));
    };

    let address = Address::parse(raw).map_err(|e| AppError::BadRequest(e.to_string()))?;
    let handle = state.balances.get_or_spawn(&address);
    let snapshot = handle.current();

    Ok(Json(BalanceResponse {
        address: Some(address.to_string()),
        on_chain_wad: snapshot.on_chain.map(|w| w.raw().to_string()),
        displayed_wad: snapshot.displayed().map(|w| w.raw().to_string()),
        formatted: snapshot.displayed().map(format_usd),
        optimistic: snapshot.optimistic.is_some(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefetchBody {
    pub address: String,
}

/// Drop any optimistic override and poll immediately.
pub async fn refetch_balance(
    State(state): State<AppState>,
    Json(body): Json<RefetchBody>,
) -> Result<Json<BalanceResponse>, AppError> {
    let address =
        Address::parse(&body.address).map_err(|e| AppError::BadRequest(e.to_string()))?;
    let handle = state.balances.get_or_spawn(&address);
    handle.refetch();

    let snapshot = handle.current();
    Ok(Json(BalanceResponse {
        address: Some(address.to_string()),
        on_chain_wad: snapshot.on_chain.map(|w| w.raw().to_string()),
        displayed_wad: snapshot.displayed().map(|w| w.raw().to_string()),
        formatted: snapshot.displayed().map(format_usd),
        optimistic: snapshot.optimistic.is_some(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimisticBody {
    pub address: String,
    pub amount_sent: String,
}

/// Apply an optimistic decrement after a submitted send; the monitor
/// re-polls shortly after and reconciles.
pub async fn optimistic_update(
    State(state): State<AppState>,
    Json(body): Json<OptimisticBody>,
) -> Result<Json<BalanceResponse>, AppError> {
    let address =
        Address::parse(&body.address).map_err(|e| AppError::BadRequest(e.to_string()))?;
    let amount = validate_amount(&body.amount_sent)?;

    let handle = state.balances.get_or_spawn(&address);
    handle.update_optimistically(amount);

    let snapshot = handle.current();
    Ok(Json(BalanceResponse {
        address: Some(address.to_string()),
        on_chain_wad: snapshot.on_chain.map(|w| w.raw().to_string()),
        displayed_wad: snapshot.displayed().map(|w| w.raw().to_string()),
        formatted: snapshot.displayed().map(format_usd),
        optimistic: snapshot.optimistic.is_some(),
    }))
}
