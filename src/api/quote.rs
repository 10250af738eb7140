//! Borrow quote: how much BTC a tip would lock up at the current price.

use crate::api::AppState;
use crate::domain::{validate_amount, TimeMs};
use crate::engine::{
    format_btc, format_usd, minimum_btc_required, required_collateral, usd_value,
};
use crate::error::AppError;
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct QuoteQuery {
    pub amount: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    pub amount_usd: String,
    pub required_collateral_wad: String,
    /// Six-decimal BTC display form, e.g. "0.000430".
    pub required_collateral_btc: String,
    /// What the locked collateral is worth right now, e.g. "21.52".
    pub collateral_value_usd: String,
    /// Minimum BTC balance needed to borrow a $1 tip at this price.
    pub minimum_collateral_btc: String,
    pub price_usd: f64,
    pub price_stale: bool,
}

pub async fn get_quote(
    Query(params): Query<QuoteQuery>,
    State(state): State<AppState>,
) -> Result<Json<QuoteResponse>, AppError> {
    let tip = validate_amount(&params.amount)?;

    let Some(sample) = state.price.latest_sample() else {
        return Err(AppError::Upstream("BTC price unavailable".to_string()));
    };

    let cfg = &state.borrowing;
    let collateral = required_collateral(cfg, tip, sample.price_wad)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    let value = usd_value(collateral, sample.price_wad)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    let minimum = minimum_btc_required(cfg, sample.price_usd.floor() as u64)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(QuoteResponse {
        amount_usd: format_usd(tip),
        required_collateral_wad: collateral.raw().to_string(),
        required_collateral_btc: format_btc(collateral),
        collateral_value_usd: format_usd(value),
        minimum_collateral_btc: format_btc(minimum),
        price_usd: sample.price_usd,
        price_stale: sample.is_stale(TimeMs::now(), cfg.price_staleness),
    }))
}
