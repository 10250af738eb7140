//! Current BTC/USD price endpoint.

use crate::api::AppState;
use crate::domain::TimeMs;
use crate::error::AppError;
use crate::pricefeed::PriceSource;
use axum::extract::State;
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceResponse {
    pub price_usd: f64,
    /// Raw wad integer as a string; JSON numbers lose precision here.
    pub price_wad: String,
    pub timestamp_ms: i64,
    pub source: PriceSource,
    pub stale: bool,
    pub fetching: bool,
}

/// Force an out-of-band fetch regardless of the interval timer. The poller
/// picks the request up asynchronously; the response reflects the state at
/// the time of the call.
pub async fn refetch_price(State(state): State<AppState>) -> Result<Json<PriceResponse>, AppError> {
    state.price.refetch();
    get_price(State(state)).await
}

pub async fn get_price(State(state): State<AppState>) -> Result<Json<PriceResponse>, AppError> {
    let current = state.price.current();
    let Some(sample) = current.sample else {
        let detail = current
            .last_error
            .unwrap_or_else(|| "no price observed yet".to_string());
        return Err(AppError::Upstream(format!("BTC price unavailable: {}", detail)));
    };

    Ok(Json(PriceResponse {
        price_usd: sample.price_usd,
        price_wad: sample.price_wad.raw().to_string(),
        timestamp_ms: sample.timestamp_ms.as_ms(),
        source: sample.source,
        stale: sample.is_stale(TimeMs::now(), state.borrowing.price_staleness),
        fetching: current.fetching,
    }))
}
