//! Borrow flow session endpoints: start, inspect, retry, cancel.

use crate::api::AppState;
use crate::domain::{
    sanitize_message, validate_amount, Address, Username, Wad,
};
use crate::engine::{required_collateral, ClassifiedError};
use crate::error::AppError;
use crate::flow::{BorrowFlow, BorrowRequest, FlowError, FlowSnapshot, FlowState};
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartBorrowBody {
    pub payer: String,
    /// A wallet address or an `@username`.
    pub recipient: String,
    pub amount: String,
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartBorrowResponse {
    pub flow_id: Uuid,
    pub required_collateral_wad: String,
    pub flow: FlowDto,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowDto {
    pub state: StateDto,
    pub completed_steps: Vec<u8>,
    pub approve_tx: Option<String>,
    pub deposit_tx: Option<String>,
    pub transfer_tx: Option<String>,
    pub position_id: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "phase", rename_all = "camelCase")]
pub enum StateDto {
    Idle,
    #[serde(rename_all = "camelCase")]
    Preparing { step: u8, attempt: u32 },
    #[serde(rename_all = "camelCase")]
    Confirming {
        step: u8,
        tx_hash: String,
        attempt: u32,
    },
    #[serde(rename_all = "camelCase")]
    Approved { tx_hash: String },
    #[serde(rename_all = "camelCase")]
    Deposited { tx_hash: String, position_id: u64 },
    #[serde(rename_all = "camelCase")]
    Complete { tx_hash: String, completed_at: i64 },
    #[serde(rename_all = "camelCase")]
    Failed { step: u8, error: ErrorDto },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDto {
    pub message: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<ClassifiedError>,
}

impl From<&FlowSnapshot> for FlowDto {
    fn from(snapshot: &FlowSnapshot) -> Self {
        let state = match &snapshot.state {
            FlowState::Idle => StateDto::Idle,
            FlowState::Preparing { step, attempt } => StateDto::Preparing {
                step: step.number(),
                attempt: *attempt,
            },
            FlowState::Confirming {
                step,
                tx_hash,
                attempt,
            } => StateDto::Confirming {
                step: step.number(),
                tx_hash: tx_hash.to_string(),
                attempt: *attempt,
            },
            FlowState::Approved { tx_hash } => StateDto::Approved {
                tx_hash: tx_hash.to_string(),
            },
            FlowState::Deposited {
                tx_hash,
                position_id,
            } => StateDto::Deposited {
                tx_hash: tx_hash.to_string(),
                position_id: position_id.as_u64(),
            },
            FlowState::Complete {
                tx_hash,
                completed_at,
            } => StateDto::Complete {
                tx_hash: tx_hash.to_string(),
                completed_at: completed_at.as_ms(),
            },
            FlowState::Failed { step, error } => StateDto::Failed {
                step: step.number(),
                error: ErrorDto {
                    message: error.to_string(),
                    retryable: error.retryable(),
                    classification: error.classified().cloned(),
                },
            },
        };

        FlowDto {
            state,
            completed_steps: snapshot.completed_steps.clone(),
            approve_tx: snapshot.approve_tx.as_ref().map(|t| t.to_string()),
            deposit_tx: snapshot.deposit_tx.as_ref().map(|t| t.to_string()),
            transfer_tx: snapshot.transfer_tx.as_ref().map(|t| t.to_string()),
            position_id: snapshot.position_id.map(|p| p.as_u64()),
        }
    }
}

pub async fn start_borrow(
    State(state): State<AppState>,
    Json(body): Json<StartBorrowBody>,
) -> Result<Json<StartBorrowResponse>, AppError> {
    // Borrowing needs both contracts; refuse before any chain call.
    if state.config.collateral_token.is_none() || state.config.vault.is_none() {
        return Err(AppError::NotConfigured(
            "borrowing is not available: vault contracts not configured".to_string(),
        ));
    }

    let payer = Address::parse(&body.payer)
        .map_err(|e| AppError::BadRequest(format!("payer: {}", e)))?;
    let recipient = resolve_recipient(&state, &body.recipient).await?;
    let tip_amount = validate_amount(&body.amount)?;

    let Some(sample) = state.price.latest_sample() else {
        return Err(AppError::Upstream("BTC price unavailable".to_string()));
    };
    let collateral_amount = required_collateral(&state.borrowing, tip_amount, sample.price_wad)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let message = body
        .message
        .as_deref()
        .map(sanitize_message)
        .filter(|m| !m.is_empty());

    let request = BorrowRequest {
        payer: payer.clone(),
        recipient,
        tip_amount,
        collateral_amount,
        message,
    };

    let flow = BorrowFlow::new(
        state.chain.clone(),
        state.borrowing.step_retry,
        state.config.collateral_token.clone(),
        state.config.vault.clone(),
        request,
    );

    let flow_id = Uuid::new_v4();
    state.flows.insert(flow_id, flow.clone());
    info!(%flow_id, payer = %payer, "borrow flow started");

    spawn_run(flow_id, flow.clone(), state.clone(), tip_amount);

    Ok(Json(StartBorrowResponse {
        flow_id,
        required_collateral_wad: collateral_amount.raw().to_string(),
        flow: FlowDto::from(&flow.snapshot()),
    }))
}

/// Drive a flow in the background; on completion nudge the payer's balance
/// monitor so the UI sees the spend before the next poll lands.
fn spawn_run(flow_id: Uuid, flow: Arc<BorrowFlow>, state: AppState, collateral: Wad) {
    tokio::spawn(async move {
        match flow.run().await {
            Ok(crate::flow::FlowOutcome::Completed(tx)) => {
                info!(%flow_id, tx = %tx, "borrow flow completed");
                let payer = flow.request().payer.clone();
                state
                    .balances
                    .get_or_spawn(&payer)
                    .update_optimistically(collateral);
            }
            Ok(crate::flow::FlowOutcome::Cancelled) => {
                info!(%flow_id, "borrow flow cancelled");
            }
            Err(FlowError::Chain(ref c)) if !c.retryable => {
                // Quiet outcome; the user backed out.
            }
            Err(e) => {
                warn!(%flow_id, error = %e, "borrow flow failed");
            }
        }
    });
}

async fn resolve_recipient(state: &AppState, raw: &str) -> Result<Address, AppError> {
    let trimmed = raw.trim();
    if trimmed.starts_with("0x") || trimmed.starts_with("0X") {
        return Address::parse(trimmed)
            .map_err(|e| AppError::BadRequest(format!("recipient: {}", e)));
    }

    let username = Username::parse(trimmed)
        .map_err(|e| AppError::BadRequest(format!("recipient: {}", e)))?;
    let claim = state
        .repo
        .get_claim(&username)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("username @{} is not claimed", username)))?;
    Ok(claim.wallet_address)
}

#[derive(Debug, Deserialize)]
pub struct FlowPath {
    pub id: Uuid,
}

pub async fn get_borrow(
    Path(FlowPath { id }): Path<FlowPath>,
    State(state): State<AppState>,
) -> Result<Json<FlowDto>, AppError> {
    let flow = state
        .flows
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("unknown flow {}", id)))?;
    Ok(Json(FlowDto::from(&flow.snapshot())))
}

pub async fn retry_borrow(
    Path(FlowPath { id }): Path<FlowPath>,
    State(state): State<AppState>,
) -> Result<Json<FlowDto>, AppError> {
    let flow = state
        .flows
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("unknown flow {}", id)))?;

    if !matches!(flow.snapshot().state, FlowState::Failed { .. }) {
        return Err(AppError::BadRequest(
            "flow is not in a failed state".to_string(),
        ));
    }

    let retrying = flow.clone();
    tokio::spawn(async move {
        if let Err(e) = retrying.retry().await {
            warn!(%id, error = %e, "manual retry failed");
        }
    });

    Ok(Json(FlowDto::from(&flow.snapshot())))
}

pub async fn cancel_borrow(
    Path(FlowPath { id }): Path<FlowPath>,
    State(state): State<AppState>,
) -> Result<Json<FlowDto>, AppError> {
    let flow = state
        .flows
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("unknown flow {}", id)))?;
    flow.cancel();
    Ok(Json(FlowDto::from(&flow.snapshot())))
}
