//! Wallet-bridge HTTP client.
//!
//! All calls POST a typed JSON payload to the bridge endpoint. Write
//! submissions are sent exactly once per call; bounded retry belongs to the
//! flow controller, which owns the observable attempt count. Only the
//! confirmation wait polls, with open-ended exponential backoff.

use super::{ChainClient, ChainError, TxReceipt};
use crate::domain::{Address, PositionId, TxHash, Wad};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct HttpChainClient {
    client: Client,
    base_url: String,
}

impl HttpChainClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    async fn post(&self, payload: Value) -> Result<Value, ChainError> {
        let url = format!("{}/rpc", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ChainError::Network(e.to_string()))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| ChainError::Parse(e.to_string()))?;

        // Bridge-reported failures ride in the body with any status; the raw
        // text must survive for classification.
        if let Some(message) = body.get("error").and_then(|v| v.as_str()) {
            return Err(ChainError::Provider(message.to_string()));
        }
        if !status.is_success() {
            return Err(ChainError::Http {
                status: status.as_u16(),
                message: body.to_string(),
            });
        }
        Ok(body)
    }

    fn parse_tx_hash(body: &Value) -> Result<TxHash, ChainError> {
        let raw = body
            .get("txHash")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ChainError::Parse("missing txHash field".to_string()))?;
        TxHash::parse(raw).map_err(|e| ChainError::Parse(e.to_string()))
    }
}

#[async_trait]
impl ChainClient for HttpChainClient {
    async fn approve_collateral(
        &self,
        token: &Address,
        spender: &Address,
        amount: Wad,
    ) -> Result<TxHash, ChainError> {
        debug!(%token, %spender, amount = %amount, "submitting approval");
        let body = self
            .post(serde_json::json!({
                "type": "approve",
                "token": token.as_str(),
                "spender": spender.as_str(),
                "amount": amount.raw().to_string(),
            }))
            .await?;
        Self::parse_tx_hash(&body)
    }

    async fn deposit_and_mint(
        &self,
        vault: &Address,
        collateral: Wad,
        tip: Wad,
    ) -> Result<TxHash, ChainError> {
        debug!(%vault, collateral = %collateral, tip = %tip, "submitting deposit");
        let body = self
            .post(serde_json::json!({
                "type": "depositAndMint",
                "vault": vault.as_str(),
                "collateral": collateral.raw().to_string(),
                "tip": tip.raw().to_string(),
            }))
            .await?;
        Self::parse_tx_hash(&body)
    }

    async fn execute_transfer(
        &self,
        vault: &Address,
        position: PositionId,
        recipient: &Address,
        message: Option<&str>,
    ) -> Result<TxHash, ChainError> {
        debug!(%vault, %position, %recipient, "submitting transfer");
        let mut payload = serde_json::json!({
            "type": "executeTransfer",
            "vault": vault.as_str(),
            "positionId": position.as_u64(),
            "recipient": recipient.as_str(),
        });
        if let Some(message) = message {
            payload["message"] = Value::String(message.to_string());
        }
        let body = self.post(payload).await?;
        Self::parse_tx_hash(&body)
    }

    async fn wait_for_confirmation(&self, tx: &TxHash) -> Result<TxReceipt, ChainError> {
        let backoff = ExponentialBackoff::default();
        let tx = tx.clone();

        retry(backoff, || {
            let tx = tx.clone();
            async move {
                let body = self
                    .post(serde_json::json!({
                        "type": "receipt",
                        "txHash": tx.as_str(),
                    }))
                    .await
                    .map_err(|e| match e {
                        // Transport blips during polling are transient.
                        ChainError::Network(_) => backoff::Error::transient(e),
                        other => backoff::Error::permanent(other),
                    })?;

                let confirmed = body
                    .get("confirmed")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                if !confirmed {
                    return Err(backoff::Error::transient(ChainError::Provider(
                        "not yet confirmed".to_string(),
                    )));
                }

                Ok(TxReceipt {
                    tx_hash: tx.clone(),
                    block_number: body.get("blockNumber").and_then(|v| v.as_u64()),
                    status: body.get("status").and_then(|v| v.as_bool()).unwrap_or(true),
                    revert_reason: body
                        .get("revertReason")
                        .and_then(|v| v.as_str())
                        .map(|s| s.to_string()),
                })
            }
        })
        .await
    }

    async fn balance_of(&self, owner: &Address) -> Result<Wad, ChainError> {
        let body = self
            .post(serde_json::json!({
                "type": "balanceOf",
                "address": owner.as_str(),
            }))
            .await?;
        let raw = body
            .get("balance")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ChainError::Parse("missing balance field".to_string()))?;
        let raw: u128 = raw
            .parse()
            .map_err(|_| ChainError::Parse(format!("bad balance: {}", raw)))?;
        Ok(Wad::from_raw(raw))
    }
}
