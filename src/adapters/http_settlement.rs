//! HTTP settlement gateway client.
//!
//! Talks to a JSON gateway in front of the settlement contract. Every call is
//! `POST {endpoint}/rpc` with `{"method": ..., "params": ...}`; the gateway
//! answers `{"result": ...}` or `{"error": {"code": ..., "message": ...}}`.
//! Rejection codes are mapped through [`SettlementError::from_reason`], so the
//! human-readable message never decides retryability.

use async_trait::async_trait;
use ethers::types::H256;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::domain::{PoolKey, Proof, TradeIntent};
use crate::error::{Result, SealError, SettlementError};
use crate::settlement::{
    BatchReadiness, BatchReceipt, SettlementClient, SettlementKind, SettlementResult, TxReceipt,
};

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: Value,
    #[serde(default)]
    message: String,
}

impl RpcErrorBody {
    fn code_str(&self) -> String {
        match &self.code {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct HttpSettlementClient {
    http: Client,
    rpc_url: String,
    timeout: Duration,
}

impl HttpSettlementClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let endpoint = endpoint.trim().trim_end_matches('/');
        if endpoint.is_empty() {
            return Err(SealError::Validation(
                "settlement endpoint must not be empty".to_string(),
            ));
        }

        let http = Client::builder()
            .user_agent("sealbatch-settlement/0.1")
            .timeout(timeout)
            .build()
            .map_err(|e| {
                SealError::Internal(format!("failed to build settlement HTTP client: {}", e))
            })?;

        Ok(Self {
            http,
            rpc_url: format!("{}/rpc", endpoint),
            timeout,
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> SettlementResult<T> {
        debug!("settlement rpc {} -> {}", method, self.rpc_url);

        let resp = self
            .http
            .post(&self.rpc_url)
            .header(CONTENT_TYPE, "application/json")
            .json(&json!({ "method": method, "params": params }))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| self.transport_error(e))?;

        decode_rpc_response(method, status.as_u16(), &text)
    }

    fn transport_error(&self, err: reqwest::Error) -> SettlementError {
        if err.is_timeout() {
            SettlementError::Timeout {
                elapsed_ms: self.timeout.as_millis() as u64,
            }
        } else {
            SettlementError::Transport(err.to_string())
        }
    }
}

/// Decode a gateway reply.
///
/// A well-formed `error` body wins over the HTTP status so contract rejections
/// keep their code even when the gateway answers 4xx/5xx.
fn decode_rpc_response<T: DeserializeOwned>(
    method: &str,
    status: u16,
    body: &str,
) -> SettlementResult<T> {
    let parsed: Option<RpcResponse> = serde_json::from_str(body).ok();

    if let Some(RpcResponse {
        error: Some(err), ..
    }) = &parsed
    {
        return Err(SettlementError::from_reason(&err.code_str(), err.message.clone()));
    }

    if !(200..300).contains(&status) {
        return Err(SettlementError::Transport(format!(
            "{} failed: status={} body={}",
            method, status, body
        )));
    }

    let result = match parsed {
        Some(RpcResponse {
            result: Some(result),
            ..
        }) => result,
        Some(_) => Value::Null,
        None => {
            return Err(SettlementError::Transport(format!(
                "{} returned invalid JSON: {}",
                method, body
            )))
        }
    };

    serde_json::from_value(result).map_err(|e| {
        SettlementError::Transport(format!("{} returned unexpected result: {}", method, e))
    })
}

fn hashes_param(hashes: &[H256]) -> Value {
    Value::Array(hashes.iter().map(|h| json!(h)).collect())
}

fn intent_param(intent: &TradeIntent) -> Value {
    json!({
        "user": intent.user,
        "tokenIn": intent.token_in,
        "tokenOut": intent.token_out,
        "recipient": intent.recipient,
        "amountIn": intent.amount_in.to_string(),
        "minAmountOut": intent.min_amount_out.to_string(),
        "deadline": intent.deadline,
        "nonce": intent.nonce.to_string(),
    })
}

#[async_trait]
impl SettlementClient for HttpSettlementClient {
    fn kind(&self) -> SettlementKind {
        SettlementKind::Http
    }

    async fn check_batch_ready(&self, pool_key: &PoolKey) -> SettlementResult<BatchReadiness> {
        self.call("checkBatchReady", json!({ "poolKey": pool_key }))
            .await
    }

    async fn pending_commitment_count(&self, pool_key: &PoolKey) -> SettlementResult<u64> {
        self.call("pendingCommitmentCount", json!({ "poolKey": pool_key }))
            .await
    }

    async fn min_commitments(&self, pool_key: &PoolKey) -> SettlementResult<u64> {
        self.call("minCommitments", json!({ "poolKey": pool_key }))
            .await
    }

    async fn submit_commitment(
        &self,
        pool_key: &PoolKey,
        commitment_hash: H256,
    ) -> SettlementResult<TxReceipt> {
        self.call(
            "submitCommitment",
            json!({ "poolKey": pool_key, "commitmentHash": commitment_hash }),
        )
        .await
    }

    async fn submit_commitment_with_proof(
        &self,
        pool_key: &PoolKey,
        commitment_hash: H256,
        proof: &Proof,
    ) -> SettlementResult<TxReceipt> {
        self.call(
            "submitCommitmentWithProof",
            json!({ "poolKey": pool_key, "commitmentHash": commitment_hash, "proof": proof }),
        )
        .await
    }

    async fn submit_reveal(
        &self,
        pool_key: &PoolKey,
        commitment_hash: H256,
        intent: &TradeIntent,
    ) -> SettlementResult<TxReceipt> {
        self.call(
            "submitReveal",
            json!({
                "poolKey": pool_key,
                "commitmentHash": commitment_hash,
                "intent": intent_param(intent),
            }),
        )
        .await
    }

    async fn execute_batch(
        &self,
        pool_key: &PoolKey,
        commitment_hashes: &[H256],
    ) -> SettlementResult<BatchReceipt> {
        self.call(
            "executeBatch",
            json!({ "poolKey": pool_key, "commitmentHashes": hashes_param(commitment_hashes) }),
        )
        .await
    }

    async fn execute_batch_with_proofs(
        &self,
        pool_key: &PoolKey,
        commitment_hashes: &[H256],
        proofs: &[Proof],
    ) -> SettlementResult<BatchReceipt> {
        self.call(
            "executeBatchWithProofs",
            json!({
                "poolKey": pool_key,
                "commitmentHashes": hashes_param(commitment_hashes),
                "proofs": proofs,
            }),
        )
        .await
    }
}
