use async_trait::async_trait;
use ethers::types::{Bytes, H256};
use serde::{Deserialize, Serialize};

use crate::domain::{PoolKey, Proof, TradeIntent};
use crate::error::SettlementError;

pub type SettlementResult<T> = std::result::Result<T, SettlementError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementKind {
    Http,
    Simulated,
}

impl SettlementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Simulated => "simulated",
        }
    }
}

impl std::fmt::Display for SettlementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Backend view of whether a pool's batch may execute now
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReadiness {
    pub executable: bool,
    /// Backend-specific detail, passed through untouched
    #[serde(default)]
    pub payload: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub tx_ref: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReceipt {
    pub tx_ref: String,
    #[serde(default)]
    pub cost: Option<u64>,
}

/// Remote settlement backend.
///
/// Every call is a blocking remote operation that may fail transiently; each
/// failure is reported as a tagged [`SettlementError`] so callers can decide
/// retryability with a plain match.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SettlementClient: Send + Sync {
    fn kind(&self) -> SettlementKind;

    async fn check_batch_ready(&self, pool_key: &PoolKey) -> SettlementResult<BatchReadiness>;

    async fn pending_commitment_count(&self, pool_key: &PoolKey) -> SettlementResult<u64>;

    async fn min_commitments(&self, pool_key: &PoolKey) -> SettlementResult<u64>;

    async fn submit_commitment(
        &self,
        pool_key: &PoolKey,
        commitment_hash: H256,
    ) -> SettlementResult<TxReceipt>;

    async fn submit_commitment_with_proof(
        &self,
        pool_key: &PoolKey,
        commitment_hash: H256,
        proof: &Proof,
    ) -> SettlementResult<TxReceipt>;

    async fn submit_reveal(
        &self,
        pool_key: &PoolKey,
        commitment_hash: H256,
        intent: &TradeIntent,
    ) -> SettlementResult<TxReceipt>;

    async fn execute_batch(
        &self,
        pool_key: &PoolKey,
        commitment_hashes: &[H256],
    ) -> SettlementResult<BatchReceipt>;

    async fn execute_batch_with_proofs(
        &self,
        pool_key: &PoolKey,
        commitment_hashes: &[H256],
        proofs: &[Proof],
    ) -> SettlementResult<BatchReceipt>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_receipt_cost_is_optional_on_the_wire() {
        let receipt: BatchReceipt = serde_json::from_str(r#"{"txRef":"0xabc"}"#).unwrap();
        assert_eq!(receipt.tx_ref, "0xabc");
        assert_eq!(receipt.cost, None);
    }
}
