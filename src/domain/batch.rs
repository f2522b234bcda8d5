use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::intent::{AgentId, PoolId};

/// Batch-wide parameters resolved when a batch fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchParameters {
    pub slippage_bps: u32,
    /// Deadline extension in seconds
    pub deadline_extension: u64,
    pub participating_agents: Vec<AgentId>,
    pub total_commitments: u64,
}

/// Outcome of one `execute_batch` call (retries inside it are not separate records)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchExecutionResult {
    pub execution_id: Uuid,
    pub pool_id: PoolId,
    pub success: bool,
    pub transaction_ref: Option<String>,
    pub batch_size: u32,
    pub cost: Option<u64>,
    pub error: Option<String>,
    /// Settlement calls made, zero when the attempt aborted before calling out
    pub attempts: u32,
    pub executed_at: DateTime<Utc>,
}

impl BatchExecutionResult {
    pub fn succeeded(
        pool_id: impl Into<PoolId>,
        transaction_ref: String,
        batch_size: u32,
        cost: Option<u64>,
        attempts: u32,
    ) -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            pool_id: pool_id.into(),
            success: true,
            transaction_ref: Some(transaction_ref),
            batch_size,
            cost,
            error: None,
            attempts,
            executed_at: Utc::now(),
        }
    }

    pub fn failed(
        pool_id: impl Into<PoolId>,
        batch_size: u32,
        error: impl Into<String>,
        attempts: u32,
    ) -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            pool_id: pool_id.into(),
            success: false,
            transaction_ref: None,
            batch_size,
            cost: None,
            error: Some(error.into()),
            attempts,
            executed_at: Utc::now(),
        }
    }
}
