//! Batch Execution Engine Configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Wait after submitting reveals before the batch call reads them (ms)
    pub settle_delay_ms: u64,
    /// Readiness polling interval (ms)
    pub poll_interval_ms: u64,
    /// Extra attempts after the first for transient failures
    pub max_retries: u32,
    /// Linear backoff unit: attempt n waits n x this (ms)
    pub retry_base_delay_ms: u64,
    /// Used when the backend cannot report its own minimum
    pub default_min_commitments: u64,
    /// Execute batches with cached proofs attached
    pub with_proofs: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 10_000,
            poll_interval_ms: 30_000,
            max_retries: 3,
            retry_base_delay_ms: 5_000,
            default_min_commitments: 2,
            with_proofs: false,
        }
    }
}

impl ExecutionConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}
