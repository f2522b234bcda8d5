use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::intent::{AgentId, PoolId};

/// An agent's "I am ready" (or "no longer ready") signal for one pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessSignal {
    pub agent_id: AgentId,
    pub pool_id: PoolId,
    pub ready: bool,
    pub pending_commitments: u32,
    #[serde(default)]
    pub preferred_slippage_bps: Option<u32>,
    /// Preferred deadline extension in seconds
    #[serde(default)]
    pub preferred_deadline_extension: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

impl ReadinessSignal {
    /// Ready signal stamped now, without numeric preferences.
    pub fn ready(
        agent_id: impl Into<AgentId>,
        pool_id: impl Into<PoolId>,
        pending_commitments: u32,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            pool_id: pool_id.into(),
            ready: true,
            pending_commitments,
            preferred_slippage_bps: None,
            preferred_deadline_extension: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_slippage_bps(mut self, bps: u32) -> Self {
        self.preferred_slippage_bps = Some(bps);
        self
    }

    pub fn with_deadline_extension(mut self, secs: u64) -> Self {
        self.preferred_deadline_extension = Some(secs);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Older than `threshold` relative to `now`.
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        now.signed_duration_since(self.timestamp) > threshold
    }
}

/// Message shapes carried on the readiness fan-out bus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReadinessMessage {
    Ready(ReadinessSignal),
    #[serde(rename_all = "camelCase")]
    Withdraw { agent_id: AgentId, pool_id: PoolId },
    #[serde(rename_all = "camelCase")]
    Register { agent_id: AgentId },
    #[serde(rename_all = "camelCase")]
    Unregister { agent_id: AgentId },
}
