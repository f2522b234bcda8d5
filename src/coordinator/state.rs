//! Coordinator State: per-pool readiness bookkeeping

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::{AgentId, PoolId, ReadinessSignal};

/// Live readiness signals of one pool.
///
/// The pool's countdown handle lives in [`super::timers::CountdownTimers`],
/// keyed by the same pool id.
#[derive(Debug, Clone, Default)]
pub struct PoolCoordinationState {
    /// One live signal per agent; a newer signal replaces the older one
    pub signals: HashMap<AgentId, ReadinessSignal>,
    pub last_batch_at: Option<DateTime<Utc>>,
}

impl PoolCoordinationState {
    pub fn ready_count(&self) -> usize {
        self.signals.len()
    }

    pub fn total_pending_commitments(&self) -> u64 {
        self.signals
            .values()
            .map(|s| s.pending_commitments as u64)
            .sum()
    }

    /// Ready agent ids in ascending order
    pub fn ready_agents(&self) -> Vec<AgentId> {
        let mut agents: Vec<AgentId> = self.signals.keys().cloned().collect();
        agents.sort();
        agents
    }

    /// Drop signals older than `threshold`, returning the purged agent ids.
    pub fn purge_stale(&mut self, now: DateTime<Utc>, threshold: Duration) -> Vec<AgentId> {
        let stale: Vec<AgentId> = self
            .signals
            .iter()
            .filter(|(_, s)| s.is_stale(now, threshold))
            .map(|(agent, _)| agent.clone())
            .collect();
        for agent in &stale {
            self.signals.remove(agent);
        }
        stale
    }

    /// No live signals and never fired; safe to forget.
    pub fn is_idle(&self) -> bool {
        self.signals.is_empty() && self.last_batch_at.is_none()
    }

    /// Both the agent quorum and the commitment minimum hold.
    pub fn thresholds_met(&self, quorum_agents: usize, min_total_commitments: u64) -> bool {
        self.ready_count() >= quorum_agents
            && self.total_pending_commitments() >= min_total_commitments
    }
}

/// Read-only view of a pool returned by `ReadinessCoordinator::pool_state`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStateSnapshot {
    pub pool_id: PoolId,
    pub ready_agents: Vec<AgentId>,
    pub quorum_met: bool,
    pub countdown_active: bool,
    pub countdown_remaining_ms: Option<u64>,
    pub total_pending_commitments: u64,
    pub last_batch_at: Option<DateTime<Utc>>,
}
