//! Readiness Coordinator Configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::resolver::ConflictStrategy;

/// Configuration for the readiness coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Minimum number of ready agents before a batch may be considered
    pub quorum_agents: usize,
    /// Minimum summed pending commitments across ready agents
    pub min_total_commitments: u64,
    /// Window after quorum is first met for stragglers to join (ms)
    pub countdown_window_ms: u64,
    /// Signals older than this are purged before evaluation (ms)
    pub staleness_threshold_ms: u64,
    /// How differing numeric preferences are combined
    pub conflict_strategy: ConflictStrategy,
    /// Slippage used when no ready agent expressed a preference
    pub default_slippage_bps: u32,
    /// Deadline extension used when no ready agent expressed a preference (secs)
    pub default_deadline_extension_secs: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            quorum_agents: 2,
            min_total_commitments: 2,
            countdown_window_ms: 30_000,
            staleness_threshold_ms: 120_000,
            conflict_strategy: ConflictStrategy::Median,
            default_slippage_bps: 50,
            default_deadline_extension_secs: 300,
        }
    }
}

impl CoordinatorConfig {
    pub fn countdown_window(&self) -> Duration {
        Duration::from_millis(self.countdown_window_ms)
    }

    pub fn staleness_threshold(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.staleness_threshold_ms as i64)
    }
}
