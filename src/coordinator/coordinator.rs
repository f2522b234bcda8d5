//! Readiness Coordinator: per-pool quorum detection for batch triggering
//!
//! Agents signal "ready" for a pool independently. After every signal change
//! the pool is evaluated:
//!   - below agent quorum or commitment minimum: nothing happens
//!   - every registered agent is ready: fire now, cancelling any countdown
//!   - otherwise: start the pool's countdown (if none runs) and fire on expiry
//!
//! Firing resolves the batch parameters, fans the event out to listeners and
//! then unconditionally resets the pool, so one readiness set fires once.

use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::{AgentId, BatchParameters, ReadinessMessage, ReadinessSignal};

use super::config::CoordinatorConfig;
use super::dispatch::{BatchReadyDispatcher, BatchReadyListener, DispatchReport};
use super::state::{PoolCoordinationState, PoolStateSnapshot};
use super::timers::{CountdownId, CountdownTimers};

#[derive(Default)]
struct CoordinatorState {
    registered: HashSet<AgentId>,
    pools: HashMap<String, PoolCoordinationState>,
    timers: CountdownTimers,
    dispatcher: BatchReadyDispatcher,
}

struct Inner {
    config: CoordinatorConfig,
    state: Mutex<CoordinatorState>,
}

/// Clonable handle to the readiness coordinator
#[derive(Clone)]
pub struct ReadinessCoordinator {
    inner: Arc<Inner>,
}

impl ReadinessCoordinator {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(CoordinatorState::default()),
            }),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    // ==================== Agents ====================

    pub async fn register_agent(&self, agent_id: impl Into<AgentId>) {
        let agent_id = agent_id.into();
        let mut state = self.inner.state.lock().await;
        if state.registered.insert(agent_id.clone()) {
            info!("Registered agent {}", agent_id);
        }
    }

    /// Unregister an agent and drop its signals from every pool.
    ///
    /// Pools that lose quorum have their countdown cancelled; every pool with
    /// live signals is then re-evaluated against the smaller agent set.
    pub async fn unregister_agent(&self, agent_id: &str) {
        let mut state = self.inner.state.lock().await;
        if !state.registered.remove(agent_id) {
            warn!("Unregister for unknown agent {}", agent_id);
            return;
        }

        let pool_ids: Vec<String> = state.pools.keys().cloned().collect();
        for pool_id in &pool_ids {
            let removed = state
                .pools
                .get_mut(pool_id)
                .map(|pool| pool.signals.remove(agent_id).is_some())
                .unwrap_or(false);
            if removed {
                debug!("Dropped signal of {} from pool {}", agent_id, pool_id);
                self.cancel_if_quorum_lost(&mut state, pool_id);
            }
        }

        for pool_id in &pool_ids {
            self.purge_and_evaluate(&mut state, pool_id);
        }
        info!("Unregistered agent {}", agent_id);
    }

    pub async fn registered_agents(&self) -> Vec<AgentId> {
        let state = self.inner.state.lock().await;
        let mut agents: Vec<AgentId> = state.registered.iter().cloned().collect();
        agents.sort();
        agents
    }

    // ==================== Signals ====================

    /// Record a readiness signal and evaluate its pool.
    ///
    /// Returns false when the signal came from an unregistered agent; such
    /// signals are logged and otherwise ignored.
    pub async fn signal_ready(&self, signal: ReadinessSignal) -> bool {
        let mut state = self.inner.state.lock().await;
        if !state.registered.contains(&signal.agent_id) {
            warn!(
                "Ignoring readiness signal from unregistered agent {} for pool {}",
                signal.agent_id, signal.pool_id
            );
            return false;
        }

        let pool_id = signal.pool_id.clone();
        if signal.ready {
            debug!(
                "Agent {} ready for pool {} ({} pending)",
                signal.agent_id, pool_id, signal.pending_commitments
            );
            state
                .pools
                .entry(pool_id.clone())
                .or_default()
                .signals
                .insert(signal.agent_id.clone(), signal);
        } else {
            self.remove_signal(&mut state, &signal.agent_id, &pool_id);
        }

        self.purge_and_evaluate(&mut state, &pool_id);
        true
    }

    /// Withdraw an agent's readiness. Returns whether a signal was removed.
    pub async fn withdraw_ready(&self, agent_id: &str, pool_id: &str) -> bool {
        let mut state = self.inner.state.lock().await;
        self.remove_signal(&mut state, agent_id, pool_id)
    }

    /// Apply a message received from the readiness bus.
    pub async fn apply_message(&self, message: ReadinessMessage) {
        match message {
            ReadinessMessage::Ready(signal) => {
                self.signal_ready(signal).await;
            }
            ReadinessMessage::Withdraw { agent_id, pool_id } => {
                self.withdraw_ready(&agent_id, &pool_id).await;
            }
            ReadinessMessage::Register { agent_id } => self.register_agent(agent_id).await,
            ReadinessMessage::Unregister { agent_id } => self.unregister_agent(&agent_id).await,
        }
    }

    // ==================== Batch parameters & listeners ====================

    /// Register a listener invoked with `(pool_id, params)` whenever a batch fires.
    pub async fn on_batch_ready<L>(&self, listener: L)
    where
        L: BatchReadyListener + 'static,
    {
        let mut state = self.inner.state.lock().await;
        state.dispatcher.register(Arc::new(listener));
    }

    /// Resolve slippage/deadline from the pool's ready signals.
    pub async fn resolve_batch_parameters(&self, pool_id: &str) -> BatchParameters {
        let state = self.inner.state.lock().await;
        self.resolve(state.pools.get(pool_id))
    }

    fn resolve(&self, pool: Option<&PoolCoordinationState>) -> BatchParameters {
        let config = &self.inner.config;
        let Some(pool) = pool.filter(|p| !p.signals.is_empty()) else {
            return BatchParameters {
                slippage_bps: config.default_slippage_bps,
                deadline_extension: config.default_deadline_extension_secs,
                participating_agents: Vec::new(),
                total_commitments: 0,
            };
        };

        let slippages: Vec<u64> = pool
            .signals
            .values()
            .filter_map(|s| s.preferred_slippage_bps.map(u64::from))
            .collect();
        let extensions: Vec<u64> = pool
            .signals
            .values()
            .filter_map(|s| s.preferred_deadline_extension)
            .collect();

        let strategy = config.conflict_strategy;
        BatchParameters {
            slippage_bps: strategy
                .resolve(&slippages)
                .map(|v| v.min(u32::MAX as u64) as u32)
                .unwrap_or(config.default_slippage_bps),
            deadline_extension: strategy
                .resolve(&extensions)
                .unwrap_or(config.default_deadline_extension_secs),
            participating_agents: pool.ready_agents(),
            total_commitments: pool.total_pending_commitments(),
        }
    }

    // ==================== Inspection & reset ====================

    pub async fn pool_state(&self, pool_id: &str) -> PoolStateSnapshot {
        let state = self.inner.state.lock().await;
        let config = &self.inner.config;
        let pool = state.pools.get(pool_id);

        PoolStateSnapshot {
            pool_id: pool_id.to_string(),
            ready_agents: pool.map(|p| p.ready_agents()).unwrap_or_default(),
            quorum_met: pool
                .map(|p| p.thresholds_met(config.quorum_agents, config.min_total_commitments))
                .unwrap_or(false),
            countdown_active: state.timers.is_active(pool_id),
            countdown_remaining_ms: state
                .timers
                .remaining(pool_id)
                .map(|d| d.as_millis() as u64),
            total_pending_commitments: pool.map(|p| p.total_pending_commitments()).unwrap_or(0),
            last_batch_at: pool.and_then(|p| p.last_batch_at),
        }
    }

    /// Clear a pool's signals and cancel its countdown.
    pub async fn reset_pool(&self, pool_id: &str) {
        let mut state = self.inner.state.lock().await;
        Self::clear_pool(&mut state, pool_id);
        debug!("Pool {} reset", pool_id);
    }

    pub async fn reset_all(&self) {
        let mut state = self.inner.state.lock().await;
        state.timers.cancel_all();
        for pool in state.pools.values_mut() {
            pool.signals.clear();
        }
        state.pools.retain(|_, pool| !pool.is_idle());
        debug!("All pools reset");
    }

    // ==================== Evaluation ====================

    fn remove_signal(&self, state: &mut CoordinatorState, agent_id: &str, pool_id: &str) -> bool {
        let removed = state
            .pools
            .get_mut(pool_id)
            .map(|pool| pool.signals.remove(agent_id).is_some())
            .unwrap_or(false);

        if removed {
            debug!("Agent {} withdrew readiness for pool {}", agent_id, pool_id);
            self.cancel_if_quorum_lost(state, pool_id);
            Self::forget_if_idle(state, pool_id);
        }
        removed
    }

    fn cancel_if_quorum_lost(&self, state: &mut CoordinatorState, pool_id: &str) {
        let config = &self.inner.config;
        let still_met = state
            .pools
            .get(pool_id)
            .map(|p| p.thresholds_met(config.quorum_agents, config.min_total_commitments))
            .unwrap_or(false);

        if !still_met && state.timers.cancel(pool_id) {
            info!("Pool {} dropped below quorum, countdown cancelled", pool_id);
        }
    }

    fn purge_and_evaluate(&self, state: &mut CoordinatorState, pool_id: &str) {
        let config = &self.inner.config;
        if let Some(pool) = state.pools.get_mut(pool_id) {
            let purged = pool.purge_stale(Utc::now(), config.staleness_threshold());
            if !purged.is_empty() {
                debug!("Purged stale signals from pool {}: {:?}", pool_id, purged);
                self.cancel_if_quorum_lost(state, pool_id);
            }
        }
        self.evaluate(state, pool_id);
        Self::forget_if_idle(state, pool_id);
    }

    fn evaluate(&self, state: &mut CoordinatorState, pool_id: &str) {
        let config = &self.inner.config;
        let Some(pool) = state.pools.get(pool_id) else {
            return;
        };

        if !pool.thresholds_met(config.quorum_agents, config.min_total_commitments) {
            return;
        }

        if pool.ready_count() >= state.registered.len() {
            state.timers.cancel(pool_id);
            info!(
                "All {} registered agents ready for pool {}, firing now",
                state.registered.len(),
                pool_id
            );
            self.fire(state, pool_id);
            return;
        }

        if state.timers.is_active(pool_id) {
            return;
        }

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let expiring_pool = pool_id.to_string();
        let window = config.countdown_window();
        state.timers.start(pool_id, window, move |id| async move {
            if let Some(inner) = weak.upgrade() {
                ReadinessCoordinator { inner }
                    .on_countdown_expired(&expiring_pool, id)
                    .await;
            }
        });
        info!(
            "Quorum reached for pool {} ({} agents), countdown {:?} started",
            pool_id,
            state.pools.get(pool_id).map(|p| p.ready_count()).unwrap_or(0),
            window
        );
    }

    async fn on_countdown_expired(&self, pool_id: &str, id: CountdownId) {
        let mut state = self.inner.state.lock().await;
        if !state.timers.claim(pool_id, id) {
            debug!("Countdown {} for pool {} no longer current", id, pool_id);
            return;
        }

        let config = &self.inner.config;
        let still_met = match state.pools.get_mut(pool_id) {
            Some(pool) => {
                pool.purge_stale(Utc::now(), config.staleness_threshold());
                pool.thresholds_met(config.quorum_agents, config.min_total_commitments)
            }
            None => false,
        };

        if still_met {
            info!("Countdown expired for pool {}, firing", pool_id);
            self.fire(&mut state, pool_id);
        } else {
            info!("Countdown expired for pool {} but quorum was lost", pool_id);
            Self::forget_if_idle(&mut state, pool_id);
        }
    }

    fn fire(&self, state: &mut CoordinatorState, pool_id: &str) -> DispatchReport {
        let params = self.resolve(state.pools.get(pool_id));
        info!(
            "Batch ready for pool {}: agents={:?} commitments={} slippage={}bps deadline+{}s",
            pool_id,
            params.participating_agents,
            params.total_commitments,
            params.slippage_bps,
            params.deadline_extension
        );

        let report = state.dispatcher.dispatch(pool_id, &params);
        if !report.all_delivered() {
            warn!(
                "{} of {} batch-ready listeners failed for pool {}",
                report.failures.len(),
                state.dispatcher.len(),
                pool_id
            );
        }

        if let Some(pool) = state.pools.get_mut(pool_id) {
            pool.last_batch_at = Some(Utc::now());
        }
        Self::clear_pool(state, pool_id);
        report
    }

    fn clear_pool(state: &mut CoordinatorState, pool_id: &str) {
        state.timers.cancel(pool_id);
        if let Some(pool) = state.pools.get_mut(pool_id) {
            pool.signals.clear();
        }
        Self::forget_if_idle(state, pool_id);
    }

    /// Drop a pool entry that holds nothing worth reporting.
    fn forget_if_idle(state: &mut CoordinatorState, pool_id: &str) {
        let idle = state.pools.get(pool_id).is_some_and(|p| p.is_idle());
        if idle && !state.timers.is_active(pool_id) {
            state.pools.remove(pool_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    type Fired = Arc<StdMutex<Vec<(String, BatchParameters)>>>;

    fn config() -> CoordinatorConfig {
        CoordinatorConfig {
            quorum_agents: 2,
            min_total_commitments: 2,
            countdown_window_ms: 30_000,
            ..Default::default()
        }
    }

    async fn coordinator_with(agents: &[&str], config: CoordinatorConfig) -> (ReadinessCoordinator, Fired) {
        let coordinator = ReadinessCoordinator::new(config);
        for agent in agents {
            coordinator.register_agent(*agent).await;
        }
        let fired: Fired = Arc::new(StdMutex::new(Vec::new()));
        let sink = fired.clone();
        coordinator
            .on_batch_ready(move |pool_id: &str, params: &BatchParameters| -> anyhow::Result<()> {
                sink.lock().unwrap().push((pool_id.to_string(), params.clone()));
                Ok(())
            })
            .await;
        (coordinator, fired)
    }

    fn fired_count(fired: &Fired) -> usize {
        fired.lock().unwrap().len()
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_fires_with_straggler_missing() {
        let (coordinator, fired) = coordinator_with(&["A", "B", "C"], config()).await;

        coordinator.signal_ready(ReadinessSignal::ready("A", "pool", 1)).await;
        assert!(!coordinator.pool_state("pool").await.countdown_active);

        coordinator.signal_ready(ReadinessSignal::ready("B", "pool", 1)).await;
        let snapshot = coordinator.pool_state("pool").await;
        assert!(snapshot.quorum_met);
        assert!(snapshot.countdown_active);
        assert_eq!(snapshot.countdown_remaining_ms, Some(30_000));

        tokio::time::sleep(Duration::from_millis(29_999)).await;
        assert_eq!(fired_count(&fired), 0);

        tokio::time::sleep(Duration::from_millis(2)).await;
        let events = fired.lock().unwrap().clone();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "pool");
        assert_eq!(events[0].1.participating_agents, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(events[0].1.total_commitments, 2);

        let after = coordinator.pool_state("pool").await;
        assert!(after.ready_agents.is_empty());
        assert!(!after.countdown_active);
        assert!(after.last_batch_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_agents_ready_fires_immediately_once() {
        let (coordinator, fired) = coordinator_with(&["A", "B", "C"], config()).await;

        coordinator.signal_ready(ReadinessSignal::ready("A", "pool", 1)).await;
        coordinator.signal_ready(ReadinessSignal::ready("B", "pool", 1)).await;
        assert!(coordinator.pool_state("pool").await.countdown_active);

        coordinator.signal_ready(ReadinessSignal::ready("C", "pool", 1)).await;
        assert_eq!(fired_count(&fired), 1);
        assert!(!coordinator.pool_state("pool").await.countdown_active);

        // The cancelled countdown must not fire a second time
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(fired_count(&fired), 1);
        assert_eq!(fired.lock().unwrap()[0].1.total_commitments, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quorum_without_commitments_does_not_start_countdown() {
        let (coordinator, fired) = coordinator_with(&["A", "B", "C"], config()).await;

        coordinator.signal_ready(ReadinessSignal::ready("A", "pool", 1)).await;
        coordinator.signal_ready(ReadinessSignal::ready("B", "pool", 0)).await;

        let snapshot = coordinator.pool_state("pool").await;
        assert!(!snapshot.quorum_met);
        assert!(!snapshot.countdown_active);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(fired_count(&fired), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_commitments_without_quorum_do_not_start_countdown() {
        let (coordinator, _fired) = coordinator_with(&["A", "B", "C"], config()).await;

        coordinator.signal_ready(ReadinessSignal::ready("A", "pool", 10)).await;

        let snapshot = coordinator.pool_state("pool").await;
        assert!(!snapshot.quorum_met);
        assert!(!snapshot.countdown_active);
        assert_eq!(snapshot.total_pending_commitments, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_withdraw_cancels_countdown() {
        let (coordinator, fired) = coordinator_with(&["A", "B", "C"], config()).await;

        coordinator.signal_ready(ReadinessSignal::ready("A", "pool", 1)).await;
        coordinator.signal_ready(ReadinessSignal::ready("B", "pool", 1)).await;
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(coordinator.withdraw_ready("B", "pool").await);
        assert!(!coordinator.pool_state("pool").await.countdown_active);
        assert!(!coordinator.withdraw_ready("B", "pool").await);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(fired_count(&fired), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_ready_signal_acts_as_withdraw() {
        let (coordinator, _fired) = coordinator_with(&["A", "B", "C"], config()).await;

        coordinator.signal_ready(ReadinessSignal::ready("A", "pool", 1)).await;
        coordinator.signal_ready(ReadinessSignal::ready("B", "pool", 1)).await;

        let mut not_ready = ReadinessSignal::ready("A", "pool", 0);
        not_ready.ready = false;
        coordinator.signal_ready(not_ready).await;

        let snapshot = coordinator.pool_state("pool").await;
        assert_eq!(snapshot.ready_agents, vec!["B".to_string()]);
        assert!(!snapshot.countdown_active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_signal_replaces_older() {
        let (coordinator, _fired) = coordinator_with(&["A", "B", "C"], config()).await;

        coordinator.signal_ready(ReadinessSignal::ready("A", "pool", 1)).await;
        coordinator.signal_ready(ReadinessSignal::ready("A", "pool", 4)).await;

        let snapshot = coordinator.pool_state("pool").await;
        assert_eq!(snapshot.ready_agents, vec!["A".to_string()]);
        assert_eq!(snapshot.total_pending_commitments, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unregistered_agent_is_ignored() {
        let (coordinator, _fired) = coordinator_with(&["A", "B"], config()).await;

        assert!(!coordinator.signal_ready(ReadinessSignal::ready("mallory", "pool", 5)).await);
        assert!(coordinator.pool_state("pool").await.ready_agents.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_signal_excluded_and_purged() {
        let (coordinator, fired) = coordinator_with(&["A", "B", "C"], config()).await;

        let old = Utc::now() - ChronoDuration::seconds(600);
        coordinator
            .signal_ready(ReadinessSignal::ready("A", "pool", 1).with_timestamp(old))
            .await;
        coordinator.signal_ready(ReadinessSignal::ready("B", "pool", 1)).await;

        let snapshot = coordinator.pool_state("pool").await;
        assert_eq!(snapshot.ready_agents, vec!["B".to_string()]);
        assert!(!snapshot.countdown_active);
        assert_eq!(fired_count(&fired), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unregister_drops_signals_and_cancels_countdown() {
        let (coordinator, fired) = coordinator_with(&["A", "B", "C", "D"], config()).await;

        coordinator.signal_ready(ReadinessSignal::ready("A", "pool", 1)).await;
        coordinator.signal_ready(ReadinessSignal::ready("B", "pool", 1)).await;
        assert!(coordinator.pool_state("pool").await.countdown_active);

        coordinator.unregister_agent("B").await;
        let snapshot = coordinator.pool_state("pool").await;
        assert_eq!(snapshot.ready_agents, vec!["A".to_string()]);
        assert!(!snapshot.countdown_active);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(fired_count(&fired), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unregister_can_complete_ready_set() {
        let (coordinator, fired) = coordinator_with(&["A", "B", "C"], config()).await;

        coordinator.signal_ready(ReadinessSignal::ready("A", "pool", 1)).await;
        coordinator.signal_ready(ReadinessSignal::ready("B", "pool", 1)).await;
        assert_eq!(fired_count(&fired), 0);

        // With C gone, everyone left is ready
        coordinator.unregister_agent("C").await;
        assert_eq!(fired_count(&fired), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_listener_does_not_block_reset() {
        let (coordinator, fired) = coordinator_with(&["A", "B"], config()).await;
        coordinator
            .on_batch_ready(|_: &str, _: &BatchParameters| -> anyhow::Result<()> {
                Err(anyhow::anyhow!("downstream unavailable"))
            })
            .await;

        coordinator.signal_ready(ReadinessSignal::ready("A", "pool", 1)).await;
        coordinator.signal_ready(ReadinessSignal::ready("B", "pool", 1)).await;

        assert_eq!(fired_count(&fired), 1);
        assert!(coordinator.pool_state("pool").await.ready_agents.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_parameters_uses_strategy_and_defaults() {
        let (coordinator, _fired) = coordinator_with(&["A", "B", "C", "D", "E"], config()).await;

        for (agent, bps) in [("A", 10), ("B", 20), ("C", 30), ("D", 40)] {
            coordinator
                .signal_ready(ReadinessSignal::ready(agent, "pool", 0).with_slippage_bps(bps))
                .await;
        }
        let params = coordinator.resolve_batch_parameters("pool").await;
        assert_eq!(params.slippage_bps, 25);
        // Nobody expressed a deadline preference
        assert_eq!(params.deadline_extension, 300);
        assert_eq!(params.participating_agents.len(), 4);

        let unknown = coordinator.resolve_batch_parameters("missing").await;
        assert_eq!(unknown.slippage_bps, 50);
        assert!(unknown.participating_agents.is_empty());
        assert_eq!(unknown.total_commitments, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_pool_cancels_countdown() {
        let (coordinator, fired) = coordinator_with(&["A", "B", "C"], config()).await;

        coordinator.signal_ready(ReadinessSignal::ready("A", "pool", 1)).await;
        coordinator.signal_ready(ReadinessSignal::ready("B", "pool", 1)).await;
        coordinator.reset_pool("pool").await;

        let snapshot = coordinator.pool_state("pool").await;
        assert!(snapshot.ready_agents.is_empty());
        assert!(!snapshot.countdown_active);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(fired_count(&fired), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bus_messages_drive_coordinator() {
        let coordinator = ReadinessCoordinator::new(config());
        coordinator
            .apply_message(ReadinessMessage::Register { agent_id: "A".into() })
            .await;
        coordinator
            .apply_message(ReadinessMessage::Ready(ReadinessSignal::ready("A", "pool", 2)))
            .await;
        assert_eq!(coordinator.pool_state("pool").await.ready_agents, vec!["A".to_string()]);

        coordinator
            .apply_message(ReadinessMessage::Withdraw {
                agent_id: "A".into(),
                pool_id: "pool".into(),
            })
            .await;
        assert!(coordinator.pool_state("pool").await.ready_agents.is_empty());
        assert_eq!(coordinator.registered_agents().await, vec!["A".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_pools_are_forgotten() {
        let (coordinator, _fired) = coordinator_with(&["A", "B", "C"], config()).await;
        let tracked = |c: &ReadinessCoordinator| {
            let c = c.clone();
            async move { c.inner.state.lock().await.pools.len() }
        };

        coordinator.signal_ready(ReadinessSignal::ready("A", "0xtypo", 1)).await;
        coordinator.signal_ready(ReadinessSignal::ready("A", "0xjunk", 1)).await;
        assert_eq!(tracked(&coordinator).await, 2);

        assert!(coordinator.withdraw_ready("A", "0xtypo").await);
        coordinator.reset_pool("0xjunk").await;
        assert_eq!(tracked(&coordinator).await, 0);

        // A fired pool keeps its last batch time through a reset
        coordinator.signal_ready(ReadinessSignal::ready("A", "0xpool", 1)).await;
        coordinator.signal_ready(ReadinessSignal::ready("B", "0xpool", 1)).await;
        coordinator.signal_ready(ReadinessSignal::ready("C", "0xpool", 1)).await;
        coordinator.signal_ready(ReadinessSignal::ready("A", "0xother", 1)).await;
        coordinator.reset_all().await;

        assert_eq!(tracked(&coordinator).await, 1);
        assert!(coordinator.pool_state("0xpool").await.last_batch_at.is_some());
    }
}
