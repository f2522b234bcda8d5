//! End-to-end batch pipeline tests against the in-memory settlement backend

use ethers::types::{Address, U256};
use futures::future::join_all;
use sealbatch::adapters::{SimOp, SimulatedSettlement};
use sealbatch::config::AppConfig;
use sealbatch::coordinator::{CoordinatorConfig, ReadinessCoordinator};
use sealbatch::domain::{
    BatchParameters, Commitment, PoolKey, ReadinessMessage, ReadinessSignal, TradeIntent,
};
use sealbatch::error::SettlementError;
use sealbatch::execution::{BatchExecutionEngine, ExecutionConfig};
use sealbatch::reveal::RevealStore;
use sealbatch::services::{
    run_simulation, spawn_signal_listener, BatchPipeline, SimulationOptions,
};
use sealbatch::settlement::SettlementClient;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_test::assert_ok;

struct Harness {
    settlement: SimulatedSettlement,
    reveals: Arc<RevealStore>,
    engine: BatchExecutionEngine,
    coordinator: ReadinessCoordinator,
    pipeline: BatchPipeline,
    pool_key: PoolKey,
    pool_id: String,
    fired: Arc<Mutex<Vec<BatchParameters>>>,
}

fn pool_key() -> PoolKey {
    PoolKey {
        currency0: Address::from_low_u64_be(0xa0),
        currency1: Address::from_low_u64_be(0xb0),
        fee: 3000,
        tick_spacing: 60,
        hooks: Address::zero(),
    }
}

fn far_deadline() -> u64 {
    (chrono::Utc::now().timestamp() + 3_600) as u64
}

fn intent(pool_key: &PoolKey, user: u64, nonce: u64) -> TradeIntent {
    let user = Address::from_low_u64_be(user);
    TradeIntent {
        user,
        token_in: pool_key.currency0,
        token_out: pool_key.currency1,
        recipient: user,
        amount_in: 1_000_000,
        min_amount_out: 990_000,
        deadline: far_deadline(),
        nonce: U256::from(nonce),
    }
}

async fn harness(agents: &[&str]) -> Harness {
    let settlement = SimulatedSettlement::with_min_commitments(2);
    let client: Arc<dyn SettlementClient> = Arc::new(settlement.clone());
    let reveals = Arc::new(RevealStore::new(client.clone(), Duration::from_millis(2_000)));

    let pool_key = pool_key();
    let pool_id = pool_key.pool_id();
    let engine = BatchExecutionEngine::new(client, reveals.clone(), ExecutionConfig::default());
    engine.add_pool(pool_key, pool_id.clone()).await;

    let coordinator = ReadinessCoordinator::new(CoordinatorConfig {
        quorum_agents: 2,
        min_total_commitments: 2,
        countdown_window_ms: 30_000,
        ..CoordinatorConfig::default()
    });
    for agent in agents {
        coordinator.register_agent(*agent).await;
    }

    let fired = Arc::new(Mutex::new(Vec::new()));
    let log = fired.clone();
    coordinator
        .on_batch_ready(move |_: &str, params: &BatchParameters| -> anyhow::Result<()> {
            log.lock().unwrap().push(params.clone());
            Ok(())
        })
        .await;

    let pipeline = BatchPipeline::new(coordinator.clone(), engine.clone(), false).await;

    Harness {
        settlement,
        reveals,
        engine,
        coordinator,
        pipeline,
        pool_key,
        pool_id,
        fired,
    }
}

impl Harness {
    /// Commit `count` intents for `agent` and disclose them to the reveal store
    async fn commit(&self, agent_index: u64, count: u64) -> Vec<Commitment> {
        let commitments: Vec<Commitment> = (0..count)
            .map(|n| {
                Commitment::new(
                    intent(&self.pool_key, 0x1000 + agent_index, agent_index * 100 + n),
                    self.pool_id.clone(),
                )
            })
            .collect();
        for c in &commitments {
            assert_ok!(self.settlement.submit_commitment(&self.pool_key, c.hash).await);
        }
        self.reveals
            .collect_from_commitments(&commitments, &self.pool_key, false)
            .await;
        commitments
    }

    async fn ready(&self, agent: &str, pending: u32) {
        assert!(
            self.coordinator
                .signal_ready(ReadinessSignal::ready(agent, self.pool_id.clone(), pending))
                .await
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_straggler_countdown_fires_and_executes_batch() {
    let h = harness(&["A", "B", "C"]).await;

    let a = h.commit(1, 1).await;
    let b = h.commit(2, 1).await;

    h.ready("A", 1).await;
    assert!(!h.coordinator.pool_state(&h.pool_id).await.countdown_active);

    h.ready("B", 1).await;
    assert!(h.coordinator.pool_state(&h.pool_id).await.countdown_active);

    tokio::time::sleep(Duration::from_millis(29_000)).await;
    assert!(h.fired.lock().unwrap().is_empty());

    tokio::time::sleep(Duration::from_millis(2_000)).await;
    {
        let fired = h.fired.lock().unwrap();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].participating_agents, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(fired[0].total_commitments, 2);
    }

    h.pipeline.drain().await;

    let batches = h.settlement.executed_batches().await;
    assert_eq!(batches.len(), 1);
    let mut executed = batches[0].commitment_hashes.clone();
    executed.sort();
    let mut expected = vec![a[0].hash, b[0].hash];
    expected.sort();
    assert_eq!(executed, expected);

    let history = h.engine.history().await;
    assert_eq!(history.len(), 1);
    assert!(history[0].success);
    assert_eq!(history[0].batch_size, 2);
    assert!(h.reveals.is_empty().await);

    let state = h.coordinator.pool_state(&h.pool_id).await;
    assert!(state.ready_agents.is_empty());
    assert!(!state.countdown_active);
}

#[tokio::test(start_paused = true)]
async fn test_all_agents_ready_fires_once_without_waiting() {
    let h = harness(&["A", "B", "C"]).await;
    for i in 1..=3 {
        h.commit(i, 1).await;
    }

    h.ready("A", 1).await;
    h.ready("B", 1).await;
    h.ready("C", 1).await;

    assert_eq!(h.fired.lock().unwrap().len(), 1);
    assert!(!h.coordinator.pool_state(&h.pool_id).await.countdown_active);

    h.pipeline.drain().await;

    // Nothing left to fire once the countdown window would have elapsed
    tokio::time::sleep(Duration::from_millis(31_000)).await;
    assert_eq!(h.fired.lock().unwrap().len(), 1);
    assert_eq!(h.settlement.executed_batches().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_transient_settlement_failure_is_retried_through_pipeline() {
    let h = harness(&["A", "B"]).await;
    h.commit(1, 1).await;
    h.commit(2, 1).await;
    h.settlement
        .fail_next(
            SimOp::ExecuteBatch,
            SettlementError::NonceConflict("nonce too low".into()),
        )
        .await;

    h.ready("A", 1).await;
    h.ready("B", 1).await;
    h.pipeline.drain().await;

    let history = h.engine.history().await;
    assert_eq!(history.len(), 1);
    assert!(history[0].success);
    assert_eq!(history[0].attempts, 2);
    assert_eq!(h.settlement.call_count(SimOp::ExecuteBatch).await, 2);
}

#[tokio::test(start_paused = true)]
async fn test_permanent_rejection_is_reported_without_retry() {
    let h = harness(&["A", "B"]).await;
    h.commit(1, 1).await;
    h.commit(2, 1).await;
    h.settlement
        .fail_next(
            SimOp::ExecuteBatch,
            SettlementError::BatchConditionsNotMet("paused".into()),
        )
        .await;

    h.ready("A", 1).await;
    h.ready("B", 1).await;
    h.pipeline.drain().await;

    let stats = h.engine.stats().await;
    assert_eq!(stats.total_executions, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(h.settlement.call_count(SimOp::ExecuteBatch).await, 1);
    // Reveals stay for the next attempt
    assert_eq!(h.reveals.len().await, 2);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_signals_fire_a_single_batch() {
    let agents = ["A", "B", "C", "D"];
    let h = harness(&agents).await;
    for i in 1..=agents.len() as u64 {
        h.commit(i, 1).await;
    }

    join_all(agents.iter().map(|agent| h.ready(agent, 1))).await;
    h.pipeline.drain().await;

    assert_eq!(h.fired.lock().unwrap().len(), 1);
    assert_eq!(h.settlement.executed_batches().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_bus_messages_drive_the_coordinator() {
    let h = harness(&["A", "B"]).await;
    h.commit(1, 1).await;
    h.commit(2, 1).await;

    let (bus, _) = broadcast::channel(16);
    let listener = spawn_signal_listener(h.coordinator.clone(), bus.subscribe());

    bus.send(ReadinessMessage::Ready(ReadinessSignal::ready("A", h.pool_id.clone(), 1)))
        .unwrap();
    bus.send(ReadinessMessage::Ready(ReadinessSignal::ready("B", h.pool_id.clone(), 1)))
        .unwrap();
    drop(bus);
    listener.await.unwrap();

    h.pipeline.drain().await;
    assert_eq!(h.fired.lock().unwrap().len(), 1);
    assert!(h.engine.history().await[0].success);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_pending_countdown() {
    let h = harness(&["A", "B", "C"]).await;
    h.commit(1, 1).await;
    h.commit(2, 1).await;
    h.ready("A", 1).await;
    h.ready("B", 1).await;
    assert!(h.coordinator.pool_state(&h.pool_id).await.countdown_active);

    h.pipeline.shutdown().await;
    tokio::time::sleep(Duration::from_millis(31_000)).await;

    assert!(h.fired.lock().unwrap().is_empty());
    assert!(h.settlement.executed_batches().await.is_empty());
}

#[tokio::test]
async fn test_fast_simulation_executes_every_commitment() {
    let options = SimulationOptions {
        agents: 3,
        intents_per_agent: 2,
        fast: true,
    };
    let report = run_simulation(&AppConfig::default(), &options).await.unwrap();

    assert_eq!(report.commitments, 6);
    assert!(report.stats.successful >= 1);
    let executed: usize = report
        .batches
        .iter()
        .map(|b| b.commitment_hashes.len())
        .sum();
    assert!(executed >= 2);
    assert_eq!(report.stats.total_reveals_executed as usize, executed);
}

#[tokio::test(start_paused = true)]
async fn test_simulation_with_single_agent_never_fires() {
    let options = SimulationOptions {
        agents: 1,
        intents_per_agent: 2,
        fast: false,
    };
    let report = run_simulation(&AppConfig::default(), &options).await.unwrap();

    assert_eq!(report.commitments, 2);
    assert_eq!(report.stats.total_executions, 0);
    assert!(report.batches.is_empty());
}
