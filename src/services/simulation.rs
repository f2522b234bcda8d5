//! Dry-run simulation
//!
//! Runs the whole pipeline against the in-memory settlement backend: a set of
//! agents commit intents, disclose them to the reveal store and signal ready.
//! Once every registered agent is ready the coordinator fires, the pipeline
//! executes the batch and the simulation reports what the backend saw.

use chrono::Utc;
use ethers::types::{Address, U256};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::adapters::{ExecutedBatch, SimulatedSettlement};
use crate::config::AppConfig;
use crate::coordinator::ReadinessCoordinator;
use crate::domain::{Commitment, PoolKey, ReadinessSignal, TradeIntent};
use crate::error::Result;
use crate::execution::{BatchExecutionEngine, EngineStats};
use crate::reveal::RevealStore;
use crate::settlement::SettlementClient;

use super::pipeline::BatchPipeline;

#[derive(Debug, Clone)]
pub struct SimulationOptions {
    pub agents: usize,
    pub intents_per_agent: usize,
    /// Zero every configured delay
    pub fast: bool,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            agents: 3,
            intents_per_agent: 2,
            fast: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub pool_id: String,
    pub commitments: usize,
    pub stats: EngineStats,
    pub batches: Vec<ExecutedBatch>,
}

/// Pool used when the configuration lists none
pub fn demo_pool_key() -> PoolKey {
    PoolKey {
        currency0: Address::from_low_u64_be(0xa0),
        currency1: Address::from_low_u64_be(0xb0),
        fee: 3000,
        tick_spacing: 60,
        hooks: Address::zero(),
    }
}

fn demo_intent(pool_key: &PoolKey, agent: usize, index: usize, deadline: u64) -> TradeIntent {
    let user = Address::from_low_u64_be(0x1000 + agent as u64);
    let (token_in, token_out) = if index % 2 == 0 {
        (pool_key.currency0, pool_key.currency1)
    } else {
        (pool_key.currency1, pool_key.currency0)
    };
    TradeIntent {
        user,
        token_in,
        token_out,
        recipient: user,
        amount_in: 1_000_000 * (index as i128 + 1),
        min_amount_out: 990_000 * (index as i128 + 1),
        deadline,
        nonce: U256::from(agent * 1_000 + index),
    }
}

pub async fn run_simulation(
    config: &AppConfig,
    options: &SimulationOptions,
) -> Result<SimulationReport> {
    let mut config = config.clone();
    if options.fast {
        config.coordinator.countdown_window_ms = 1;
        config.reveals.submission_spacing_ms = 0;
        config.execution.settle_delay_ms = 0;
        config.execution.retry_base_delay_ms = 0;
    }

    let pool_key = config
        .pools
        .first()
        .map(|p| p.pool_key)
        .unwrap_or_else(demo_pool_key);
    let pool_id = pool_key.pool_id();

    let settlement =
        SimulatedSettlement::with_min_commitments(config.execution.default_min_commitments);
    let client: Arc<dyn SettlementClient> = Arc::new(settlement.clone());
    let reveals = Arc::new(RevealStore::new(
        client.clone(),
        config.reveals.submission_spacing(),
    ));
    let engine =
        BatchExecutionEngine::new(client.clone(), reveals.clone(), config.execution.clone());
    engine.add_pool(pool_key, pool_id.clone()).await;

    let coordinator = ReadinessCoordinator::new(config.coordinator.clone());
    let pipeline = BatchPipeline::new(coordinator.clone(), engine.clone(), false).await;

    let agents: Vec<String> = (0..options.agents).map(|i| format!("agent-{}", i + 1)).collect();
    for agent in &agents {
        coordinator.register_agent(agent.clone()).await;
    }

    info!(
        "Simulating {} agents x {} intents on pool {}",
        options.agents, options.intents_per_agent, pool_id
    );

    let deadline = (Utc::now().timestamp() + 3_600) as u64;
    let mut commitments = 0;
    for (agent_index, agent) in agents.iter().enumerate() {
        let agent_commitments: Vec<Commitment> = (0..options.intents_per_agent)
            .map(|i| {
                Commitment::new(
                    demo_intent(&pool_key, agent_index, i, deadline),
                    pool_id.clone(),
                )
            })
            .collect();

        for commitment in &agent_commitments {
            client.submit_commitment(&pool_key, commitment.hash).await?;
        }
        reveals
            .collect_from_commitments(&agent_commitments, &pool_key, false)
            .await;
        commitments += agent_commitments.len();

        coordinator
            .signal_ready(ReadinessSignal::ready(
                agent.clone(),
                pool_id.clone(),
                agent_commitments.len() as u32,
            ))
            .await;
    }

    // A short-handed run waits out the countdown instead of firing at once
    while coordinator.pool_state(&pool_id).await.countdown_active {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    pipeline.drain().await;

    Ok(SimulationReport {
        pool_id,
        commitments,
        stats: engine.stats().await,
        batches: settlement.executed_batches().await,
    })
}
