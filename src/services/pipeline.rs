//! Batch pipeline
//!
//! Wires the readiness coordinator to the execution engine: every batch-ready
//! event spawns an `execute_batch` for the fired pool, alongside the engine's
//! own readiness polling. Shutdown stops polling and waits for executions
//! already in flight.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::coordinator::ReadinessCoordinator;
use crate::domain::BatchParameters;
use crate::error::SealError;
use crate::execution::BatchExecutionEngine;

pub struct BatchPipeline {
    coordinator: ReadinessCoordinator,
    engine: BatchExecutionEngine,
    with_proofs: bool,
    in_flight: Arc<Mutex<JoinSet<()>>>,
}

impl BatchPipeline {
    /// Build the pipeline and register its batch-ready listener.
    pub async fn new(
        coordinator: ReadinessCoordinator,
        engine: BatchExecutionEngine,
        with_proofs: bool,
    ) -> Self {
        let in_flight = Arc::new(Mutex::new(JoinSet::new()));

        let listener_engine = engine.clone();
        let listener_tasks = in_flight.clone();
        coordinator
            .on_batch_ready(
                move |pool_id: &str, params: &BatchParameters| -> anyhow::Result<()> {
                    info!(
                        "Batch ready for pool {}: agents={:?} commitments={} slippage={}bps deadline_ext={}s",
                        pool_id,
                        params.participating_agents,
                        params.total_commitments,
                        params.slippage_bps,
                        params.deadline_extension
                    );

                    let engine = listener_engine.clone();
                    let pool_id = pool_id.to_string();
                    let mut tasks = listener_tasks
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                    // Reap finished executions
                    while tasks.try_join_next().is_some() {}
                    tasks.spawn(async move {
                        match engine.execute_monitored(&pool_id, with_proofs).await {
                            Ok(_) => {}
                            Err(SealError::UnknownPool(id)) => {
                                warn!("Batch ready for unmonitored pool {}, skipping", id)
                            }
                            Err(e) => warn!("Batch for pool {} failed: {}", pool_id, e),
                        }
                    });
                    Ok(())
                },
            )
            .await;

        Self {
            coordinator,
            engine,
            with_proofs,
            in_flight,
        }
    }

    pub fn coordinator(&self) -> &ReadinessCoordinator {
        &self.coordinator
    }

    pub fn engine(&self) -> &BatchExecutionEngine {
        &self.engine
    }

    /// Start the engine's readiness polling.
    pub async fn start(&self, poll_interval: Duration) -> bool {
        self.engine.start_polling(poll_interval, self.with_proofs).await
    }

    /// Executions spawned by batch-ready events that have not finished
    pub fn in_flight(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Wait for every event-triggered execution spawned so far.
    pub async fn drain(&self) {
        let mut tasks = std::mem::take(
            &mut *self
                .in_flight
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!("Batch execution task ended abnormally: {}", e);
            }
        }
    }

    /// Stop polling, cancel countdowns and wait for in-flight executions.
    pub async fn shutdown(&self) {
        info!("Shutting down batch pipeline");
        if let Some(poller) = self.engine.stop_polling().await {
            if let Err(e) = poller.await {
                warn!("Poller task ended abnormally: {}", e);
            }
        }
        self.coordinator.reset_all().await;
        self.drain().await;
        info!("Batch pipeline stopped");
    }
}
