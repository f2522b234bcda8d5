//! Batch Execution Engine
//!
//! Drives one pool's batch from pending reveals to an executed settlement
//! transaction:
//!   1. submit pending reveals through the reveal store
//!   2. wait the settle delay
//!   3. read the pool's submitted hashes (none: recorded as a failed result)
//!   4. gather cached proofs when executing with proofs
//!   5. call the backend under the retry policy
//!   6. success: drop executed reveals and proofs
//!   7. failure: leave local state for a later attempt
//!
//! Every `execute_batch` call appends exactly one result to the history.
//! The coordinator's batch-ready event and the readiness poller both end up
//! here; executions are serialised engine-wide.

use chrono::{DateTime, Utc};
use ethers::types::H256;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::{BatchExecutionResult, PoolId, PoolKey, Proof};
use crate::error::{Result, SealError};
use crate::reveal::RevealStore;
use crate::settlement::{SettlementClient, SettlementResult};

use super::config::ExecutionConfig;
use super::proofs::ProofCache;
use super::retry::RetryPolicy;

/// Combined local and backend view of whether a pool's batch can run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReadinessCheck {
    /// Backend executability flag
    pub can_exec: bool,
    /// Backend pending commitment count
    pub pending_on_chain: u64,
    /// Local reveals already submitted for this pool
    pub reveals_ready: usize,
    /// Backend minimum, or the configured default when unavailable
    pub min_commitments: u64,
    pub meets_minimum: bool,
}

impl BatchReadinessCheck {
    pub fn should_execute(&self) -> bool {
        self.can_exec && self.meets_minimum
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStats {
    pub total_executions: usize,
    pub successful: usize,
    pub failed: usize,
    /// Reveals carried by successful batches
    pub total_reveals_executed: u64,
    pub total_cost: u64,
    /// successful / total_executions, 4 decimal places
    pub success_rate: Decimal,
    pub last_execution_at: Option<DateTime<Utc>>,
}

struct Poller {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

struct EngineInner {
    client: Arc<dyn SettlementClient>,
    reveals: Arc<RevealStore>,
    config: ExecutionConfig,
    retry: RetryPolicy,
    proofs: ProofCache,
    pools: RwLock<HashMap<PoolId, PoolKey>>,
    history: RwLock<Vec<BatchExecutionResult>>,
    execution_lock: Mutex<()>,
    poller: Mutex<Option<Poller>>,
}

#[derive(Clone)]
pub struct BatchExecutionEngine {
    inner: Arc<EngineInner>,
}

impl BatchExecutionEngine {
    pub fn new(
        client: Arc<dyn SettlementClient>,
        reveals: Arc<RevealStore>,
        config: ExecutionConfig,
    ) -> Self {
        let retry = RetryPolicy::new(config.max_retries, config.retry_base_delay());
        Self {
            inner: Arc::new(EngineInner {
                client,
                reveals,
                config,
                retry,
                proofs: ProofCache::new(),
                pools: RwLock::new(HashMap::new()),
                history: RwLock::new(Vec::new()),
                execution_lock: Mutex::new(()),
                poller: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.inner.config
    }

    pub fn reveals(&self) -> &Arc<RevealStore> {
        &self.inner.reveals
    }

    pub fn proofs(&self) -> &ProofCache {
        &self.inner.proofs
    }

    // ==================== Pools ====================

    pub async fn add_pool(&self, pool_key: PoolKey, pool_id: impl Into<PoolId>) {
        let pool_id = pool_id.into();
        info!("Monitoring pool {}", pool_id);
        self.inner.pools.write().await.insert(pool_id, pool_key);
    }

    pub async fn remove_pool(&self, pool_id: &str) -> bool {
        let removed = self.inner.pools.write().await.remove(pool_id).is_some();
        if removed {
            info!("Stopped monitoring pool {}", pool_id);
        }
        removed
    }

    pub async fn pool_key(&self, pool_id: &str) -> Option<PoolKey> {
        self.inner.pools.read().await.get(pool_id).copied()
    }

    /// Monitored pools, sorted by pool id
    pub async fn monitored_pools(&self) -> Vec<(PoolId, PoolKey)> {
        let mut pools: Vec<(PoolId, PoolKey)> = self
            .inner
            .pools
            .read()
            .await
            .iter()
            .map(|(id, key)| (id.clone(), *key))
            .collect();
        pools.sort_by(|a, b| a.0.cmp(&b.0));
        pools
    }

    pub fn cache_proof(&self, commitment_hash: H256, proof: Proof) {
        self.inner.proofs.insert(commitment_hash, proof);
    }

    // ==================== Readiness ====================

    /// Query the backend and the reveal store for a monitored pool.
    pub async fn check_batch_readiness(&self, pool_id: &str) -> Result<BatchReadinessCheck> {
        let pool_key = self
            .pool_key(pool_id)
            .await
            .ok_or_else(|| SealError::UnknownPool(pool_id.to_string()))?;
        self.check_batch_readiness_for(pool_id, &pool_key).await
    }

    async fn check_batch_readiness_for(
        &self,
        pool_id: &str,
        pool_key: &PoolKey,
    ) -> Result<BatchReadinessCheck> {
        let client = &self.inner.client;

        let readiness = client.check_batch_ready(pool_key).await?;
        let pending_on_chain = client.pending_commitment_count(pool_key).await?;
        let min_commitments = match client.min_commitments(pool_key).await {
            Ok(min) => min,
            Err(e) => {
                let fallback = self.inner.config.default_min_commitments;
                warn!(
                    "min_commitments unavailable for pool {} ({}), using default {}",
                    pool_id, e, fallback
                );
                fallback
            }
        };
        let reveals_ready = self
            .inner
            .reveals
            .submitted_hashes_for_pool(pool_id)
            .await
            .len();

        Ok(BatchReadinessCheck {
            can_exec: readiness.executable,
            pending_on_chain,
            reveals_ready,
            min_commitments,
            meets_minimum: pending_on_chain >= min_commitments,
        })
    }

    // ==================== Execution ====================

    /// Execute the batch of a monitored pool.
    pub async fn execute_monitored(
        &self,
        pool_id: &str,
        with_proofs: bool,
    ) -> Result<BatchExecutionResult> {
        let pool_key = self
            .pool_key(pool_id)
            .await
            .ok_or_else(|| SealError::UnknownPool(pool_id.to_string()))?;
        Ok(self.execute_batch(pool_id, &pool_key, with_proofs).await)
    }

    /// Run the full reveal-then-execute sequence for one pool.
    ///
    /// Never fails: every outcome is returned as a result record and
    /// appended to the history.
    #[instrument(skip(self, pool_key))]
    pub async fn execute_batch(
        &self,
        pool_id: &str,
        pool_key: &PoolKey,
        with_proofs: bool,
    ) -> BatchExecutionResult {
        let _guard = self.inner.execution_lock.lock().await;

        let result = self.run_batch(pool_id, pool_key, with_proofs).await;
        if result.success {
            info!(
                "Batch for pool {} executed: {} reveals in {} ({} attempts)",
                pool_id,
                result.batch_size,
                result.transaction_ref.as_deref().unwrap_or("-"),
                result.attempts
            );
        } else {
            warn!(
                "Batch for pool {} not executed: {}",
                pool_id,
                result.error.as_deref().unwrap_or("unknown error")
            );
        }

        self.inner.history.write().await.push(result.clone());
        result
    }

    async fn run_batch(
        &self,
        pool_id: &str,
        pool_key: &PoolKey,
        with_proofs: bool,
    ) -> BatchExecutionResult {
        let reveals = &self.inner.reveals;

        let submissions = reveals.submit_all_reveals().await;
        let not_submitted = submissions.iter().filter(|s| !s.is_submitted()).count();
        if not_submitted > 0 {
            warn!(
                "{} of {} reveals were not submitted before batching pool {}",
                not_submitted,
                submissions.len(),
                pool_id
            );
        }

        tokio::time::sleep(self.inner.config.settle_delay()).await;

        let hashes = reveals.submitted_hashes_for_pool(pool_id).await;
        if hashes.is_empty() {
            return BatchExecutionResult::failed(pool_id, 0, "no submitted reveals", 0);
        }
        let batch_size = hashes.len() as u32;

        let proofs = if with_proofs {
            match self.inner.proofs.collect(&hashes) {
                Ok(proofs) => Some(proofs),
                Err(missing) => {
                    error!("Missing proof for commitment {:?} in pool {}", missing, pool_id);
                    return BatchExecutionResult::failed(
                        pool_id,
                        batch_size,
                        format!("missing proof for commitment {:?}", missing),
                        0,
                    );
                }
            }
        } else {
            None
        };

        debug!("Executing batch of {} for pool {}", batch_size, pool_id);
        let client = &self.inner.client;
        let hashes_ref = hashes.as_slice();
        let proofs_ref = proofs.as_deref();
        let retried = self
            .inner
            .retry
            .run("executeBatch", move |_| async move {
                execute_on(client.as_ref(), pool_key, hashes_ref, proofs_ref).await
            })
            .await;

        match retried.result {
            Ok(receipt) => {
                reveals.clear_executed_reveals(&hashes).await;
                self.inner.proofs.remove_all(&hashes);
                BatchExecutionResult::succeeded(
                    pool_id,
                    receipt.tx_ref,
                    batch_size,
                    receipt.cost,
                    retried.attempts,
                )
            }
            Err(e) => {
                BatchExecutionResult::failed(pool_id, batch_size, e.to_string(), retried.attempts)
            }
        }
    }

    // ==================== Polling ====================

    /// Start polling every monitored pool. Returns false if already running.
    pub async fn start_polling(&self, interval: Duration, with_proofs: bool) -> bool {
        let mut poller = self.inner.poller.lock().await;
        if poller.as_ref().is_some_and(|p| !p.handle.is_finished()) {
            debug!("Polling already running");
            return false;
        }

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let engine = self.clone();
        let handle = tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let stop = stop_rx.clone();

            loop {
                if *stop_rx.borrow() {
                    break;
                }
                tokio::select! {
                    biased;
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                    _ = tick.tick() => {
                        engine.poll_pools(with_proofs, || *stop.borrow()).await;
                    }
                }
            }
            info!("Readiness polling stopped");
        });

        info!("Readiness polling started (every {:?})", interval);
        *poller = Some(Poller { stop_tx, handle });
        true
    }

    /// Ask the poller to stop after its current cycle.
    ///
    /// An execution already in flight completes. The returned handle can be
    /// awaited to wait for it; `None` when polling was not running.
    pub async fn stop_polling(&self) -> Option<JoinHandle<()>> {
        let poller = self.inner.poller.lock().await.take()?;
        let _ = poller.stop_tx.send(true);
        Some(poller.handle)
    }

    pub async fn is_polling(&self) -> bool {
        self.inner
            .poller
            .lock()
            .await
            .as_ref()
            .is_some_and(|p| !p.handle.is_finished())
    }

    /// One polling cycle over all monitored pools.
    pub async fn poll_once(&self, with_proofs: bool) {
        self.poll_pools(with_proofs, || false).await;
    }

    /// Poll each monitored pool until `stopped` reports true.
    async fn poll_pools<F>(&self, with_proofs: bool, stopped: F)
    where
        F: Fn() -> bool,
    {
        for (pool_id, pool_key) in self.monitored_pools().await {
            if stopped() {
                debug!("Polling stopped, skipping remaining pools");
                return;
            }
            let check = match self.check_batch_readiness_for(&pool_id, &pool_key).await {
                Ok(check) => check,
                Err(e) => {
                    warn!("Readiness check failed for pool {}: {}", pool_id, e);
                    continue;
                }
            };

            debug!(
                "Pool {}: can_exec={} pending={} min={} reveals_ready={}",
                pool_id,
                check.can_exec,
                check.pending_on_chain,
                check.min_commitments,
                check.reveals_ready
            );

            if check.should_execute() && !stopped() {
                self.execute_batch(&pool_id, &pool_key, with_proofs).await;
            }
        }
    }

    // ==================== History ====================

    pub async fn history(&self) -> Vec<BatchExecutionResult> {
        self.inner.history.read().await.clone()
    }

    pub async fn stats(&self) -> EngineStats {
        let history = self.inner.history.read().await;

        let total_executions = history.len();
        let successes: Vec<&BatchExecutionResult> = history.iter().filter(|r| r.success).collect();
        let successful = successes.len();
        let success_rate = if total_executions == 0 {
            Decimal::ZERO
        } else {
            (Decimal::from(successful as u64) / Decimal::from(total_executions as u64)).round_dp(4)
        };

        EngineStats {
            total_executions,
            successful,
            failed: total_executions - successful,
            total_reveals_executed: successes.iter().map(|r| r.batch_size as u64).sum(),
            total_cost: history.iter().filter_map(|r| r.cost).sum(),
            success_rate,
            last_execution_at: history.last().map(|r| r.executed_at),
        }
    }
}

async fn execute_on(
    client: &dyn SettlementClient,
    pool_key: &PoolKey,
    hashes: &[H256],
    proofs: Option<&[Proof]>,
) -> SettlementResult<crate::settlement::BatchReceipt> {
    match proofs {
        Some(proofs) => client.execute_batch_with_proofs(pool_key, hashes, proofs).await,
        None => client.execute_batch(pool_key, hashes).await,
    }
}
