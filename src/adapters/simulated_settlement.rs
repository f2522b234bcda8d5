//! In-memory settlement backend.
//!
//! Stands in for the on-chain contract in dry runs and tests. It keeps its own
//! ledger of commitments, reveals and executed batches per pool and enforces a
//! small rule set of its own (minimum batch size, deadlines, hash binding,
//! double reveal), answering with the same tagged errors a real backend would.
//! Failures can be scripted per operation with [`SimulatedSettlement::fail_next`].

use async_trait::async_trait;
use chrono::Utc;
use ethers::types::{Bytes, H256};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::{PoolId, PoolKey, Proof, TradeIntent};
use crate::error::SettlementError;
use crate::settlement::{
    BatchReadiness, BatchReceipt, SettlementClient, SettlementKind, SettlementResult, TxReceipt,
};

const DEFAULT_MIN_COMMITMENTS: u64 = 2;
const BASE_BATCH_COST: u64 = 60_000;
const PER_INTENT_COST: u64 = 25_000;

/// Operations that can be counted and scripted to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimOp {
    CheckBatchReady,
    PendingCommitmentCount,
    MinCommitments,
    SubmitCommitment,
    SubmitReveal,
    ExecuteBatch,
}

/// A batch the simulator accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedBatch {
    pub pool_id: PoolId,
    pub commitment_hashes: Vec<H256>,
    pub tx_ref: String,
    pub cost: u64,
    pub with_proofs: bool,
}

#[derive(Debug, Default)]
struct SimPool {
    committed: HashSet<H256>,
    proof_committed: HashSet<H256>,
    revealed: HashMap<H256, TradeIntent>,
    executed: HashSet<H256>,
}

impl SimPool {
    fn pending(&self) -> usize {
        self.committed.difference(&self.executed).count()
    }
}

#[derive(Debug, Default)]
struct SimState {
    pools: HashMap<PoolId, SimPool>,
    batches: Vec<ExecutedBatch>,
    scripted: HashMap<SimOp, VecDeque<SettlementError>>,
    calls: HashMap<SimOp, u32>,
    next_tx: u64,
}

impl SimState {
    /// Count the call and pop a scripted failure, if any.
    fn enter(&mut self, op: SimOp) -> SettlementResult<()> {
        *self.calls.entry(op).or_insert(0) += 1;
        match self.scripted.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => {
                debug!("simulated {:?} failing with scripted error: {}", op, err);
                Err(err)
            }
            None => Ok(()),
        }
    }

    fn next_tx_ref(&mut self) -> String {
        self.next_tx += 1;
        format!("{:?}", H256::from_low_u64_be(self.next_tx))
    }
}

#[derive(Clone)]
pub struct SimulatedSettlement {
    state: Arc<Mutex<SimState>>,
    min_commitments: u64,
}

impl Default for SimulatedSettlement {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedSettlement {
    pub fn new() -> Self {
        Self::with_min_commitments(DEFAULT_MIN_COMMITMENTS)
    }

    pub fn with_min_commitments(min_commitments: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::default())),
            min_commitments,
        }
    }

    /// Make the next call of `op` fail with `err`. Repeated calls queue up.
    pub async fn fail_next(&self, op: SimOp, err: SettlementError) {
        self.state
            .lock()
            .await
            .scripted
            .entry(op)
            .or_default()
            .push_back(err);
    }

    pub async fn call_count(&self, op: SimOp) -> u32 {
        self.state.lock().await.calls.get(&op).copied().unwrap_or(0)
    }

    pub async fn executed_batches(&self) -> Vec<ExecutedBatch> {
        self.state.lock().await.batches.clone()
    }

    pub async fn is_revealed(&self, pool_key: &PoolKey, hash: H256) -> bool {
        self.state
            .lock()
            .await
            .pools
            .get(&pool_key.pool_id())
            .map(|p| p.revealed.contains_key(&hash))
            .unwrap_or(false)
    }

    async fn commit(
        &self,
        pool_key: &PoolKey,
        hash: H256,
        with_proof: bool,
    ) -> SettlementResult<TxReceipt> {
        let mut state = self.state.lock().await;
        state.enter(SimOp::SubmitCommitment)?;

        let pool = state.pools.entry(pool_key.pool_id()).or_default();
        if !pool.committed.insert(hash) {
            return Err(SettlementError::InvalidCommitment(format!(
                "commitment {:?} already exists",
                hash
            )));
        }
        if with_proof {
            pool.proof_committed.insert(hash);
        }

        Ok(TxReceipt {
            tx_ref: state.next_tx_ref(),
        })
    }

    async fn execute(
        &self,
        pool_key: &PoolKey,
        hashes: &[H256],
        proofs: Option<&[Proof]>,
    ) -> SettlementResult<BatchReceipt> {
        let mut state = self.state.lock().await;
        state.enter(SimOp::ExecuteBatch)?;

        let pool_id = pool_key.pool_id();
        let now = Utc::now().timestamp().max(0) as u64;
        let min_commitments = self.min_commitments;

        let pool = state.pools.get(&pool_id).ok_or_else(|| {
            SettlementError::BatchConditionsNotMet(format!("no commitments for pool {}", pool_id))
        })?;

        if (hashes.len() as u64) < min_commitments {
            return Err(SettlementError::InsufficientCommitments(format!(
                "batch of {} below minimum {}",
                hashes.len(),
                min_commitments
            )));
        }

        if let Some(proofs) = proofs {
            if proofs.len() != hashes.len() || proofs.iter().any(|p| p.is_empty()) {
                return Err(SettlementError::InvalidProof(format!(
                    "{} proofs for {} commitments",
                    proofs.len(),
                    hashes.len()
                )));
            }
        }

        for hash in hashes {
            if pool.executed.contains(hash) {
                return Err(SettlementError::InvalidCommitment(format!(
                    "commitment {:?} already executed",
                    hash
                )));
            }
            let intent = pool.revealed.get(hash).ok_or_else(|| {
                SettlementError::BatchConditionsNotMet(format!(
                    "commitment {:?} not revealed",
                    hash
                ))
            })?;
            if intent.deadline <= now {
                return Err(SettlementError::DeadlineExpired(format!(
                    "commitment {:?} expired at {}",
                    hash, intent.deadline
                )));
            }
        }

        let cost = BASE_BATCH_COST + PER_INTENT_COST * hashes.len() as u64;
        let tx_ref = state.next_tx_ref();
        if let Some(pool) = state.pools.get_mut(&pool_id) {
            pool.executed.extend(hashes.iter().copied());
        }
        state.batches.push(ExecutedBatch {
            pool_id,
            commitment_hashes: hashes.to_vec(),
            tx_ref: tx_ref.clone(),
            cost,
            with_proofs: proofs.is_some(),
        });

        Ok(BatchReceipt {
            tx_ref,
            cost: Some(cost),
        })
    }
}

#[async_trait]
impl SettlementClient for SimulatedSettlement {
    fn kind(&self) -> SettlementKind {
        SettlementKind::Simulated
    }

    async fn check_batch_ready(&self, pool_key: &PoolKey) -> SettlementResult<BatchReadiness> {
        let mut state = self.state.lock().await;
        state.enter(SimOp::CheckBatchReady)?;

        let pending = state
            .pools
            .get(&pool_key.pool_id())
            .map(SimPool::pending)
            .unwrap_or(0) as u64;

        Ok(BatchReadiness {
            executable: pending >= self.min_commitments,
            payload: Bytes::from(pending.to_be_bytes().to_vec()),
        })
    }

    async fn pending_commitment_count(&self, pool_key: &PoolKey) -> SettlementResult<u64> {
        let mut state = self.state.lock().await;
        state.enter(SimOp::PendingCommitmentCount)?;
        Ok(state
            .pools
            .get(&pool_key.pool_id())
            .map(SimPool::pending)
            .unwrap_or(0) as u64)
    }

    async fn min_commitments(&self, _pool_key: &PoolKey) -> SettlementResult<u64> {
        self.state.lock().await.enter(SimOp::MinCommitments)?;
        Ok(self.min_commitments)
    }

    async fn submit_commitment(
        &self,
        pool_key: &PoolKey,
        commitment_hash: H256,
    ) -> SettlementResult<TxReceipt> {
        self.commit(pool_key, commitment_hash, false).await
    }

    async fn submit_commitment_with_proof(
        &self,
        pool_key: &PoolKey,
        commitment_hash: H256,
        proof: &Proof,
    ) -> SettlementResult<TxReceipt> {
        if proof.is_empty() {
            return Err(SettlementError::InvalidProof("empty proof".to_string()));
        }
        self.commit(pool_key, commitment_hash, true).await
    }

    async fn submit_reveal(
        &self,
        pool_key: &PoolKey,
        commitment_hash: H256,
        intent: &TradeIntent,
    ) -> SettlementResult<TxReceipt> {
        let mut state = self.state.lock().await;
        state.enter(SimOp::SubmitReveal)?;

        let now = Utc::now().timestamp().max(0) as u64;
        let pool = state.pools.entry(pool_key.pool_id()).or_default();

        if !pool.committed.contains(&commitment_hash) {
            return Err(SettlementError::InvalidCommitment(format!(
                "unknown commitment {:?}",
                commitment_hash
            )));
        }
        if pool.revealed.contains_key(&commitment_hash) {
            return Err(SettlementError::AlreadyRevealed(format!(
                "{:?}",
                commitment_hash
            )));
        }
        if intent.deadline <= now {
            return Err(SettlementError::DeadlineExpired(format!(
                "deadline {} has passed",
                intent.deadline
            )));
        }
        if !pool.proof_committed.contains(&commitment_hash)
            && intent.commitment_hash() != commitment_hash
        {
            return Err(SettlementError::InvalidCommitment(format!(
                "intent does not match commitment {:?}",
                commitment_hash
            )));
        }

        pool.revealed.insert(commitment_hash, intent.clone());
        Ok(TxReceipt {
            tx_ref: state.next_tx_ref(),
        })
    }

    async fn execute_batch(
        &self,
        pool_key: &PoolKey,
        commitment_hashes: &[H256],
    ) -> SettlementResult<BatchReceipt> {
        self.execute(pool_key, commitment_hashes, None).await
    }

    async fn execute_batch_with_proofs(
        &self,
        pool_key: &PoolKey,
        commitment_hashes: &[H256],
        proofs: &[Proof],
    ) -> SettlementResult<BatchReceipt> {
        self.execute(pool_key, commitment_hashes, Some(proofs)).await
    }
}
