//! Reveal Store
//!
//! Owns the lifecycle of disclosed trade intents: insert once, validate,
//! submit on chain one at a time, then delete once the batch that carried
//! them is confirmed. The store never retries; a failed submission stays
//! pending for the next `submit_all_reveals` pass.

use chrono::{DateTime, Utc};
use ethers::types::H256;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::domain::{Commitment, PoolId, PoolKey, RevealRecord, TradeIntent};
use crate::error::SettlementError;
use crate::settlement::SettlementClient;

use super::validation::{validate_reveal, RevealViolation, ValidationReport};

/// What happened to one record during `submit_all_reveals`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealOutcome {
    Submitted {
        tx_ref: String,
        submitted_at: DateTime<Utc>,
    },
    /// Failed local validation; nothing was sent
    Rejected { violations: Vec<RevealViolation> },
    /// The settlement backend refused or the call failed
    Failed { error: SettlementError },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealSubmission {
    pub commitment_hash: H256,
    pub pool_id: PoolId,
    pub outcome: RevealOutcome,
}

impl RevealSubmission {
    pub fn is_submitted(&self) -> bool {
        matches!(self.outcome, RevealOutcome::Submitted { .. })
    }
}

struct StoredReveal {
    seq: u64,
    record: RevealRecord,
}

#[derive(Default)]
struct RevealEntries {
    by_hash: HashMap<H256, StoredReveal>,
    next_seq: u64,
}

impl RevealEntries {
    /// Records matching `filter`, in insertion order.
    fn collect<F>(&self, filter: F) -> Vec<RevealRecord>
    where
        F: Fn(&RevealRecord) -> bool,
    {
        let mut matching: Vec<&StoredReveal> = self
            .by_hash
            .values()
            .filter(|s| filter(&s.record))
            .collect();
        matching.sort_by_key(|s| s.seq);
        matching.into_iter().map(|s| s.record.clone()).collect()
    }

    fn remove_where<F>(&mut self, filter: F) -> usize
    where
        F: Fn(&RevealRecord) -> bool,
    {
        let before = self.by_hash.len();
        self.by_hash.retain(|_, s| !filter(&s.record));
        before - self.by_hash.len()
    }
}

pub struct RevealStore {
    client: Arc<dyn SettlementClient>,
    submission_spacing: Duration,
    entries: RwLock<RevealEntries>,
    /// Serialises submission passes so transactions from the sending account never interleave
    submit_lock: Mutex<()>,
}

impl RevealStore {
    pub fn new(client: Arc<dyn SettlementClient>, submission_spacing: Duration) -> Self {
        Self {
            client,
            submission_spacing,
            entries: RwLock::new(RevealEntries::default()),
            submit_lock: Mutex::new(()),
        }
    }

    pub fn submission_spacing(&self) -> Duration {
        self.submission_spacing
    }

    // ==================== Insertion ====================

    /// Add a reveal. A hash that is already stored is left untouched.
    ///
    /// Returns whether the record was inserted.
    pub async fn add_reveal(
        &self,
        commitment_hash: H256,
        intent: TradeIntent,
        pool_key: PoolKey,
        pool_id: impl Into<PoolId>,
        proof_required: bool,
    ) -> bool {
        let mut entries = self.entries.write().await;
        if entries.by_hash.contains_key(&commitment_hash) {
            warn!("Reveal {:?} already stored, ignoring", commitment_hash);
            return false;
        }

        let record = RevealRecord::new(commitment_hash, intent, pool_key, pool_id, proof_required);
        debug!("Stored reveal {:?} for pool {}", commitment_hash, record.pool_id);

        entries.next_seq += 1;
        let seq = entries.next_seq;
        entries
            .by_hash
            .insert(commitment_hash, StoredReveal { seq, record });
        true
    }

    /// Bulk-add reveals for `pool_key`, skipping commitments already revealed.
    ///
    /// Returns the number of records inserted.
    pub async fn collect_from_commitments(
        &self,
        commitments: &[Commitment],
        pool_key: &PoolKey,
        proof_required: bool,
    ) -> usize {
        let mut added = 0;
        for commitment in commitments.iter().filter(|c| !c.revealed) {
            if self
                .add_reveal(
                    commitment.hash,
                    commitment.intent.clone(),
                    *pool_key,
                    commitment.pool_id.clone(),
                    proof_required,
                )
                .await
            {
                added += 1;
            }
        }
        info!(
            "Collected {} of {} commitments for pool {}",
            added,
            commitments.len(),
            pool_key.pool_id()
        );
        added
    }

    pub fn validate_reveal(&self, record: &RevealRecord) -> ValidationReport {
        validate_reveal(record)
    }

    // ==================== Submission ====================

    /// Submit every pending reveal, strictly one after another.
    ///
    /// Each record is validated first; rejected records are reported and stay
    /// pending. A successful submission is followed by the configured spacing
    /// when more records remain. One failure never stops the rest.
    #[instrument(skip(self))]
    pub async fn submit_all_reveals(&self) -> Vec<RevealSubmission> {
        let _guard = self.submit_lock.lock().await;

        let pending = self.pending_reveals().await;
        if pending.is_empty() {
            return Vec::new();
        }
        info!("Submitting {} pending reveals", pending.len());

        let total = pending.len();
        let mut results = Vec::with_capacity(total);

        for (index, record) in pending.into_iter().enumerate() {
            let outcome = self.submit_one(&record).await;
            let sent = matches!(outcome, RevealOutcome::Submitted { .. });

            results.push(RevealSubmission {
                commitment_hash: record.commitment_hash,
                pool_id: record.pool_id,
                outcome,
            });

            if sent && index + 1 < total {
                tokio::time::sleep(self.submission_spacing).await;
            }
        }

        let submitted = results.iter().filter(|r| r.is_submitted()).count();
        info!(
            "Reveal pass done: {} submitted, {} not submitted",
            submitted,
            total - submitted
        );
        results
    }

    async fn submit_one(&self, record: &RevealRecord) -> RevealOutcome {
        let report = validate_reveal(record);
        if !report.is_valid {
            warn!(
                "Reveal {:?} rejected: {}",
                record.commitment_hash,
                report.summary()
            );
            return RevealOutcome::Rejected {
                violations: report.errors,
            };
        }

        match self
            .client
            .submit_reveal(&record.pool_key, record.commitment_hash, &record.intent)
            .await
        {
            Ok(receipt) => {
                let submitted_at = Utc::now();
                let mut entries = self.entries.write().await;
                if let Some(stored) = entries.by_hash.get_mut(&record.commitment_hash) {
                    stored.record.mark_submitted(submitted_at);
                }
                debug!(
                    "Reveal {:?} submitted in {}",
                    record.commitment_hash, receipt.tx_ref
                );
                RevealOutcome::Submitted {
                    tx_ref: receipt.tx_ref,
                    submitted_at,
                }
            }
            Err(error) => {
                warn!(
                    "Reveal {:?} submission failed: {}",
                    record.commitment_hash, error
                );
                RevealOutcome::Failed { error }
            }
        }
    }

    // ==================== Queries ====================

    pub async fn get(&self, commitment_hash: &H256) -> Option<RevealRecord> {
        self.entries
            .read()
            .await
            .by_hash
            .get(commitment_hash)
            .map(|s| s.record.clone())
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.by_hash.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.by_hash.is_empty()
    }

    /// Records not yet submitted on chain
    pub async fn pending_reveals(&self) -> Vec<RevealRecord> {
        self.entries.read().await.collect(|r| !r.is_submitted())
    }

    /// Records submitted on chain and eligible for a batch
    pub async fn submitted_reveals(&self) -> Vec<RevealRecord> {
        self.entries.read().await.collect(RevealRecord::is_submitted)
    }

    pub async fn reveals_for_pool(&self, pool_id: &str) -> Vec<RevealRecord> {
        self.entries.read().await.collect(|r| r.pool_id == pool_id)
    }

    pub async fn submitted_hashes_for_pool(&self, pool_id: &str) -> Vec<H256> {
        self.entries
            .read()
            .await
            .collect(|r| r.pool_id == pool_id && r.is_submitted())
            .into_iter()
            .map(|r| r.commitment_hash)
            .collect()
    }

    // ==================== Cleanup ====================

    /// Drop records the backend executed. Unknown hashes are ignored.
    pub async fn clear_executed_reveals(&self, hashes: &[H256]) -> usize {
        let mut entries = self.entries.write().await;
        let removed = hashes
            .iter()
            .filter(|h| entries.by_hash.remove(*h).is_some())
            .count();
        debug!("Cleared {} executed reveals", removed);
        removed
    }

    pub async fn clear_pool(&self, pool_id: &str) -> usize {
        let removed = self
            .entries
            .write()
            .await
            .remove_where(|r| r.pool_id == pool_id);
        info!("Cleared {} reveals of pool {}", removed, pool_id);
        removed
    }

    pub async fn clear_all(&self) -> usize {
        let removed = self.entries.write().await.remove_where(|_| true);
        info!("Cleared all {} reveals", removed);
        removed
    }
}
