use chrono::{DateTime, Utc};
use ethers::types::{Bytes, H256};
use serde::{Deserialize, Serialize};

use super::intent::{PoolId, PoolKey, TradeIntent};

/// Opaque proof artifact attached to a commitment made under a proof scheme
pub type Proof = Bytes;

/// A disclosed trade intent awaiting (or past) on-chain submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealRecord {
    pub commitment_hash: H256,
    pub intent: TradeIntent,
    pub pool_key: PoolKey,
    pub pool_id: PoolId,
    /// Verified by an external proof system instead of the plaintext hash
    pub proof_required: bool,
    pub submitted_on_chain: bool,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl RevealRecord {
    pub fn new(
        commitment_hash: H256,
        intent: TradeIntent,
        pool_key: PoolKey,
        pool_id: impl Into<PoolId>,
        proof_required: bool,
    ) -> Self {
        Self {
            commitment_hash,
            intent,
            pool_key,
            pool_id: pool_id.into(),
            proof_required,
            submitted_on_chain: false,
            submitted_at: None,
        }
    }

    /// Batch-eligible: already on chain, not yet executed
    pub fn is_submitted(&self) -> bool {
        self.submitted_on_chain
    }

    pub(crate) fn mark_submitted(&mut self, at: DateTime<Utc>) {
        self.submitted_on_chain = true;
        self.submitted_at = Some(at);
    }
}
