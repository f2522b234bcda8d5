//! Proof cache for proof-based batches

use dashmap::DashMap;
use ethers::types::H256;

use crate::domain::Proof;

/// Proofs keyed by commitment hash, filled by whoever generates them
#[derive(Debug, Default)]
pub struct ProofCache {
    proofs: DashMap<H256, Proof>,
}

impl ProofCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, commitment_hash: H256, proof: Proof) {
        self.proofs.insert(commitment_hash, proof);
    }

    pub fn get(&self, commitment_hash: &H256) -> Option<Proof> {
        self.proofs.get(commitment_hash).map(|p| p.value().clone())
    }

    pub fn contains(&self, commitment_hash: &H256) -> bool {
        self.proofs.contains_key(commitment_hash)
    }

    /// Proofs for `hashes` in the same order, or the first hash without one.
    pub fn collect(&self, hashes: &[H256]) -> Result<Vec<Proof>, H256> {
        hashes
            .iter()
            .map(|h| self.get(h).ok_or(*h))
            .collect()
    }

    pub fn remove_all(&self, hashes: &[H256]) {
        for hash in hashes {
            self.proofs.remove(hash);
        }
    }

    pub fn len(&self) -> usize {
        self.proofs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proofs.is_empty()
    }
}
