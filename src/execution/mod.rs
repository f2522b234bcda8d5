//! Batch execution: readiness checks, retries, proofs and polling

pub mod config;
pub mod engine;
pub mod proofs;
pub mod retry;

pub use config::ExecutionConfig;
pub use engine::{BatchExecutionEngine, BatchReadinessCheck, EngineStats};
pub use proofs::ProofCache;
pub use retry::{RetryPolicy, Retried};
