pub mod adapters;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod error;
pub mod execution;
pub mod logging;
pub mod reveal;
pub mod services;
pub mod settlement;

pub use adapters::{HttpSettlementClient, SimulatedSettlement};
pub use config::AppConfig;
pub use coordinator::{
    BatchReadyListener, ConflictStrategy, CoordinatorConfig, ReadinessCoordinator,
};
pub use domain::{
    BatchExecutionResult, BatchParameters, Commitment, PoolKey, ReadinessMessage, ReadinessSignal,
    RevealRecord, TradeIntent,
};
pub use error::{Result, RetryClass, SealError, SettlementError};
pub use execution::{BatchExecutionEngine, BatchReadinessCheck, EngineStats, ExecutionConfig};
pub use reveal::{RevealStore, RevealSubmission, ValidationReport};
pub use services::{BatchPipeline, SimulationOptions, SimulationReport};
pub use settlement::{SettlementClient, SettlementKind};
