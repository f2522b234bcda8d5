//! Readiness Coordinator
//!
//! Aggregates independent agents' readiness signals per pool, detects quorum,
//! runs the straggler countdown and emits "batch ready" events carrying the
//! resolved batch parameters.

pub mod config;
pub mod coordinator;
pub mod dispatch;
pub mod resolver;
pub mod state;
pub mod timers;

pub use config::CoordinatorConfig;
pub use coordinator::ReadinessCoordinator;
pub use dispatch::{BatchReadyDispatcher, BatchReadyListener, DispatchReport, ListenerFailure};
pub use resolver::ConflictStrategy;
pub use state::{PoolCoordinationState, PoolStateSnapshot};
pub use timers::{CountdownId, CountdownTimers};
