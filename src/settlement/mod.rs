//! Settlement backend seam
//!
//! The batch pipeline talks to the on-chain settlement contract only through
//! [`SettlementClient`]. Concrete backends live in `crate::adapters`.

pub mod factory;
mod traits;

pub use factory::{build_settlement_client, build_settlement_client_for, settlement_kind_for};
#[cfg(test)]
pub use traits::MockSettlementClient;
pub use traits::{
    BatchReadiness, BatchReceipt, SettlementClient, SettlementKind, SettlementResult, TxReceipt,
};
