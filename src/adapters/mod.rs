pub mod http_settlement;
pub mod simulated_settlement;

pub use http_settlement::HttpSettlementClient;
pub use simulated_settlement::{ExecutedBatch, SimOp, SimulatedSettlement};
