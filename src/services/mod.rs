pub mod pipeline;
pub mod signals;
pub mod simulation;

pub use pipeline::BatchPipeline;
pub use signals::spawn_signal_listener;
pub use simulation::{run_simulation, SimulationOptions, SimulationReport};
