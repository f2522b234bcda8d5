pub mod batch;
pub mod intent;
pub mod reveal;
pub mod signal;

pub use batch::*;
pub use intent::*;
pub use reveal::*;
pub use signal::*;
