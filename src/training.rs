/// JSON checkpoints of a trained model together with its vocabulary and loss history
pub mod checkpoint;
/// Training configuration and its validation
pub mod config;
/// The training loop
pub mod trainer;

pub use checkpoint::*;
pub use config::*;
pub use trainer::*;
