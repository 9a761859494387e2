/// Prelude module for character datasets.
pub mod dataset_prelude;
/// Prelude module for layers, losses, optimizers and the language model.
pub mod neural_network_prelude;
/// Prelude module for training configuration, checkpoints and the trainer.
pub mod training_prelude;

pub use crate::error::{IoError, ModelError};
pub use dataset_prelude::*;
pub use neural_network_prelude::*;
pub use training_prelude::*;
