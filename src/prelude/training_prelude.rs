pub use crate::training::{
    Checkpoint, OptimizerKind, Trainer, TrainingConfig, TrainingHistory, ValidationRecord,
    checkpoint_file_name,
};
