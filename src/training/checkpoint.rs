use crate::dataset::Vocabulary;
use crate::error::IoError;
use crate::neural_network::{CharLanguageModel, SerializableLanguageModel};
use crate::training::TrainingConfig;
use serde::{Deserialize, Serialize};
use serde_json::{from_reader, to_writer_pretty};
use std::fs::File;
use std::io::{BufWriter, Write};

/// Loss of one validation run.
///
/// # Fields
///
/// - `iteration` - Training iteration after which validation ran
/// - `epoch` - Fractional epoch after which validation ran
/// - `loss` - Mean validation loss
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub iteration: usize,
    pub epoch: f64,
    pub loss: f64,
}

/// Everything needed to resume training or to sample from a trained model.
///
/// # Fields
///
/// - `config` - Configuration of the run that produced the checkpoint
/// - `vocabulary` - Vocabulary of the training corpus
/// - `weights` - All model parameters
/// - `train_losses` - Training loss of every iteration so far
/// - `val_losses` - Every validation run so far
/// - `iteration` - Iterations completed
/// - `epoch` - Fractional epochs completed
/// - `elapsed_seconds` - Wall-clock training time so far
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub config: TrainingConfig,
    pub vocabulary: Vocabulary,
    pub weights: SerializableLanguageModel,
    pub train_losses: Vec<f64>,
    pub val_losses: Vec<ValidationRecord>,
    pub iteration: usize,
    pub epoch: f64,
    pub elapsed_seconds: f64,
}

impl Checkpoint {
    /// Writes the checkpoint as pretty-printed JSON, creating or overwriting `path`.
    ///
    /// # Errors
    ///
    /// - `IoError::StdIoError` - If the file cannot be created or written
    /// - `IoError::JsonError` - If serialization fails
    pub fn save_to_path(&self, path: &str) -> Result<(), IoError> {
        let file = File::create(path).map_err(IoError::StdIoError)?;
        let mut writer = BufWriter::new(file);

        to_writer_pretty(&mut writer, self).map_err(IoError::JsonError)?;

        // Ensure all data is written to disk
        writer.flush().map_err(IoError::StdIoError)?;

        log::info!("checkpoint written to {}", path);
        Ok(())
    }

    /// Reads a checkpoint written by [`Checkpoint::save_to_path`].
    ///
    /// # Errors
    ///
    /// - `IoError::StdIoError` - If the file cannot be opened
    /// - `IoError::JsonError` - If the content is not a valid checkpoint
    pub fn load_from_path(path: &str) -> Result<Self, IoError> {
        let reader = IoError::load_in_buf_reader(path)?;
        from_reader(reader).map_err(IoError::JsonError)
    }

    /// Rebuilds the model stored in the checkpoint.
    ///
    /// # Errors
    ///
    /// - `IoError::ModelError` - If the stored weights are inconsistent
    pub fn to_model(&self) -> Result<CharLanguageModel, IoError> {
        let mut model = CharLanguageModel::from_serializable(&self.weights)?;
        model.set_synthesis_gradient(self.config.synthesis_gradient);
        model.set_remember_states(self.config.remember_states);
        Ok(model)
    }
}
