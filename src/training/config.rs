use crate::error::ModelError;
use crate::neural_network::layer::{DEFAULT_BLOCK_SIZE, SynthesisGradient, validate_block_size};
use crate::neural_network::optimizer::validate_learning_rate;
use serde::{Deserialize, Serialize};

/// Optimization algorithm used by the trainer.
///
/// # Variants
///
/// - `Adam` - Adam with `beta1 = 0.9` and `beta2 = 0.999`
/// - `RMSprop` - RMSprop with `rho = decay_rate`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OptimizerKind {
    Adam,
    #[default]
    RMSprop,
}

/// Every setting of a training run.
///
/// The struct is passed by value into the trainer and stored in every checkpoint, so a
/// checkpoint alone describes how its model was built.
///
/// # Fields
///
/// ## Data
/// - `batch_size` - Number of parallel character streams per batch
/// - `seq_length` - Number of timesteps per batch (truncated BPTT length)
/// - `train_frac` - Fraction of the batches used for training
/// - `val_frac` - Fraction of the batches used for validation; the rest is the test split
///
/// ## Model
/// - `embedding_size` - Width of the character embeddings
/// - `hidden_size` - Hidden state width of every cell
/// - `num_layers` - Number of stacked cells
/// - `block_size` - Tile side of the update-gate weight synthesis
/// - `synthesis_gradient` - Gradient routing through the synthesized block
/// - `init_range` - Half-width of the uniform parameter initialization
/// - `remember_states` - Carry the final state of one batch into the next within an epoch
///
/// ## Optimization
/// - `optimizer` - Optimization algorithm
/// - `learning_rate` - Initial learning rate
/// - `learning_rate_decay` - Factor applied to the learning rate at the end of each epoch
/// - `decay_after` - First epoch at whose end the learning rate decays
/// - `decay_rate` - RMSprop moving-average decay
/// - `epsilon` - Optimizer numerical stability constant
/// - `grad_clip` - Elementwise gradient clipping bound
/// - `max_epochs` - Number of passes over the training split
///
/// ## Bookkeeping
/// - `eval_val_every` - Iterations between validation runs
/// - `checkpoint_dir` - Directory receiving a checkpoint after every validation run, if any
/// - `savefile` - File name prefix of checkpoints
/// - `seed` - Seed of the parameter initialization and of sampling
/// - `show_progress` - Draw a progress bar on stderr
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub batch_size: usize,
    pub seq_length: usize,
    pub train_frac: f64,
    pub val_frac: f64,

    pub embedding_size: usize,
    pub hidden_size: usize,
    pub num_layers: usize,
    pub block_size: usize,
    pub synthesis_gradient: SynthesisGradient,
    pub init_range: f64,
    pub remember_states: bool,

    pub optimizer: OptimizerKind,
    pub learning_rate: f64,
    pub learning_rate_decay: f64,
    pub decay_after: usize,
    pub decay_rate: f64,
    pub epsilon: f64,
    pub grad_clip: f64,
    pub max_epochs: usize,

    pub eval_val_every: usize,
    pub checkpoint_dir: Option<String>,
    pub savefile: String,
    pub seed: u64,
    pub show_progress: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            seq_length: 50,
            train_frac: 0.95,
            val_frac: 0.05,
            embedding_size: 64,
            hidden_size: 128,
            num_layers: 2,
            block_size: DEFAULT_BLOCK_SIZE,
            synthesis_gradient: SynthesisGradient::default(),
            init_range: 0.08,
            remember_states: true,
            optimizer: OptimizerKind::default(),
            learning_rate: 2e-3,
            learning_rate_decay: 0.97,
            decay_after: 10,
            decay_rate: 0.95,
            epsilon: 1e-8,
            grad_clip: 5.0,
            max_epochs: 50,
            eval_val_every: 1000,
            checkpoint_dir: None,
            savefile: "circulant_gru".to_string(),
            seed: 123,
            show_progress: true,
        }
    }
}

impl TrainingConfig {
    /// Checks every setting before any work is done.
    ///
    /// # Errors
    ///
    /// - `ModelError::InputValidationError` - If a size or count is 0, a fraction is outside
    ///   `[0, 1]` or the fractions sum above 1, a rate is not positive and finite, the decay
    ///   factor is outside `(0, 1]`, or the savefile prefix is empty
    /// - `ModelError::UnsupportedParameter` - If `block_size` does not divide both
    ///   `embedding_size` and `hidden_size`
    pub fn validate(&self) -> Result<(), ModelError> {
        for (name, value) in [
            ("batch_size", self.batch_size),
            ("seq_length", self.seq_length),
            ("embedding_size", self.embedding_size),
            ("hidden_size", self.hidden_size),
            ("num_layers", self.num_layers),
            ("max_epochs", self.max_epochs),
            ("eval_val_every", self.eval_val_every),
        ] {
            if value == 0 {
                return Err(ModelError::InputValidationError(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }
        for (name, value) in [("train_frac", self.train_frac), ("val_frac", self.val_frac)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ModelError::InputValidationError(format!(
                    "{} must be in [0, 1], got {}",
                    name, value
                )));
            }
        }
        if self.train_frac + self.val_frac > 1.0 + 1e-9 {
            return Err(ModelError::InputValidationError(format!(
                "train_frac + val_frac must not exceed 1, got {}",
                self.train_frac + self.val_frac
            )));
        }
        validate_learning_rate(self.learning_rate)?;
        for (name, value) in [
            ("init_range", self.init_range),
            ("grad_clip", self.grad_clip),
            ("epsilon", self.epsilon),
        ] {
            if !(value > 0.0 && value.is_finite()) {
                return Err(ModelError::InputValidationError(format!(
                    "{} must be positive and finite, got {}",
                    name, value
                )));
            }
        }
        if !(self.learning_rate_decay > 0.0 && self.learning_rate_decay <= 1.0) {
            return Err(ModelError::InputValidationError(format!(
                "learning_rate_decay must be in (0, 1], got {}",
                self.learning_rate_decay
            )));
        }
        if !(0.0..1.0).contains(&self.decay_rate) {
            return Err(ModelError::InputValidationError(format!(
                "decay_rate must be in [0, 1), got {}",
                self.decay_rate
            )));
        }
        if self.savefile.is_empty() {
            return Err(ModelError::InputValidationError(
                "savefile must not be empty".to_string(),
            ));
        }
        validate_block_size(self.embedding_size, self.hidden_size, self.block_size)?;
        validate_block_size(self.hidden_size, self.hidden_size, self.block_size)?;
        Ok(())
    }
}
