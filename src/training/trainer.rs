use crate::dataset::{CharSequenceLoader, Split};
use crate::error::{IoError, ModelError};
use crate::neural_network::{
    Adam, CharLanguageModel, Optimizer, Parameterized, RMSprop, clip_gradients,
    flatten_gradients, flatten_parameters, load_flat_parameters,
};
use crate::training::{Checkpoint, OptimizerKind, TrainingConfig, ValidationRecord};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;

/// Training stops once the loss of an iteration exceeds this multiple of the first loss.
const LOSS_EXPLOSION_FACTOR: f64 = 3.0;

/// Outcome of [`Trainer::fit`].
///
/// # Fields
///
/// - `train_losses` - Training loss of every completed iteration
/// - `val_losses` - Every validation run
/// - `iterations` - Number of completed iterations
/// - `stopped_early` - Whether training stopped because the loss exploded
/// - `checkpoints` - Paths of all checkpoints written
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub train_losses: Vec<f64>,
    pub val_losses: Vec<ValidationRecord>,
    pub iterations: usize,
    pub stopped_early: bool,
    pub checkpoints: Vec<String>,
}

/// Returns the checkpoint file name for a validation run.
///
/// The name is `{savefile}_epoch{epoch:.2}_{val_loss:.4}.json`, so a directory listing sorts
/// checkpoints of one run by progress and shows their validation loss.
///
/// # Examples
/// ```rust
/// use rustyrnn::training::{TrainingConfig, checkpoint_file_name};
///
/// let config = TrainingConfig { savefile: "shakespeare".to_string(), ..TrainingConfig::default() };
/// assert_eq!(checkpoint_file_name(&config, 1.5, 1.23456), "shakespeare_epoch1.50_1.2346.json");
/// ```
pub fn checkpoint_file_name(config: &TrainingConfig, epoch: f64, val_loss: f64) -> String {
    format!("{}_epoch{:.2}_{:.4}.json", config.savefile, epoch, val_loss)
}

/// Drives training of a [`CharLanguageModel`] on a [`CharSequenceLoader`].
///
/// Every iteration zeroes the gradients, runs forward and backward on the next training batch,
/// clips the flat gradient vector, applies one optimizer step to the flat parameter vector and
/// writes the parameters back into the model.
pub struct Trainer {
    config: TrainingConfig,
    loader: CharSequenceLoader,
    model: CharLanguageModel,
    optimizer: Box<dyn Optimizer>,
    history: TrainingHistory,
    elapsed_seconds: f64,
}

impl Trainer {
    /// Creates a trainer with a freshly initialized model.
    ///
    /// # Parameters
    ///
    /// - `config` - Training configuration
    /// - `loader` - Batches of the training corpus, built with the configured batch size and
    ///   sequence length
    ///
    /// # Errors
    ///
    /// - `ModelError` - If the configuration is invalid or disagrees with the loader
    pub fn new(config: TrainingConfig, loader: CharSequenceLoader) -> Result<Self, ModelError> {
        config.validate()?;
        let model = CharLanguageModel::new(
            loader.vocabulary().len(),
            config.embedding_size,
            config.hidden_size,
            config.num_layers,
            config.block_size,
            config.init_range,
            Some(config.seed),
        )?;
        Self::with_model(config, loader, model)
    }

    /// Creates a trainer that continues training an existing model, e.g. one restored from a
    /// checkpoint.
    ///
    /// # Errors
    ///
    /// - `ModelError::InputValidationError` - If the configuration is invalid, disagrees with the
    ///   loader, or the model's vocabulary size differs from the loader's
    pub fn with_model(
        config: TrainingConfig,
        loader: CharSequenceLoader,
        mut model: CharLanguageModel,
    ) -> Result<Self, ModelError> {
        config.validate()?;
        if loader.batch_size() != config.batch_size || loader.seq_length() != config.seq_length {
            return Err(ModelError::InputValidationError(format!(
                "loader batches are {} x {} but the configuration asks for {} x {}",
                loader.batch_size(),
                loader.seq_length(),
                config.batch_size,
                config.seq_length
            )));
        }
        if model.vocab_size() != loader.vocabulary().len() {
            return Err(ModelError::InputValidationError(format!(
                "model vocabulary has {} characters but the corpus has {}",
                model.vocab_size(),
                loader.vocabulary().len()
            )));
        }

        let optimizer: Box<dyn Optimizer> = match config.optimizer {
            OptimizerKind::Adam => Box::new(Adam::new(
                config.learning_rate,
                0.9,
                0.999,
                config.epsilon,
            )?),
            OptimizerKind::RMSprop => Box::new(RMSprop::new(
                config.learning_rate,
                config.decay_rate,
                config.epsilon,
            )?),
        };
        model.set_remember_states(config.remember_states);
        model.set_synthesis_gradient(config.synthesis_gradient);

        Ok(Self {
            config,
            loader,
            model,
            optimizer,
            history: TrainingHistory::default(),
            elapsed_seconds: 0.0,
        })
    }

    /// Creates a trainer that continues the run captured in `checkpoint`.
    ///
    /// The model, the loss history, the iteration count and the elapsed time are restored, and
    /// every learning-rate decay the run already went through is applied again, so [`fit`]
    /// carries on from the checkpoint's iteration until `max_epochs` of `config`. Optimizer
    /// moments are not part of a checkpoint and start from zero.
    ///
    /// [`fit`]: Trainer::fit
    ///
    /// # Errors
    ///
    /// - `IoError::ModelError` - If the configuration is invalid, disagrees with the loader,
    ///   the checkpoint's vocabulary differs from the loader's, or the stored weights are
    ///   inconsistent
    pub fn from_checkpoint(
        config: TrainingConfig,
        loader: CharSequenceLoader,
        checkpoint: &Checkpoint,
    ) -> Result<Self, IoError> {
        if checkpoint.vocabulary != *loader.vocabulary() {
            return Err(ModelError::InputValidationError(format!(
                "checkpoint vocabulary has {} characters and differs from the corpus vocabulary",
                checkpoint.vocabulary.len()
            ))
            .into());
        }
        let model = checkpoint.to_model()?;
        let mut trainer = Self::with_model(config, loader, model)?;

        trainer.history = TrainingHistory {
            train_losses: checkpoint.train_losses.clone(),
            val_losses: checkpoint.val_losses.clone(),
            iterations: checkpoint.iteration,
            stopped_early: false,
            checkpoints: Vec::new(),
        };
        trainer.elapsed_seconds = checkpoint.elapsed_seconds;

        let completed_epochs = checkpoint.iteration / trainer.iterations_per_epoch();
        let decays = trainer.decays_after(completed_epochs);
        if decays > 0 {
            let learning_rate =
                trainer.config.learning_rate * trainer.config.learning_rate_decay.powi(decays);
            trainer.optimizer.set_learning_rate(learning_rate)?;
        }
        log::info!(
            "resuming at iteration {} (epoch {}) with learning rate {:e}",
            checkpoint.iteration,
            completed_epochs,
            trainer.optimizer.learning_rate()
        );
        Ok(trainer)
    }

    /// Trains until `max_epochs` passes over the training split are complete.
    ///
    /// Iteration and epoch counting continue from the iterations already completed by this
    /// trainer, so a trainer built with [`Trainer::from_checkpoint`] resumes where the
    /// checkpoint left off and the returned history includes the restored losses.
    ///
    /// State carry is reset at every epoch boundary. After every `eval_val_every` iterations and
    /// after the last one the validation split is evaluated with fresh state, and a checkpoint is
    /// written when `checkpoint_dir` is set. At the end of every epoch from `decay_after` on the
    /// learning rate is multiplied by `learning_rate_decay`.
    ///
    /// # Returns
    ///
    /// - `Ok(TrainingHistory)` - Losses and checkpoints of the run
    ///
    /// # Errors
    ///
    /// - `IoError::ModelError` - With `ModelError::ProcessingError` if the loss becomes
    ///   non-finite, or any model error raised during training
    /// - `IoError::StdIoError` / `IoError::JsonError` - If a checkpoint cannot be written
    pub fn fit(&mut self) -> Result<TrainingHistory, IoError> {
        let iterations_per_epoch = self.iterations_per_epoch();
        let total_iterations = self.config.max_epochs * iterations_per_epoch;
        if let Some(dir) = &self.config.checkpoint_dir {
            std::fs::create_dir_all(dir).map_err(IoError::StdIoError)?;
        }

        let progress_bar = if self.config.show_progress {
            ProgressBar::new(total_iterations as u64)
        } else {
            ProgressBar::hidden()
        };
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} | Epoch {msg}")
                .map_err(|e| {
                    ModelError::ProcessingError(format!("invalid progress bar template: {}", e))
                })?
                .progress_chars("█▓░"),
        );

        let start = Instant::now();
        let elapsed_before = self.elapsed_seconds;
        let mut first_loss = self.history.train_losses.first().copied();
        let start_iteration = self.history.iterations;
        self.history.stopped_early = false;
        self.history.checkpoints.clear();
        progress_bar.set_position(start_iteration.min(total_iterations) as u64);

        // a run resumed mid-epoch continues with the next batch of that epoch
        let skipped = start_iteration % iterations_per_epoch;
        if skipped != 0 {
            self.model.forget_states();
            self.loader.reset_batch_pointer(Split::Train);
            for _ in 0..skipped {
                self.loader.next_batch(Split::Train)?;
            }
        }

        for iteration in start_iteration + 1..=total_iterations {
            let epoch = iteration as f64 / iterations_per_epoch as f64;
            self.begin_iteration(iteration);

            let loss = self.train_iteration()?;
            if !loss.is_finite() {
                return Err(ModelError::ProcessingError(format!(
                    "loss became {} at iteration {}",
                    loss, iteration
                ))
                .into());
            }
            self.history.train_losses.push(loss);
            self.history.iterations = iteration;

            if iteration % iterations_per_epoch == 0
                && self.decays_after(iteration / iterations_per_epoch)
                    > self.decays_after(iteration / iterations_per_epoch - 1)
            {
                let decayed = self.optimizer.learning_rate() * self.config.learning_rate_decay;
                self.optimizer.set_learning_rate(decayed)?;
                log::info!("decayed learning rate to {:e} at epoch {:.2}", decayed, epoch);
            }

            if iteration % self.config.eval_val_every == 0 || iteration == total_iterations {
                self.elapsed_seconds = elapsed_before + start.elapsed().as_secs_f64();
                self.validate_and_checkpoint(iteration, epoch, loss)?;
            }

            progress_bar.set_message(format!(
                "{:.2}/{} | Loss: {:.4}",
                epoch, self.config.max_epochs, loss
            ));
            progress_bar.inc(1);

            let first = *first_loss.get_or_insert(loss);
            if loss > first * LOSS_EXPLOSION_FACTOR {
                log::warn!(
                    "loss is exploding ({:.4} > {} x {:.4}), aborting at iteration {}",
                    loss,
                    LOSS_EXPLOSION_FACTOR,
                    first,
                    iteration
                );
                self.history.stopped_early = true;
                break;
            }
        }

        self.elapsed_seconds = elapsed_before + start.elapsed().as_secs_f64();
        progress_bar.finish_with_message("Training completed");
        Ok(self.history.clone())
    }

    /// Mean loss over the whole validation split, or `None` if the split holds no batches.
    ///
    /// Carried state is forgotten before and after, so training batches never see state from
    /// validation batches.
    ///
    /// # Errors
    ///
    /// - `ModelError` - If a forward pass fails
    pub fn validation_loss(&mut self) -> Result<Option<f64>, ModelError> {
        let batches = self.loader.split_size(Split::Validation);
        if batches == 0 {
            return Ok(None);
        }
        self.model.forget_states();
        self.loader.reset_batch_pointer(Split::Validation);
        let mut total = 0.0;
        for _ in 0..batches {
            let (x, y) = self.loader.next_batch(Split::Validation)?;
            total += self.model.evaluate(x, y)?;
        }
        self.model.forget_states();
        Ok(Some(total / batches as f64))
    }

    /// Captures the current model, vocabulary and history as a checkpoint.
    ///
    /// The model's sequence buffers are released first, so the checkpoint holds parameters only.
    pub fn checkpoint(&mut self) -> Checkpoint {
        self.model.clear_state();
        Checkpoint {
            config: self.config.clone(),
            vocabulary: self.loader.vocabulary().clone(),
            weights: self.model.to_serializable(),
            train_losses: self.history.train_losses.clone(),
            val_losses: self.history.val_losses.clone(),
            iteration: self.history.iterations,
            epoch: self.history.iterations as f64
                / self.loader.split_size(Split::Train).max(1) as f64,
            elapsed_seconds: self.elapsed_seconds,
        }
    }

    /// Returns the model being trained
    pub fn model(&self) -> &CharLanguageModel {
        &self.model
    }

    /// Returns the model being trained, mutably
    pub fn model_mut(&mut self) -> &mut CharLanguageModel {
        &mut self.model
    }

    /// Consumes the trainer and returns the trained model
    pub fn into_model(self) -> CharLanguageModel {
        self.model
    }

    /// Returns the batch loader
    pub fn loader(&self) -> &CharSequenceLoader {
        &self.loader
    }

    /// Returns the training configuration
    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Returns the current learning rate of the optimizer
    pub fn learning_rate(&self) -> f64 {
        self.optimizer.learning_rate()
    }

    fn iterations_per_epoch(&self) -> usize {
        self.loader.split_size(Split::Train)
    }

    /// Number of learning-rate decays applied once `completed_epochs` epochs have finished.
    fn decays_after(&self, completed_epochs: usize) -> i32 {
        if self.config.learning_rate_decay >= 1.0 {
            return 0;
        }
        let first = self.config.decay_after.max(1);
        (completed_epochs + 1).saturating_sub(first) as i32
    }

    /// Forgets carried state and rewinds the training split when `iteration` opens an epoch.
    pub(crate) fn begin_iteration(&mut self, iteration: usize) {
        if (iteration - 1) % self.iterations_per_epoch() == 0 {
            self.model.forget_states();
            self.loader.reset_batch_pointer(Split::Train);
        }
    }

    /// Runs one optimization step on the next training batch and returns its loss.
    pub(crate) fn train_iteration(&mut self) -> Result<f64, ModelError> {
        self.model.zero_gradients();
        let (x, y) = self.loader.next_batch(Split::Train)?;
        let loss = self.model.train_step(x, y)?;

        let mut gradients = flatten_gradients(&self.model);
        clip_gradients(gradients.view_mut(), self.config.grad_clip)?;
        let mut parameters = flatten_parameters(&self.model);
        self.optimizer
            .step(parameters.view_mut(), gradients.view())?;
        load_flat_parameters(&mut self.model, parameters.view())?;
        Ok(loss)
    }

    fn validate_and_checkpoint(
        &mut self,
        iteration: usize,
        epoch: f64,
        train_loss: f64,
    ) -> Result<(), IoError> {
        let val_loss = self.validation_loss()?;
        if let Some(loss) = val_loss {
            log::info!(
                "iteration {} (epoch {:.2}): train loss {:.4}, validation loss {:.4}",
                iteration,
                epoch,
                train_loss,
                loss
            );
            self.history.val_losses.push(ValidationRecord {
                iteration,
                epoch,
                loss,
            });
        }

        if let Some(dir) = self.config.checkpoint_dir.clone() {
            let name = checkpoint_file_name(&self.config, epoch, val_loss.unwrap_or(train_loss));
            let path = Path::new(&dir).join(name);
            let path = path.to_string_lossy().into_owned();
            self.checkpoint().save_to_path(&path)?;
            self.history.checkpoints.push(path);
        }
        Ok(())
    }
}
