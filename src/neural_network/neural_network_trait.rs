use crate::error::{IoError, ModelError};
use ndarray::{Array3, ArrayView1, ArrayView2, ArrayView3, ArrayViewD, ArrayViewMut1, ArrayViewMutD};

/// Defines the parameter/gradient interface of trainable components.
///
/// Every trainable layer exposes its parameters and the matching gradient buffers in the
/// same order, so a whole model can be flattened into one parameter vector and one gradient
/// vector for the optimizer.
pub trait Parameterized {
    /// Returns views of all trainable parameters, in a fixed order.
    fn parameters(&self) -> Vec<ArrayViewD<'_, f64>>;

    /// Returns mutable views of all trainable parameters, in the same order as `parameters`.
    fn parameters_mut(&mut self) -> Vec<ArrayViewMutD<'_, f64>>;

    /// Returns views of the accumulated gradients, in the same order as `parameters`.
    fn gradients(&self) -> Vec<ArrayViewD<'_, f64>>;

    /// Resets all accumulated gradients to zero.
    fn zero_gradients(&mut self);

    /// Returns the total number of trainable parameters.
    ///
    /// # Returns
    ///
    /// - `usize` - The sum of the lengths of all parameter arrays
    fn param_count(&self) -> usize {
        self.parameters().iter().map(|p| p.len()).sum()
    }
}

/// Defines the interface for loss functions used in language-model training.
///
/// Targets are integer class indices with shape (batch, timesteps) and predictions are raw
/// logits with shape (batch, timesteps, classes).
pub trait LossFunction {
    /// Computes the loss between target indices and predicted logits.
    ///
    /// # Parameters
    ///
    /// - `targets` - Class indices with shape (batch, timesteps)
    /// - `logits` - Unnormalized scores with shape (batch, timesteps, classes)
    ///
    /// # Returns
    ///
    /// - `Ok(f64)` - The scalar loss value
    /// - `Err(ModelError::InputValidationError)` - If shapes disagree or a target is out of range
    fn compute_loss(
        &self,
        targets: ArrayView2<'_, usize>,
        logits: ArrayView3<'_, f64>,
    ) -> Result<f64, ModelError>;

    /// Computes the gradient of the loss with respect to the logits.
    ///
    /// # Parameters
    ///
    /// - `targets` - Class indices with shape (batch, timesteps)
    /// - `logits` - Unnormalized scores with shape (batch, timesteps, classes)
    ///
    /// # Returns
    ///
    /// - `Ok(Array3<f64>)` - Gradient with the same shape as `logits`
    /// - `Err(ModelError::InputValidationError)` - If shapes disagree or a target is out of range
    fn compute_grad(
        &self,
        targets: ArrayView2<'_, usize>,
        logits: ArrayView3<'_, f64>,
    ) -> Result<Array3<f64>, ModelError>;
}

/// Defines the interface for optimization algorithms.
///
/// Optimizers work on a flat parameter vector and the gradient vector of the same length.
pub trait Optimizer {
    /// Updates the parameters in place from their gradients.
    ///
    /// # Parameters
    ///
    /// - `parameters` - Flat parameter vector, updated in place
    /// - `gradients` - Flat gradient vector with the same length as `parameters`
    ///
    /// # Returns
    ///
    /// - `Ok(())` - The update was applied
    /// - `Err(ModelError::InputValidationError)` - If the lengths disagree or change between steps
    fn step(
        &mut self,
        parameters: ArrayViewMut1<'_, f64>,
        gradients: ArrayView1<'_, f64>,
    ) -> Result<(), ModelError>;

    /// Returns the current learning rate.
    fn learning_rate(&self) -> f64;

    /// Replaces the learning rate, e.g. for learning-rate decay.
    ///
    /// # Errors
    ///
    /// - `ModelError::InputValidationError` - If the learning rate is not positive and finite
    fn set_learning_rate(&mut self, learning_rate: f64) -> Result<(), ModelError>;
}

/// Trait for applying serialized weights to a specific layer type.
///
/// # Type Parameters
///
/// - `L` - The layer type that these weights can be applied to
pub trait ApplyWeights<L> {
    /// Applies the serialized weights to a layer instance.
    ///
    /// # Parameters
    ///
    /// - `layer` - Mutable reference to the layer that will receive the weights
    ///
    /// # Returns
    ///
    /// - `Ok(())` - Weights were successfully applied
    /// - `Err(IoError)` - Weight shape mismatch or conversion error
    fn apply_to_layer(&self, layer: &mut L) -> Result<(), IoError>;
}
