use crate::error::ModelError;
use crate::neural_network::neural_network_trait::{Optimizer, Parameterized};
use ndarray::{Array1, ArrayView1, ArrayViewMut1, Zip, s};

/// Threshold for switching between sequential and parallel optimizer updates.
/// For parameter vectors shorter than this, sequential computation is used
/// to avoid parallelization overhead.
const OPTIMIZER_PARALLEL_THRESHOLD: usize = 1024;

/// Adam optimizer operating on flat parameter vectors
pub mod adam;
/// Input validation functions for optimizer hyperparameters
mod input_validation_function;
/// RMSprop optimizer operating on flat parameter vectors
pub mod rms_prop;

pub use adam::*;
use input_validation_function::*;
pub(crate) use input_validation_function::validate_learning_rate;
pub use rms_prop::*;

/// Clamps every gradient element to `[-clip, clip]` in place.
///
/// # Parameters
///
/// - `gradients` - Flat gradient vector
/// - `clip` - Positive clipping bound
///
/// # Errors
///
/// - `ModelError::InputValidationError` - If `clip` is not positive and finite
pub fn clip_gradients(mut gradients: ArrayViewMut1<'_, f64>, clip: f64) -> Result<(), ModelError> {
    validate_positive_finite(clip, "grad_clip")?;
    if gradients.len() >= OPTIMIZER_PARALLEL_THRESHOLD {
        gradients.par_mapv_inplace(|g| g.clamp(-clip, clip));
    } else {
        gradients.mapv_inplace(|g| g.clamp(-clip, clip));
    }
    Ok(())
}

/// Concatenates all parameters of `model` into one vector, in `parameters()` order.
pub fn flatten_parameters<P: Parameterized + ?Sized>(model: &P) -> Array1<f64> {
    model
        .parameters()
        .iter()
        .flat_map(|p| p.iter().cloned())
        .collect()
}

/// Concatenates all accumulated gradients of `model` into one vector, in `parameters()` order.
pub fn flatten_gradients<P: Parameterized + ?Sized>(model: &P) -> Array1<f64> {
    model
        .gradients()
        .iter()
        .flat_map(|g| g.iter().cloned())
        .collect()
}

/// Writes a flat vector produced by [`flatten_parameters`] back into `model`.
///
/// # Parameters
///
/// - `model` - Model receiving the parameters
/// - `flat` - Flat parameter vector with exactly `model.param_count()` elements
///
/// # Errors
///
/// - `ModelError::InputValidationError` - If the length of `flat` differs from the parameter count
pub fn load_flat_parameters<P: Parameterized + ?Sized>(
    model: &mut P,
    flat: ArrayView1<'_, f64>,
) -> Result<(), ModelError> {
    let expected = model.param_count();
    if flat.len() != expected {
        return Err(ModelError::InputValidationError(format!(
            "flat parameter vector has {} elements, model has {}",
            flat.len(),
            expected
        )));
    }
    let mut offset = 0;
    for mut param in model.parameters_mut() {
        let len = param.len();
        param
            .iter_mut()
            .zip(flat.slice(s![offset..offset + len]))
            .for_each(|(p, &v)| *p = v);
        offset += len;
    }
    Ok(())
}

/// Checks that a flat update has matching lengths and sizes per-parameter state lazily.
fn prepare_state(
    state: &mut Array1<f64>,
    parameters: &ArrayViewMut1<'_, f64>,
    gradients: &ArrayView1<'_, f64>,
) -> Result<(), ModelError> {
    if parameters.len() != gradients.len() {
        return Err(ModelError::InputValidationError(format!(
            "parameter vector has {} elements but gradient vector has {}",
            parameters.len(),
            gradients.len()
        )));
    }
    if state.is_empty() {
        *state = Array1::zeros(parameters.len());
    } else if state.len() != parameters.len() {
        return Err(ModelError::InputValidationError(format!(
            "optimizer state was sized for {} parameters, got {}",
            state.len(),
            parameters.len()
        )));
    }
    Ok(())
}

fn parameters_len_is_large(gradients: &ArrayView1<'_, f64>) -> bool {
    gradients.len() >= OPTIMIZER_PARALLEL_THRESHOLD
}
