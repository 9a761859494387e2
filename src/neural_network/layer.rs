use crate::error::ModelError;
use crate::neural_network::neural_network_trait::Parameterized;
use ndarray::linalg::general_mat_mul;
use ndarray::{
    Array, Array1, Array2, Array3, ArrayView1, ArrayView2, ArrayView3, ArrayViewD, ArrayViewMut2,
    ArrayViewMutD, Axis, Dim, Dimension, ShapeBuilder, Zip, s,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Uniform};

/// Time-distributed fully connected layer used as the classification head
pub mod dense;
/// Token embedding lookup layer
pub mod embedding;
/// Recurrent layers: the circulant weight synthesizer and the gated recurrent cell
pub mod recurrent_layer;
/// Serializable weight containers used by checkpoints
pub mod serialize_weight;

pub use dense::Dense;
pub use embedding::Embedding;
pub use recurrent_layer::*;
pub use serialize_weight::*;

/// Reallocates `buffer` as zeros only when its shape differs from `shape`.
///
/// Buffers are kept across calls so that repeated calls with the same batch and sequence
/// shape never allocate.
///
/// # Parameters
///
/// - `buffer` - Buffer to check and possibly reallocate
/// - `shape` - Required shape
pub(crate) fn ensure_shape<D: Dimension>(buffer: &mut Array<f64, D>, shape: D) {
    if buffer.raw_dim() != shape {
        *buffer = Array::zeros(shape);
    }
}

/// Draws an array from the uniform distribution on `[-range, range]`.
///
/// # Parameters
///
/// - `shape` - Shape of the array to create
/// - `range` - Half-width of the sampling interval
/// - `rng` - Random number generator used for sampling
///
/// # Returns
///
/// - `Ok(Array)` - The initialized array
/// - `Err(ModelError::InputValidationError)` - If `range` is negative or not finite
pub(crate) fn random_uniform<Sh, D>(
    shape: Sh,
    range: f64,
    rng: &mut StdRng,
) -> Result<Array<f64, D>, ModelError>
where
    Sh: ShapeBuilder<Dim = D>,
    D: Dimension,
{
    if !(range >= 0.0 && range.is_finite()) {
        return Err(ModelError::InputValidationError(format!(
            "initialization range must be non-negative and finite, got {}",
            range
        )));
    }
    let distribution = Uniform::new_inclusive(-range, range).map_err(|e| {
        ModelError::InputValidationError(format!("invalid initialization range {}: {}", range, e))
    })?;
    Ok(Array::from_shape_fn(shape, |_| distribution.sample(rng)))
}

/// Creates a random number generator, seeded when a seed is given and from OS entropy otherwise.
pub(crate) fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}
