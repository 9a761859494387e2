use super::*;

/// Input clipping bound used before `exp` in the sigmoid to prevent overflow
const SIGMOID_INPUT_CLIP: f64 = 500.0;

/// Stable logistic sigmoid `1 / (1 + e^(-x))`.
///
/// Clips the input before exponentiation so extreme pre-activations saturate instead of
/// overflowing.
#[inline]
pub fn sigmoid(x: f64) -> f64 {
    let clipped_x = x.clamp(-SIGMOID_INPUT_CLIP, SIGMOID_INPUT_CLIP);
    1.0 / (1.0 + (-clipped_x).exp())
}

/// Runs an ndarray `Zip` either on the rayon pool or on the current thread.
macro_rules! zip_for_each {
    ($parallel:expr, $zip:expr, $body:expr) => {
        if $parallel {
            $zip.par_for_each($body)
        } else {
            $zip.for_each($body)
        }
    };
}

/// Block-circulant weight synthesis and its adjoint
pub mod circulant;
/// Gated recurrent cell with a block-circulant update-gate recurrent weight
pub mod circulant_gru;
/// Input validation functions for recurrent layers
mod input_validation_function;

pub use circulant::{
    accumulate_circulant, accumulate_circulant_adjoint, synthesize, validate_block_size,
};
pub use circulant_gru::{CellGradients, CirculantGRU, DEFAULT_BLOCK_SIZE, SynthesisGradient};
