use super::*;
use crate::error::IoError;
use crate::neural_network::neural_network_trait::ApplyWeights;
use serde::{Deserialize, Serialize};

/// Helper functions used by multiple weight types
mod helper_function;
/// Serializable representation of a CirculantGRU cell's weights
pub mod serializable_circulant_gru_weight;
/// Serializable representation of a Dense layer's weights
pub mod serializable_dense_weight;
/// Serializable representation of an Embedding layer's weights
pub mod serializable_embedding_weight;

use helper_function::*;
pub use serializable_circulant_gru_weight::*;
pub use serializable_dense_weight::*;
pub use serializable_embedding_weight::*;
