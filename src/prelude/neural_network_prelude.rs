pub use crate::neural_network::char_language_model::*;
pub use crate::neural_network::layer::recurrent_layer::*;
pub use crate::neural_network::layer::serialize_weight::*;
pub use crate::neural_network::layer::{Dense, Embedding};
pub use crate::neural_network::loss_function::*;
pub use crate::neural_network::optimizer::*;
pub use crate::neural_network::{ApplyWeights, LossFunction, Optimizer, Parameterized};
