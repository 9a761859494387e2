/// Module that contains the character language model built from the layers below
pub mod char_language_model;
/// Module that contains neural network layer implementations
pub mod layer;
/// Module that contains loss function implementations
pub mod loss_function;
/// Module that contains the traits shared by layers, losses and optimizers
pub mod neural_network_trait;
/// Module that contains optimization algorithms for neural network training
pub mod optimizer;

pub use char_language_model::*;
pub use layer::*;
pub use loss_function::*;
pub use optimizer::*;

pub use neural_network_trait::{ApplyWeights, LossFunction, Optimizer, Parameterized};
