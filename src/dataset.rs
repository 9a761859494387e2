/// Character-level corpus loading: vocabulary, minibatch layout and train/validation/test splits
pub mod char_sequence_loader;

pub use char_sequence_loader::*;
