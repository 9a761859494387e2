/// Softmax cross entropy over integer class targets, computed from raw logits
pub mod softmax_cross_entropy;

pub use softmax_cross_entropy::*;
