pub use crate::dataset::{CharSequenceLoader, Split, SplitFractions, Vocabulary};
