/// Error types shared by every module of the crate.
///
/// - `ModelError` - shape/precondition violations, unsupported parameterizations and processing failures
/// - `IoError` - checkpoint file and JSON failures
pub mod error;

/// Character datasets for language-model training.
///
/// Splits raw text into train/validation/test minibatches of fixed-length token windows.
///
/// # Examples
/// ```rust
/// use rustyrnn::dataset::{CharSequenceLoader, SplitFractions, Split};
///
/// let text = "hello world, hello rust. ".repeat(20);
/// let mut loader = CharSequenceLoader::from_text(&text, 2, 8, SplitFractions::new(0.8, 0.2).unwrap()).unwrap();
/// let (x, y) = loader.next_batch(Split::Train).unwrap();
/// assert_eq!(x.shape(), &[2, 8]);
/// assert_eq!(y.shape(), &[2, 8]);
/// ```
pub mod dataset;

/// Components for building and training character-level recurrent language models.
///
/// # Core Components
///
/// ## Layers
/// - **CirculantGRU**: gated recurrent cell whose hidden-to-update-gate weights are block circulant
/// - **Embedding**: token index to dense vector lookup
/// - **Dense**: time-distributed affine projection used as the classification head
///
/// ## Optimization
/// - **Adam** and **RMSprop** operating on flat parameter vectors
/// - **clip_gradients** for elementwise gradient clipping
///
/// ## Model
/// - **CharLanguageModel**: embedding, stacked cells, dense head and softmax cross entropy
///
/// # Examples
/// ```rust
/// use rustyrnn::neural_network::*;
/// use ndarray::Array3;
///
/// let mut cell = CirculantGRU::with_seed(4, 4, 2, 7).unwrap();
/// let x = Array3::<f64>::ones((2, 3, 4));
/// let h = cell.forward(x.view(), None, None).unwrap();
/// assert_eq!(h.shape(), &[2, 3, 4]);
/// ```
pub mod neural_network;

/// A convenience module that re-exports the most commonly used types and traits from this crate.
///
/// # Examples
/// ```rust
/// use rustyrnn::prelude::*;
/// ```
pub mod prelude;

/// Training configuration, checkpoints and the training loop.
pub mod training;


pub use error::{IoError, ModelError};
