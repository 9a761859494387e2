use crate::error::{IoError, ModelError};
use ndarray::{Array2, ArrayView2, s};
use serde::{Deserialize, Serialize};

/// Sorted set of the distinct characters of a corpus.
///
/// A character's token index is its position in the sorted set, so two vocabularies built
/// from texts with the same characters agree on every index.
///
/// # Examples
/// ```rust
/// use rustyrnn::dataset::Vocabulary;
///
/// let vocab = Vocabulary::from_text("abracadabra");
/// assert_eq!(vocab.len(), 5);
/// assert_eq!(vocab.encode("cab").unwrap(), vec![2, 0, 1]);
/// assert_eq!(vocab.decode(&[4, 0]).unwrap(), "ra");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vocabulary {
    chars: Vec<char>,
}

impl Vocabulary {
    /// Builds the vocabulary of every character occurring in `text`.
    pub fn from_text(text: &str) -> Self {
        Self::from_chars(text.chars())
    }

    /// Builds a vocabulary from an arbitrary character list, sorting and deduplicating it.
    pub fn from_chars<I: IntoIterator<Item = char>>(chars: I) -> Self {
        let mut chars: Vec<char> = chars.into_iter().collect();
        chars.sort_unstable();
        chars.dedup();
        Self { chars }
    }

    /// Returns the number of distinct characters
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    /// Returns `true` if the vocabulary holds no characters
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Returns the token index of `c`, if it is part of the vocabulary
    pub fn index_of(&self, c: char) -> Option<usize> {
        self.chars.binary_search(&c).ok()
    }

    /// Returns the character with token index `index`, if any
    pub fn char_at(&self, index: usize) -> Option<char> {
        self.chars.get(index).copied()
    }

    /// Returns the characters in token-index order
    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    /// Maps every character of `text` to its token index.
    ///
    /// # Errors
    ///
    /// - `ModelError::InputValidationError` - If `text` contains a character outside the vocabulary
    pub fn encode(&self, text: &str) -> Result<Vec<usize>, ModelError> {
        text.chars()
            .map(|c| {
                self.index_of(c).ok_or_else(|| {
                    ModelError::InputValidationError(format!(
                        "character {:?} is not in the vocabulary",
                        c
                    ))
                })
            })
            .collect()
    }

    /// Maps token indices back to text.
    ///
    /// # Errors
    ///
    /// - `ModelError::InputValidationError` - If an index is outside the vocabulary
    pub fn decode(&self, tokens: &[usize]) -> Result<String, ModelError> {
        tokens
            .iter()
            .map(|&t| {
                self.char_at(t).ok_or_else(|| {
                    ModelError::InputValidationError(format!(
                        "token index {} is outside the vocabulary of size {}",
                        t,
                        self.len()
                    ))
                })
            })
            .collect()
    }
}

/// Dataset partition a batch is drawn from.
///
/// # Variants
///
/// - `Train` - Batches used for parameter updates
/// - `Validation` - Batches used to track generalization during training
/// - `Test` - Held-out batches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Split {
    Train,
    Validation,
    Test,
}

impl Split {
    fn index(self) -> usize {
        match self {
            Split::Train => 0,
            Split::Validation => 1,
            Split::Test => 2,
        }
    }
}

/// Fractions of the batches assigned to the train and validation splits.
///
/// The test split receives whatever remains.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitFractions {
    train: f64,
    validation: f64,
}

impl SplitFractions {
    /// Creates split fractions.
    ///
    /// # Errors
    ///
    /// - `ModelError::InputValidationError` - If a fraction is outside `[0, 1]` or the two
    ///   sum to more than 1
    pub fn new(train: f64, validation: f64) -> Result<Self, ModelError> {
        for (name, value) in [("train", train), ("validation", validation)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ModelError::InputValidationError(format!(
                    "{} fraction must be in [0, 1], got {}",
                    name, value
                )));
            }
        }
        if train + validation > 1.0 + 1e-9 {
            return Err(ModelError::InputValidationError(format!(
                "train and validation fractions sum to {}, which exceeds 1",
                train + validation
            )));
        }
        Ok(Self { train, validation })
    }

    /// Returns the train fraction
    pub fn train(&self) -> f64 {
        self.train
    }

    /// Returns the validation fraction
    pub fn validation(&self) -> f64 {
        self.validation
    }

    /// Returns the test fraction, `1 - train - validation`
    pub fn test(&self) -> f64 {
        (1.0 - self.train - self.validation).max(0.0)
    }
}

impl Default for SplitFractions {
    fn default() -> Self {
        Self {
            train: 0.95,
            validation: 0.05,
        }
    }
}

/// Minibatch loader over a character corpus.
///
/// The encoded corpus is truncated to a multiple of `batch_size * seq_length` and laid out as
/// `batch_size` contiguous rows, so batch `k + 1` continues every row exactly where batch `k`
/// stopped. This is what allows a recurrent model to carry its state from one batch to the
/// next. Targets are the inputs shifted by one character, the final target wrapping around to
/// the first character of the corpus.
///
/// Batches are split in order: the first `floor(n * train)` batches are training batches, the
/// last `floor(n * test)` are test batches and the rest are validation batches. Each split
/// keeps its own cyclic batch pointer.
pub struct CharSequenceLoader {
    vocabulary: Vocabulary,
    batch_size: usize,
    seq_length: usize,
    x_batches: Vec<Array2<usize>>,
    y_batches: Vec<Array2<usize>>,
    split_sizes: [usize; 3],
    batch_index: [usize; 3],
}

impl CharSequenceLoader {
    /// Builds a loader from in-memory text.
    ///
    /// # Parameters
    ///
    /// - `text` - The corpus
    /// - `batch_size` - Number of parallel streams per batch
    /// - `seq_length` - Number of timesteps per batch
    /// - `split_fractions` - Train/validation fractions of the batches
    ///
    /// # Errors
    ///
    /// - `ModelError::InputValidationError` - If a size is 0, the text does not fill a single
    ///   batch, or the train split would receive no batch
    pub fn from_text(
        text: &str,
        batch_size: usize,
        seq_length: usize,
        split_fractions: SplitFractions,
    ) -> Result<Self, ModelError> {
        if batch_size == 0 || seq_length == 0 {
            return Err(ModelError::InputValidationError(format!(
                "batch_size and seq_length must be greater than 0, got {} and {}",
                batch_size, seq_length
            )));
        }
        let vocabulary = Vocabulary::from_text(text);
        let mut data = vocabulary.encode(text)?;

        let batch_len = batch_size * seq_length;
        let num_batches = data.len() / batch_len;
        if num_batches == 0 {
            return Err(ModelError::InputValidationError(format!(
                "text has {} characters, fewer than one batch of {} x {}",
                data.len(),
                batch_size,
                seq_length
            )));
        }
        data.truncate(num_batches * batch_len);

        let mut targets = data[1..].to_vec();
        targets.push(data[0]);

        let row_len = num_batches * seq_length;
        let to_rows = |stream: Vec<usize>| {
            Array2::from_shape_vec((batch_size, row_len), stream).map_err(|e| {
                ModelError::ProcessingError(format!("failed to lay out character stream: {}", e))
            })
        };
        let x_rows = to_rows(data)?;
        let y_rows = to_rows(targets)?;
        let cut = |rows: &Array2<usize>| -> Vec<Array2<usize>> {
            (0..num_batches)
                .map(|k| rows.slice(s![.., k * seq_length..(k + 1) * seq_length]).to_owned())
                .collect()
        };

        let train = (num_batches as f64 * split_fractions.train()).floor() as usize;
        let test = (num_batches as f64 * split_fractions.test()).floor() as usize;
        let validation = num_batches.saturating_sub(train + test);
        if train == 0 {
            return Err(ModelError::InputValidationError(format!(
                "{} batches leave no batch for the train split at fraction {}",
                num_batches,
                split_fractions.train()
            )));
        }

        log::debug!(
            "character loader: {} batches (train {}, validation {}, test {}), vocabulary size {}",
            num_batches,
            train,
            validation,
            test,
            vocabulary.len()
        );

        Ok(Self {
            vocabulary,
            batch_size,
            seq_length,
            x_batches: cut(&x_rows),
            y_batches: cut(&y_rows),
            split_sizes: [train, validation, num_batches - train - validation],
            batch_index: [0; 3],
        })
    }

    /// Builds a loader from a UTF-8 text file.
    ///
    /// See [`CharSequenceLoader::from_text`] for the remaining parameters.
    ///
    /// # Errors
    ///
    /// - `IoError::StdIoError` - If the file cannot be read
    /// - `IoError::ModelError` - If the text cannot be batched
    pub fn from_path(
        path: &str,
        batch_size: usize,
        seq_length: usize,
        split_fractions: SplitFractions,
    ) -> Result<Self, IoError> {
        let text = std::fs::read_to_string(path).map_err(IoError::StdIoError)?;
        Ok(Self::from_text(&text, batch_size, seq_length, split_fractions)?)
    }

    /// Returns the next `(inputs, targets)` pair of `split`, each of shape
    /// (batch_size, seq_length), wrapping around after the last batch of the split.
    ///
    /// # Errors
    ///
    /// - `ModelError::InputValidationError` - If the split holds no batches
    pub fn next_batch(
        &mut self,
        split: Split,
    ) -> Result<(ArrayView2<'_, usize>, ArrayView2<'_, usize>), ModelError> {
        let i = split.index();
        if self.split_sizes[i] == 0 {
            return Err(ModelError::InputValidationError(format!(
                "the {:?} split holds no batches",
                split
            )));
        }
        let offset: usize = self.split_sizes[..i].iter().sum();
        let k = offset + self.batch_index[i];
        self.batch_index[i] = (self.batch_index[i] + 1) % self.split_sizes[i];
        Ok((self.x_batches[k].view(), self.y_batches[k].view()))
    }

    /// Rewinds the batch pointer of `split` to its first batch
    pub fn reset_batch_pointer(&mut self, split: Split) {
        self.batch_index[split.index()] = 0;
    }

    /// Returns the number of batches in the train, validation and test splits
    pub fn split_sizes(&self) -> [usize; 3] {
        self.split_sizes
    }

    /// Returns the number of batches in `split`
    pub fn split_size(&self, split: Split) -> usize {
        self.split_sizes[split.index()]
    }

    /// Returns the vocabulary of the corpus
    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Returns the number of parallel streams per batch
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Returns the number of timesteps per batch
    pub fn seq_length(&self) -> usize {
        self.seq_length
    }
}
