use crate::dataset::Vocabulary;
use crate::error::{IoError, ModelError};
use crate::neural_network::layer::{
    CirculantGRU, Dense, Embedding, SerializableCirculantGRUWeight, SerializableDenseWeight,
    SerializableEmbeddingWeight, SynthesisGradient, ensure_shape, make_rng,
};
use crate::neural_network::loss_function::SoftmaxCrossEntropy;
use crate::neural_network::neural_network_trait::{ApplyWeights, LossFunction, Parameterized};
use ndarray::{Array2, Array3, ArrayView1, ArrayView2, ArrayView3, ArrayViewD, ArrayViewMutD, s};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Character-level recurrent language model.
///
/// Token indices pass through an [`Embedding`], a stack of [`CirculantGRU`] cells (the first
/// takes `embedding_size` features, the others `hidden_size`), and a time-distributed
/// [`Dense`] head producing logits over the vocabulary. Training minimizes
/// [`SoftmaxCrossEntropy`] against the next character.
///
/// Each layer keeps the buffers of its most recent forward call, so [`train_step`] runs the
/// full forward and backward pass without reallocating when the batch shape is unchanged.
///
/// [`train_step`]: CharLanguageModel::train_step
///
/// # Examples
/// ```rust
/// use rustyrnn::neural_network::*;
/// use ndarray::array;
///
/// let mut model = CharLanguageModel::new(5, 4, 8, 2, 4, 0.08, Some(1)).unwrap();
/// let x = array![[0usize, 1, 2], [3, 4, 0]];
/// let y = array![[1usize, 2, 3], [4, 0, 1]];
///
/// model.zero_gradients();
/// let loss = model.train_step(x.view(), y.view()).unwrap();
/// // an untrained model is close to uniform over the 5 characters
/// assert!((loss - 5f64.ln()).abs() < 0.5);
/// ```
pub struct CharLanguageModel {
    vocab_size: usize,
    embedding_size: usize,
    hidden_size: usize,
    block_size: usize,
    embedding: Embedding,
    cells: Vec<CirculantGRU>,
    head: Dense,
    loss: SoftmaxCrossEntropy,
    grad_hidden: Array3<f64>,
}

impl CharLanguageModel {
    /// Creates a language model with all parameters drawn uniformly from
    /// `[-init_range, init_range]`.
    ///
    /// # Parameters
    ///
    /// - `vocab_size` - Number of distinct characters
    /// - `embedding_size` - Width of the character embeddings
    /// - `hidden_size` - Hidden state width of every cell
    /// - `num_layers` - Number of stacked cells
    /// - `block_size` - Tile side of the update-gate weight synthesis, must divide both
    ///   `embedding_size` and `hidden_size`
    /// - `init_range` - Half-width of the uniform initialization interval
    /// - `seed` - Optional seed for reproducible initialization
    ///
    /// # Errors
    ///
    /// - `ModelError::InputValidationError` - If a size is 0 or `init_range` is invalid
    /// - `ModelError::UnsupportedParameter` - If `block_size` does not divide the layer widths
    pub fn new(
        vocab_size: usize,
        embedding_size: usize,
        hidden_size: usize,
        num_layers: usize,
        block_size: usize,
        init_range: f64,
        seed: Option<u64>,
    ) -> Result<Self, ModelError> {
        if num_layers == 0 {
            return Err(ModelError::InputValidationError(
                "num_layers must be greater than 0".to_string(),
            ));
        }
        let mut rng = make_rng(seed);
        let embedding = Embedding::new(vocab_size, embedding_size, init_range, &mut rng)?;
        let cells = (0..num_layers)
            .map(|layer| {
                let input_dim = if layer == 0 { embedding_size } else { hidden_size };
                let mut cell =
                    CirculantGRU::with_rng(input_dim, hidden_size, block_size, &mut rng)?;
                cell.reset(Some(init_range), &mut rng)?;
                Ok(cell)
            })
            .collect::<Result<Vec<_>, ModelError>>()?;
        let head = Dense::new(hidden_size, vocab_size, init_range, &mut rng)?;

        Ok(Self {
            vocab_size,
            embedding_size,
            hidden_size,
            block_size,
            embedding,
            cells,
            head,
            loss: SoftmaxCrossEntropy::new(),
            grad_hidden: Array3::zeros((0, 0, 0)),
        })
    }

    /// Rebuilds a model from its serialized form.
    ///
    /// # Errors
    ///
    /// - `IoError::ModelError` - If the stored sizes are invalid or a weight has the wrong shape
    pub fn from_serializable(weights: &SerializableLanguageModel) -> Result<Self, IoError> {
        let mut model = Self::new(
            weights.vocab_size,
            weights.embedding_size,
            weights.hidden_size,
            weights.cells.len(),
            weights.block_size,
            0.0,
            Some(0),
        )?;
        weights.apply_to_layer(&mut model)?;
        Ok(model)
    }

    /// Computes the logits of every position.
    ///
    /// # Parameters
    ///
    /// - `tokens` - Token indices with shape (batch, timesteps)
    ///
    /// # Returns
    ///
    /// - `Ok(ArrayView3<f64>)` - Logits with shape (batch, timesteps, vocab_size)
    /// - `Err(ModelError)` - If a token is out of range, the matrix is empty, or a carried
    ///   state does not match the batch size
    pub fn forward(
        &mut self,
        tokens: ArrayView2<'_, usize>,
    ) -> Result<ArrayView3<'_, f64>, ModelError> {
        self.run_forward(tokens)?;
        Ok(self.head.output())
    }

    /// Runs one forward and backward pass, adding all parameter gradients to the
    /// accumulated gradients.
    ///
    /// # Parameters
    ///
    /// - `inputs` - Token indices with shape (batch, timesteps)
    /// - `targets` - Next-character indices with the same shape
    ///
    /// # Returns
    ///
    /// - `Ok(f64)` - The mean cross-entropy loss of the batch before the update
    /// - `Err(ModelError)` - If any shape or index is invalid
    pub fn train_step(
        &mut self,
        inputs: ArrayView2<'_, usize>,
        targets: ArrayView2<'_, usize>,
    ) -> Result<f64, ModelError> {
        self.run_forward(inputs)?;
        let logits = self.head.output();
        let loss = self.loss.compute_loss(targets, logits)?;
        let grad_logits = self.loss.compute_grad(targets, logits)?;

        let last = self.cells.len() - 1;
        {
            let grad = self
                .head
                .backward(self.cells[last].output(), grad_logits.view())?;
            ensure_shape(&mut self.grad_hidden, grad.raw_dim());
            self.grad_hidden.assign(&grad);
        }

        for layer in (0..self.cells.len()).rev() {
            let (lower, upper) = self.cells.split_at_mut(layer);
            let input = match lower.last() {
                Some(previous) => previous.output(),
                None => self.embedding.output(),
            };
            let grads = upper[0].backward(input, None, None, self.grad_hidden.view(), 1.0)?;
            ensure_shape(&mut self.grad_hidden, grads.input.raw_dim());
            self.grad_hidden.assign(&grads.input);
        }

        self.embedding.backward(inputs, self.grad_hidden.view())?;
        Ok(loss)
    }

    /// Computes the loss of a batch without touching any gradient.
    ///
    /// # Returns
    ///
    /// - `Ok(f64)` - The mean cross-entropy loss
    /// - `Err(ModelError)` - If any shape or index is invalid
    pub fn evaluate(
        &mut self,
        inputs: ArrayView2<'_, usize>,
        targets: ArrayView2<'_, usize>,
    ) -> Result<f64, ModelError> {
        self.run_forward(inputs)?;
        self.loss.compute_loss(targets, self.head.output())
    }

    /// Generates text one character at a time.
    ///
    /// The prime text is fed through the model first; when it is empty, the first character is
    /// drawn uniformly from the vocabulary. Each following character is drawn from
    /// `softmax(logits / temperature)`. Sampling runs with a batch of one and carried state,
    /// which is forgotten again afterwards.
    ///
    /// # Parameters
    ///
    /// - `vocabulary` - Vocabulary the model was trained on
    /// - `prime` - Text to condition on, returned as the start of the result
    /// - `length` - Number of characters to generate after the prime
    /// - `temperature` - Positive softmax temperature; lower values are more conservative
    /// - `rng` - Random number generator used for sampling
    ///
    /// # Errors
    ///
    /// - `ModelError::InputValidationError` - If the vocabulary size differs from the model's,
    ///   `prime` contains an unknown character, or `temperature` is not positive and finite
    pub fn sample<R: Rng>(
        &mut self,
        vocabulary: &Vocabulary,
        prime: &str,
        length: usize,
        temperature: f64,
        rng: &mut R,
    ) -> Result<String, ModelError> {
        if vocabulary.len() != self.vocab_size {
            return Err(ModelError::InputValidationError(format!(
                "vocabulary has {} characters but the model was built for {}",
                vocabulary.len(),
                self.vocab_size
            )));
        }
        if !(temperature > 0.0 && temperature.is_finite()) {
            return Err(ModelError::InputValidationError(format!(
                "temperature must be positive and finite, got {}",
                temperature
            )));
        }
        let mut tokens = vocabulary.encode(prime)?;
        if tokens.is_empty() {
            tokens.push(rng.random_range(0..self.vocab_size));
        }

        let remember = self.cells[0].remember_states();
        self.set_remember_states(true);
        self.forget_states();

        let result = self.generate(&mut tokens, length, temperature, rng);

        self.forget_states();
        self.set_remember_states(remember);
        result?;
        vocabulary.decode(&tokens)
    }

    fn generate<R: Rng>(
        &mut self,
        tokens: &mut Vec<usize>,
        length: usize,
        temperature: f64,
        rng: &mut R,
    ) -> Result<(), ModelError> {
        let mut step = Array2::<usize>::zeros((1, 1));
        for &token in tokens.iter() {
            step[[0, 0]] = token;
            self.run_forward(step.view())?;
        }
        for _ in 0..length {
            let logits = self.head.output();
            let next = sample_from_logits(logits.slice(s![0, 0, ..]), temperature, rng);
            tokens.push(next);
            step[[0, 0]] = next;
            self.run_forward(step.view())?;
        }
        Ok(())
    }

    /// Enables or disables state carry in every cell.
    pub fn set_remember_states(&mut self, remember_states: bool) {
        for cell in &mut self.cells {
            cell.set_remember_states(remember_states);
        }
    }

    /// Drops the carried state of every cell.
    pub fn forget_states(&mut self) {
        for cell in &mut self.cells {
            cell.forget_states();
        }
    }

    /// Selects the gradient routing mode of every cell's synthesized block.
    pub fn set_synthesis_gradient(&mut self, mode: SynthesisGradient) {
        for cell in &mut self.cells {
            cell.set_synthesis_gradient(mode);
        }
    }

    /// Releases every sequence and gradient buffer, leaving parameters only.
    pub fn clear_state(&mut self) {
        self.embedding.clear_state();
        for cell in &mut self.cells {
            cell.clear_state();
        }
        self.head.clear_state();
        self.grad_hidden = Array3::zeros((0, 0, 0));
    }

    /// Captures all parameters in a serializable form.
    pub fn to_serializable(&self) -> SerializableLanguageModel {
        SerializableLanguageModel {
            vocab_size: self.vocab_size,
            embedding_size: self.embedding_size,
            hidden_size: self.hidden_size,
            block_size: self.block_size,
            embedding: SerializableEmbeddingWeight::from_layer(&self.embedding),
            cells: self
                .cells
                .iter()
                .map(SerializableCirculantGRUWeight::from_layer)
                .collect(),
            head: SerializableDenseWeight::from_layer(&self.head),
        }
    }

    /// Returns the number of distinct characters
    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    /// Returns the width of the character embeddings
    pub fn embedding_size(&self) -> usize {
        self.embedding_size
    }

    /// Returns the hidden state width of every cell
    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// Returns the number of stacked cells
    pub fn num_layers(&self) -> usize {
        self.cells.len()
    }

    /// Returns the tile side of the update-gate weight synthesis
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Returns the embedding layer
    pub fn embedding(&self) -> &Embedding {
        &self.embedding
    }

    /// Returns the stacked cells, input side first
    pub fn cells(&self) -> &[CirculantGRU] {
        &self.cells
    }

    /// Returns the classification head
    pub fn head(&self) -> &Dense {
        &self.head
    }

    fn run_forward(&mut self, tokens: ArrayView2<'_, usize>) -> Result<(), ModelError> {
        let mut hidden = self.embedding.forward(tokens)?;
        for cell in &mut self.cells {
            hidden = cell.forward(hidden, None, None)?;
        }
        self.head.forward(hidden)?;
        Ok(())
    }
}

impl Parameterized for CharLanguageModel {
    fn parameters(&self) -> Vec<ArrayViewD<'_, f64>> {
        let mut params = self.embedding.parameters();
        for cell in &self.cells {
            params.extend(cell.parameters());
        }
        params.extend(self.head.parameters());
        params
    }

    fn parameters_mut(&mut self) -> Vec<ArrayViewMutD<'_, f64>> {
        let mut params = self.embedding.parameters_mut();
        for cell in &mut self.cells {
            params.extend(cell.parameters_mut());
        }
        params.extend(self.head.parameters_mut());
        params
    }

    fn gradients(&self) -> Vec<ArrayViewD<'_, f64>> {
        let mut grads = self.embedding.gradients();
        for cell in &self.cells {
            grads.extend(cell.gradients());
        }
        grads.extend(self.head.gradients());
        grads
    }

    fn zero_gradients(&mut self) {
        self.embedding.zero_gradients();
        for cell in &mut self.cells {
            Parameterized::zero_gradients(cell);
        }
        self.head.zero_gradients();
    }
}

/// Draws a class index from `softmax(logits / temperature)`.
///
/// Uses a max-shifted softmax and a single cumulative draw; the last class absorbs rounding.
///
/// # Parameters
///
/// - `logits` - Unnormalized scores
/// - `temperature` - Positive softmax temperature
/// - `rng` - Random number generator used for the draw
pub fn sample_from_logits<R: Rng>(
    logits: ArrayView1<'_, f64>,
    temperature: f64,
    rng: &mut R,
) -> usize {
    let max = logits.fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
    let weights = logits.mapv(|v| ((v - max) / temperature).exp());
    let total = weights.sum();

    let r = rng.random::<f64>() * total;
    let mut cumulative = 0.0;
    for (i, &w) in weights.iter().enumerate() {
        cumulative += w;
        if r < cumulative {
            return i;
        }
    }
    weights.len().saturating_sub(1)
}

/// Serializable representation of all parameters of a [`CharLanguageModel`].
///
/// # Fields
///
/// - `vocab_size` - Number of distinct characters
/// - `embedding_size` - Width of the character embeddings
/// - `hidden_size` - Hidden state width of every cell
/// - `block_size` - Tile side of the update-gate weight synthesis
/// - `embedding` - Embedding table
/// - `cells` - Weights of the stacked cells, input side first
/// - `head` - Classification head weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializableLanguageModel {
    pub vocab_size: usize,
    pub embedding_size: usize,
    pub hidden_size: usize,
    pub block_size: usize,
    pub embedding: SerializableEmbeddingWeight,
    pub cells: Vec<SerializableCirculantGRUWeight>,
    pub head: SerializableDenseWeight,
}

impl ApplyWeights<CharLanguageModel> for SerializableLanguageModel {
    fn apply_to_layer(&self, layer: &mut CharLanguageModel) -> Result<(), IoError> {
        if self.vocab_size != layer.vocab_size
            || self.embedding_size != layer.embedding_size
            || self.hidden_size != layer.hidden_size
            || self.cells.len() != layer.cells.len()
        {
            return Err(IoError::ModelError(ModelError::InputValidationError(format!(
                "serialized model ({} chars, embedding {}, hidden {}, {} layers) does not match \
                 the target model ({} chars, embedding {}, hidden {}, {} layers)",
                self.vocab_size,
                self.embedding_size,
                self.hidden_size,
                self.cells.len(),
                layer.vocab_size,
                layer.embedding_size,
                layer.hidden_size,
                layer.cells.len()
            ))));
        }
        self.embedding.apply_to_layer(&mut layer.embedding)?;
        for (weights, cell) in self.cells.iter().zip(layer.cells.iter_mut()) {
            weights.apply_to_layer(cell)?;
        }
        self.head.apply_to_layer(&mut layer.head)?;
        Ok(())
    }
}
