use super::*;

/// Token embedding lookup layer.
///
/// Maps every token index of a (batch, timesteps) matrix to a learned row of an
/// `(vocab_size, embedding_dim)` table, producing a (batch, timesteps, embedding_dim) sequence
/// that feeds the first recurrent cell.
///
/// # Fields
///
/// - `vocab_size` - Number of distinct tokens
/// - `embedding_dim` - Width of every embedding vector
/// - `weight` - Embedding table with shape (vocab_size, embedding_dim)
/// - `grad_weight` - Accumulated gradient of the table
/// - `output` - Output buffer reused across calls with the same shape
pub struct Embedding {
    vocab_size: usize,
    embedding_dim: usize,
    weight: Array2<f64>,
    grad_weight: Array2<f64>,
    output: Array3<f64>,
}

impl Embedding {
    /// Creates an embedding table drawn uniformly from `[-init_range, init_range]`.
    ///
    /// # Parameters
    ///
    /// - `vocab_size` - Number of distinct tokens
    /// - `embedding_dim` - Width of every embedding vector
    /// - `init_range` - Half-width of the uniform initialization interval
    /// - `rng` - Random number generator used for sampling
    ///
    /// # Returns
    ///
    /// - `Result<Self, ModelError>` - A new embedding layer, or an error if a size is 0 or
    ///   `init_range` is invalid
    pub fn new(
        vocab_size: usize,
        embedding_dim: usize,
        init_range: f64,
        rng: &mut StdRng,
    ) -> Result<Self, ModelError> {
        if vocab_size == 0 || embedding_dim == 0 {
            return Err(ModelError::InputValidationError(format!(
                "vocab_size and embedding_dim must be greater than 0, got {} and {}",
                vocab_size, embedding_dim
            )));
        }
        Ok(Self {
            vocab_size,
            embedding_dim,
            weight: random_uniform((vocab_size, embedding_dim), init_range, rng)?,
            grad_weight: Array2::zeros((vocab_size, embedding_dim)),
            output: Array3::zeros((0, 0, 0)),
        })
    }

    /// Looks up the embedding of every token.
    ///
    /// # Parameters
    ///
    /// - `tokens` - Token indices with shape (batch, timesteps)
    ///
    /// # Returns
    ///
    /// - `Ok(ArrayView3<f64>)` - Embeddings with shape (batch, timesteps, embedding_dim)
    /// - `Err(ModelError::InputValidationError)` - If `tokens` is empty or holds an index
    ///   outside the vocabulary
    pub fn forward(
        &mut self,
        tokens: ArrayView2<'_, usize>,
    ) -> Result<ArrayView3<'_, f64>, ModelError> {
        self.validate_tokens(&tokens)?;
        let (batch, timesteps) = tokens.dim();
        ensure_shape(&mut self.output, Dim([batch, timesteps, self.embedding_dim]));

        for ((b, t), &token) in tokens.indexed_iter() {
            self.output
                .slice_mut(s![b, t, ..])
                .assign(&self.weight.row(token));
        }
        Ok(self.output.view())
    }

    /// Accumulates the gradient of the table rows looked up by `tokens`.
    ///
    /// # Parameters
    ///
    /// - `tokens` - Token indices passed to the matching forward call
    /// - `grad_output` - Gradient with respect to the embeddings, shape (batch, timesteps, embedding_dim)
    ///
    /// # Errors
    ///
    /// - `ModelError::InputValidationError` - If the shapes disagree or an index is out of range
    pub fn backward(
        &mut self,
        tokens: ArrayView2<'_, usize>,
        grad_output: ArrayView3<'_, f64>,
    ) -> Result<(), ModelError> {
        self.validate_tokens(&tokens)?;
        let (batch, timesteps) = tokens.dim();
        if grad_output.dim() != (batch, timesteps, self.embedding_dim) {
            return Err(ModelError::InputValidationError(format!(
                "grad_output must have shape ({}, {}, {}), got {:?}",
                batch,
                timesteps,
                self.embedding_dim,
                grad_output.shape()
            )));
        }

        for ((b, t), &token) in tokens.indexed_iter() {
            let mut row = self.grad_weight.row_mut(token);
            row += &grad_output.slice(s![b, t, ..]);
        }
        Ok(())
    }

    /// Releases the output buffer.
    pub fn clear_state(&mut self) {
        self.output = Array3::zeros((0, 0, 0));
    }

    /// Replaces the embedding table.
    ///
    /// # Errors
    ///
    /// - `ModelError::InputValidationError` - If `weight` does not have shape (vocab_size, embedding_dim)
    pub fn set_weights(&mut self, weight: Array2<f64>) -> Result<(), ModelError> {
        if weight.dim() != self.weight.dim() {
            return Err(ModelError::InputValidationError(format!(
                "embedding weight must have shape {:?}, got {:?}",
                self.weight.shape(),
                weight.shape()
            )));
        }
        self.weight = weight;
        Ok(())
    }

    /// Returns the number of distinct tokens
    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    /// Returns the width of every embedding vector
    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    /// Returns the embedding table
    pub fn weight(&self) -> &Array2<f64> {
        &self.weight
    }

    /// Returns the accumulated table gradient
    pub fn grad_weight(&self) -> &Array2<f64> {
        &self.grad_weight
    }

    /// Returns the embeddings looked up by the most recent forward call
    pub fn output(&self) -> ArrayView3<'_, f64> {
        self.output.view()
    }

    fn validate_tokens(&self, tokens: &ArrayView2<'_, usize>) -> Result<(), ModelError> {
        if tokens.is_empty() {
            return Err(ModelError::InputValidationError(
                "token matrix must not be empty".to_string(),
            ));
        }
        if let Some(&token) = tokens.iter().find(|&&token| token >= self.vocab_size) {
            return Err(ModelError::InputValidationError(format!(
                "token index {} is outside the vocabulary of size {}",
                token, self.vocab_size
            )));
        }
        Ok(())
    }
}

impl Parameterized for Embedding {
    fn parameters(&self) -> Vec<ArrayViewD<'_, f64>> {
        vec![self.weight.view().into_dyn()]
    }

    fn parameters_mut(&mut self) -> Vec<ArrayViewMutD<'_, f64>> {
        vec![self.weight.view_mut().into_dyn()]
    }

    fn gradients(&self) -> Vec<ArrayViewD<'_, f64>> {
        vec![self.grad_weight.view().into_dyn()]
    }

    fn zero_gradients(&mut self) {
        self.grad_weight.fill(0.0);
    }
}
