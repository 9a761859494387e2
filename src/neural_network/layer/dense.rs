use super::*;

/// Time-distributed fully connected layer.
///
/// Applies the same affine map `output = input · weight + bias` to every timestep of a
/// (batch, timesteps, input_dim) sequence. It is used as the classification head of the
/// language model, producing unnormalized logits over the vocabulary.
///
/// # Dimensions
///
/// - Input shape: (batch_size, timesteps, input_dim)
/// - Output shape: (batch_size, timesteps, output_dim)
pub struct Dense {
    input_dim: usize,
    output_dim: usize,
    /// Weight matrix with shape (input_dim, output_dim)
    weight: Array2<f64>,
    /// Bias vector with shape (output_dim)
    bias: Array1<f64>,
    grad_weight: Array2<f64>,
    grad_bias: Array1<f64>,
    output: Array3<f64>,
    grad_input: Array3<f64>,
}

impl Dense {
    /// Creates a dense layer with weights drawn uniformly from `[-init_range, init_range]`
    /// and a zero bias.
    ///
    /// # Parameters
    ///
    /// - `input_dim` - Number of input features per timestep
    /// - `output_dim` - Number of output features per timestep
    /// - `init_range` - Half-width of the uniform initialization interval
    /// - `rng` - Random number generator used for sampling
    ///
    /// # Returns
    ///
    /// - `Result<Self, ModelError>` - A new dense layer, or an error if a size is 0 or
    ///   `init_range` is invalid
    pub fn new(
        input_dim: usize,
        output_dim: usize,
        init_range: f64,
        rng: &mut StdRng,
    ) -> Result<Self, ModelError> {
        if input_dim == 0 || output_dim == 0 {
            return Err(ModelError::InputValidationError(format!(
                "input_dim and output_dim must be greater than 0, got {} and {}",
                input_dim, output_dim
            )));
        }
        Ok(Self {
            input_dim,
            output_dim,
            weight: random_uniform((input_dim, output_dim), init_range, rng)?,
            bias: Array1::zeros(output_dim),
            grad_weight: Array2::zeros((input_dim, output_dim)),
            grad_bias: Array1::zeros(output_dim),
            output: Array3::zeros((0, 0, 0)),
            grad_input: Array3::zeros((0, 0, 0)),
        })
    }

    /// Applies the affine map to every timestep.
    ///
    /// # Parameters
    ///
    /// - `input` - Input sequence with shape (batch, timesteps, input_dim)
    ///
    /// # Returns
    ///
    /// - `Ok(ArrayView3<f64>)` - Output with shape (batch, timesteps, output_dim)
    /// - `Err(ModelError)` - If the input is empty or has the wrong width
    pub fn forward(
        &mut self,
        input: ArrayView3<'_, f64>,
    ) -> Result<ArrayView3<'_, f64>, ModelError> {
        let (batch, timesteps) = self.validate_input(&input)?;
        let rows = batch * timesteps;
        ensure_shape(&mut self.output, Dim([batch, timesteps, self.output_dim]));

        let flat_input = input.to_shape((rows, self.input_dim)).map_err(|e| {
            ModelError::ProcessingError(format!("failed to flatten dense input: {}", e))
        })?;
        let mut flat_output = self
            .output
            .view_mut()
            .into_shape_with_order((rows, self.output_dim))
            .map_err(|e| {
                ModelError::ProcessingError(format!("failed to flatten dense output: {}", e))
            })?;
        flat_output.assign(&self.bias);
        general_mat_mul(1.0, &flat_input, &self.weight, 1.0, &mut flat_output);

        Ok(self.output.view())
    }

    /// Accumulates weight and bias gradients and returns the gradient with respect to the input.
    ///
    /// # Parameters
    ///
    /// - `input` - The input passed to the matching forward call
    /// - `grad_output` - Gradient with respect to the output, shape (batch, timesteps, output_dim)
    ///
    /// # Returns
    ///
    /// - `Ok(ArrayView3<f64>)` - Gradient with respect to the input, shape (batch, timesteps, input_dim)
    /// - `Err(ModelError)` - If the shapes disagree
    pub fn backward(
        &mut self,
        input: ArrayView3<'_, f64>,
        grad_output: ArrayView3<'_, f64>,
    ) -> Result<ArrayView3<'_, f64>, ModelError> {
        let (batch, timesteps) = self.validate_input(&input)?;
        if grad_output.dim() != (batch, timesteps, self.output_dim) {
            return Err(ModelError::InputValidationError(format!(
                "grad_output must have shape ({}, {}, {}), got {:?}",
                batch,
                timesteps,
                self.output_dim,
                grad_output.shape()
            )));
        }
        let rows = batch * timesteps;
        ensure_shape(&mut self.grad_input, Dim([batch, timesteps, self.input_dim]));

        let reshape_error = |e: ndarray::ShapeError| {
            ModelError::ProcessingError(format!("failed to flatten dense gradient: {}", e))
        };
        let flat_input = input.to_shape((rows, self.input_dim)).map_err(reshape_error)?;
        let flat_grad = grad_output
            .to_shape((rows, self.output_dim))
            .map_err(reshape_error)?;

        general_mat_mul(1.0, &flat_input.t(), &flat_grad, 1.0, &mut self.grad_weight);
        self.grad_bias += &flat_grad.sum_axis(Axis(0));

        let mut flat_grad_input = self
            .grad_input
            .view_mut()
            .into_shape_with_order((rows, self.input_dim))
            .map_err(reshape_error)?;
        general_mat_mul(1.0, &flat_grad, &self.weight.t(), 0.0, &mut flat_grad_input);

        Ok(self.grad_input.view())
    }

    /// Releases the output and input-gradient buffers.
    pub fn clear_state(&mut self) {
        self.output = Array3::zeros((0, 0, 0));
        self.grad_input = Array3::zeros((0, 0, 0));
    }

    /// Replaces the weight and bias.
    ///
    /// # Errors
    ///
    /// - `ModelError::InputValidationError` - If either shape is wrong
    pub fn set_weights(
        &mut self,
        weight: Array2<f64>,
        bias: Array1<f64>,
    ) -> Result<(), ModelError> {
        if weight.dim() != self.weight.dim() || bias.len() != self.bias.len() {
            return Err(ModelError::InputValidationError(format!(
                "expected weight {:?} and bias [{}], got {:?} and [{}]",
                self.weight.shape(),
                self.bias.len(),
                weight.shape(),
                bias.len()
            )));
        }
        self.weight = weight;
        self.bias = bias;
        Ok(())
    }

    /// Returns the number of input features per timestep
    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    /// Returns the number of output features per timestep
    pub fn output_dim(&self) -> usize {
        self.output_dim
    }

    /// Returns the weight matrix
    pub fn weight(&self) -> &Array2<f64> {
        &self.weight
    }

    /// Returns the bias vector
    pub fn bias(&self) -> &Array1<f64> {
        &self.bias
    }

    /// Returns the accumulated weight gradient
    pub fn grad_weight(&self) -> &Array2<f64> {
        &self.grad_weight
    }

    /// Returns the output of the most recent forward call
    pub fn output(&self) -> ArrayView3<'_, f64> {
        self.output.view()
    }

    /// Returns the accumulated bias gradient
    pub fn grad_bias(&self) -> &Array1<f64> {
        &self.grad_bias
    }

    fn validate_input(&self, input: &ArrayView3<'_, f64>) -> Result<(usize, usize), ModelError> {
        let (batch, timesteps, features) = input.dim();
        if batch == 0 || timesteps == 0 {
            return Err(ModelError::InputValidationError(
                "dense input must not be empty".to_string(),
            ));
        }
        if features != self.input_dim {
            return Err(ModelError::InputValidationError(format!(
                "dense input has {} features, expected {}",
                features, self.input_dim
            )));
        }
        Ok((batch, timesteps))
    }
}

impl Parameterized for Dense {
    fn parameters(&self) -> Vec<ArrayViewD<'_, f64>> {
        vec![self.weight.view().into_dyn(), self.bias.view().into_dyn()]
    }

    fn parameters_mut(&mut self) -> Vec<ArrayViewMutD<'_, f64>> {
        vec![
            self.weight.view_mut().into_dyn(),
            self.bias.view_mut().into_dyn(),
        ]
    }

    fn gradients(&self) -> Vec<ArrayViewD<'_, f64>> {
        vec![
            self.grad_weight.view().into_dyn(),
            self.grad_bias.view().into_dyn(),
        ]
    }

    fn zero_gradients(&mut self) {
        self.grad_weight.fill(0.0);
        self.grad_bias.fill(0.0);
    }
}
