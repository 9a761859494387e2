use super::input_validation_function::*;
use super::*;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// Tile side used by the update-gate weight synthesis when none is configured.
pub const DEFAULT_BLOCK_SIZE: usize = 32;

/// Threshold for using parallel computation in the cell.
/// When batch_size * units < this value, elementwise gate arithmetic runs sequentially.
const CELL_PARALLEL_THRESHOLD: usize = 1024;

/// How gradients reach the hidden-to-update-gate block through the circulant synthesis.
///
/// # Variants
///
/// - `Exact` - Differentiates through the synthesis: the hidden gradient flows back through
///   the derived block used in the forward pass and the weight gradient is mapped onto the
///   base block with the synthesis adjoint
/// - `Passthrough` - Routes gradients to the base block as if it had been used directly,
///   ignoring the synthesis. Agrees with `Exact` only for `block_size == 1`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SynthesisGradient {
    #[default]
    Exact,
    Passthrough,
}

/// Shape and state bookkeeping of the most recent forward call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ForwardRecord {
    batch: usize,
    timesteps: usize,
    hidden_supplied: bool,
    cell_supplied: bool,
}

/// Gradients returned by [`CirculantGRU::backward`].
///
/// The views borrow the cell's internal gradient buffers.
///
/// # Fields
///
/// - `input` - Gradient with respect to the input sequence, shape (batch, timesteps, input_dim)
/// - `hidden` - Gradient with respect to `h0`, present only if `h0` was passed to the matching forward
/// - `cell` - Gradient with respect to `c0`, present only if `c0` was passed to the matching forward.
///   The cell state is the hidden state, so this equals `hidden`
pub struct CellGradients<'a> {
    pub input: ArrayView3<'a, f64>,
    pub hidden: Option<ArrayView2<'a, f64>>,
    pub cell: Option<ArrayView2<'a, f64>>,
}

/// Weight views used by one timestep.
struct StepWeights<'a> {
    input: ArrayView2<'a, f64>,
    update_recurrent: ArrayView2<'a, f64>,
    reset_recurrent: ArrayView2<'a, f64>,
    candidate_recurrent: ArrayView2<'a, f64>,
    bias: ArrayView1<'a, f64>,
}

/// Gated recurrent cell with a block-circulant update-gate recurrent weight.
///
/// Processes a sequence with shape (batch, timesteps, input_dim) and returns the hidden state
/// of every timestep with shape (batch, timesteps, units). Per timestep:
///
/// - `i_t = sigmoid(b_i + x_t · W_x_i + h_{t-1} · C(W_h_i))`
/// - `r_t = sigmoid(b_r + x_t · W_x_r + h_{t-1} · W_h_r)`
/// - `g_t = tanh(b_g + x_t · W_x_g + (h_{t-1} ⊙ r_t) · W_h_g)`
/// - `h_t = (1 - i_t) ⊙ h_{t-1} + i_t ⊙ g_t`
///
/// where `C` is the block-circulant synthesis of [`accumulate_circulant`]. The cell state is
/// the hidden state: `c0` is accepted for compatibility but does not enter the arithmetic.
///
/// All parameters live in one `(input_dim + units) x 3 * units` weight (input rows first,
/// column groups update, reset, candidate) and one `3 * units` bias. Sequence, gate and
/// gradient buffers are retained between calls and only reallocated when the batch or
/// sequence shape changes.
///
/// # Examples
/// ```rust
/// use rustyrnn::neural_network::*;
/// use ndarray::Array3;
///
/// let mut cell = CirculantGRU::with_seed(4, 8, 4, 42).unwrap();
/// let x = Array3::<f64>::ones((2, 5, 4));
///
/// let h = cell.forward(x.view(), None, None).unwrap().to_owned();
/// assert_eq!(h.shape(), &[2, 5, 8]);
///
/// let grad_h = Array3::<f64>::ones((2, 5, 8));
/// let grads = cell.backward(x.view(), None, None, grad_h.view(), 1.0).unwrap();
/// assert_eq!(grads.input.shape(), &[2, 5, 4]);
/// assert!(grads.hidden.is_none());
/// ```
pub struct CirculantGRU {
    input_dim: usize,
    units: usize,
    block_size: usize,
    synthesis_gradient: SynthesisGradient,
    remember_states: bool,

    weight: Array2<f64>,
    bias: Array1<f64>,
    grad_weight: Array2<f64>,
    grad_bias: Array1<f64>,

    // Forward buffers
    derived_weight: Array2<f64>,
    output: Array3<f64>,
    gates: Array3<f64>, // i, r, g activations per timestep
    initial_hidden: Array2<f64>,
    initial_cell: Array2<f64>,
    final_hidden: Array2<f64>,
    final_cell: Array2<f64>,
    carried_batch: Option<usize>,
    forward_record: Option<ForwardRecord>,

    // Backward buffers
    grad_input: Array3<f64>,
    grad_initial_hidden: Array2<f64>,
    grad_initial_cell: Array2<f64>,
    grad_next_hidden: Array2<f64>,
    scratch: Array2<f64>,
    grad_gates: Array2<f64>,
    grad_derived: Array2<f64>,
}

impl CirculantGRU {
    /// Creates a cell with randomly initialized weights drawn from OS entropy.
    ///
    /// # Parameters
    ///
    /// - `input_dim` - Number of input features per timestep
    /// - `units` - Hidden state width
    /// - `block_size` - Tile side of the update-gate weight synthesis
    ///
    /// # Returns
    ///
    /// - `Result<Self, ModelError>` - A new cell
    ///
    /// # Errors
    ///
    /// - `ModelError::InputValidationError` - If `input_dim` or `units` is 0
    /// - `ModelError::UnsupportedParameter` - If `block_size` does not divide both `input_dim` and `units`
    pub fn new(input_dim: usize, units: usize, block_size: usize) -> Result<Self, ModelError> {
        Self::with_rng(input_dim, units, block_size, &mut make_rng(None))
    }

    /// Creates a cell whose initial weights are reproducible from `seed`.
    ///
    /// See [`CirculantGRU::new`] for parameters and errors.
    pub fn with_seed(
        input_dim: usize,
        units: usize,
        block_size: usize,
        seed: u64,
    ) -> Result<Self, ModelError> {
        Self::with_rng(input_dim, units, block_size, &mut make_rng(Some(seed)))
    }

    /// Creates a cell drawing its initial weights from `rng`.
    ///
    /// See [`CirculantGRU::new`] for parameters and errors.
    pub fn with_rng(
        input_dim: usize,
        units: usize,
        block_size: usize,
        rng: &mut StdRng,
    ) -> Result<Self, ModelError> {
        validate_recurrent_dimensions(input_dim, units)?;
        validate_block_size(units, units, block_size)?;
        validate_block_size(input_dim, units, block_size)?;

        let weight_shape = (input_dim + units, 3 * units);
        let mut cell = Self {
            input_dim,
            units,
            block_size,
            synthesis_gradient: SynthesisGradient::default(),
            remember_states: false,
            weight: Array2::zeros(weight_shape),
            bias: Array1::zeros(3 * units),
            grad_weight: Array2::zeros(weight_shape),
            grad_bias: Array1::zeros(3 * units),
            derived_weight: Array2::zeros((0, 0)),
            output: Array3::zeros((0, 0, 0)),
            gates: Array3::zeros((0, 0, 0)),
            initial_hidden: Array2::zeros((0, 0)),
            initial_cell: Array2::zeros((0, 0)),
            final_hidden: Array2::zeros((0, 0)),
            final_cell: Array2::zeros((0, 0)),
            carried_batch: None,
            forward_record: None,
            grad_input: Array3::zeros((0, 0, 0)),
            grad_initial_hidden: Array2::zeros((0, 0)),
            grad_initial_cell: Array2::zeros((0, 0)),
            grad_next_hidden: Array2::zeros((0, 0)),
            scratch: Array2::zeros((0, 0)),
            grad_gates: Array2::zeros((0, 0)),
            grad_derived: Array2::zeros((0, 0)),
        };
        cell.reset(None, rng)?;
        Ok(cell)
    }

    /// Re-initializes all parameters.
    ///
    /// Weights are drawn uniformly from `[-r, r]` with `r = init_range` or `1 / sqrt(units)`
    /// when no range is given. The bias and all gradients are zeroed and any carried state is
    /// forgotten.
    ///
    /// # Parameters
    ///
    /// - `init_range` - Optional half-width of the uniform initialization interval
    /// - `rng` - Random number generator used for sampling
    ///
    /// # Errors
    ///
    /// - `ModelError::InputValidationError` - If `init_range` is negative or not finite
    pub fn reset(&mut self, init_range: Option<f64>, rng: &mut StdRng) -> Result<(), ModelError> {
        let range = init_range.unwrap_or(1.0 / (self.units as f64).sqrt());
        self.weight = random_uniform(self.weight.raw_dim(), range, rng)?;
        self.bias.fill(0.0);
        self.zero_gradients();
        self.forget_states();
        self.forward_record = None;
        Ok(())
    }

    /// Replaces the weight and bias.
    ///
    /// # Parameters
    ///
    /// - `weight` - Weight with shape (input_dim + units, 3 * units)
    /// - `bias` - Bias with length 3 * units
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

    /// Enables or disables carrying the final state of one forward call into the next.
    ///
    /// When enabled, a forward call without `h0`/`c0` starts from the final state of the
    /// previous call, which must have had the same batch size.
    pub fn set_remember_states(&mut self, remember_states: bool) {
        self.remember_states = remember_states;
    }

    /// Drops the carried final state so the next forward call starts from zeros.
    pub fn forget_states(&mut self) {
        if self.carried_batch.take().is_some() {
            log::debug!("CirculantGRU: carried state forgotten");
        }
    }

    /// Selects how gradients reach the hidden-to-update-gate block.
    pub fn set_synthesis_gradient(&mut self, mode: SynthesisGradient) {
        self.synthesis_gradient = mode;
    }

    /// Resets accumulated weight and bias gradients to zero.
    pub fn zero_gradients(&mut self) {
        self.grad_weight.fill(0.0);
        self.grad_bias.fill(0.0);
    }

    /// Releases every sequence, gate, scratch and gradient buffer and the carried state.
    ///
    /// Parameters and their gradients are kept, leaving the cell in a parameter-only state
    /// suitable for checkpointing. A subsequent `backward` needs a new `forward` first.
    pub fn clear_state(&mut self) {
        self.derived_weight = Array2::zeros((0, 0));
        self.output = Array3::zeros((0, 0, 0));
        self.gates = Array3::zeros((0, 0, 0));
        self.initial_hidden = Array2::zeros((0, 0));
        self.initial_cell = Array2::zeros((0, 0));
        self.final_hidden = Array2::zeros((0, 0));
        self.final_cell = Array2::zeros((0, 0));
        self.grad_input = Array3::zeros((0, 0, 0));
        self.grad_initial_hidden = Array2::zeros((0, 0));
        self.grad_initial_cell = Array2::zeros((0, 0));
        self.grad_next_hidden = Array2::zeros((0, 0));
        self.scratch = Array2::zeros((0, 0));
        self.grad_gates = Array2::zeros((0, 0));
        self.grad_derived = Array2::zeros((0, 0));
        self.carried_batch = None;
        self.forward_record = None;
        log::debug!("CirculantGRU: buffers released");
    }

    /// Runs the cell over a whole sequence.
    ///
    /// The derived update-gate weight is synthesized once per call. The gate activations of
    /// every timestep are retained for [`CirculantGRU::backward`].
    ///
    /// # Parameters
    ///
    /// - `input` - Input sequence with shape (batch, timesteps, input_dim)
    /// - `h0` - Optional initial hidden state with shape (batch, units)
    /// - `c0` - Optional initial cell state with shape (batch, units)
    ///
    /// Missing states start from the carried final state when remembering states and a
    /// previous call exists, and from zeros otherwise.
    ///
    /// # Returns
    ///
    /// - `Ok(ArrayView3<f64>)` - Hidden states of all timesteps with shape (batch, timesteps, units)
    ///
    /// # Errors
    ///
    /// - `ModelError::InputValidationError` - If the input is empty or has the wrong width, a
    ///   supplied state has the wrong shape, or a carried state has a different batch size
    pub fn forward(
        &mut self,
        input: ArrayView3<'_, f64>,
        h0: Option<ArrayView2<'_, f64>>,
        c0: Option<ArrayView2<'_, f64>>,
    ) -> Result<ArrayView3<'_, f64>, ModelError> {
        let (batch, timesteps) = validate_sequence_input(&input, self.input_dim)?;
        let units = self.units;
        let input_dim = self.input_dim;
        if let Some(h) = &h0 {
            validate_state_shape(h, batch, units, "h0")?;
        }
        if let Some(c) = &c0 {
            validate_state_shape(c, batch, units, "c0")?;
        }

        let carried = if self.remember_states { self.carried_batch } else { None };
        if let Some(previous_batch) = carried {
            if previous_batch != batch && (h0.is_none() || c0.is_none()) {
                return Err(ModelError::InputValidationError(format!(
                    "remember_states requires a constant batch size: previous call had {}, got {}",
                    previous_batch, batch
                )));
            }
        }
        let use_carried = carried.is_some();

        ensure_shape(&mut self.derived_weight, Dim([input_dim + units, units]));
        ensure_shape(&mut self.output, Dim([batch, timesteps, units]));
        ensure_shape(&mut self.gates, Dim([batch, timesteps, 3 * units]));
        ensure_shape(&mut self.scratch, Dim([batch, units]));
        load_initial_state(
            &mut self.initial_hidden,
            h0,
            use_carried.then_some(&self.final_hidden),
            batch,
            units,
        );
        load_initial_state(
            &mut self.initial_cell,
            c0,
            use_carried.then_some(&self.final_cell),
            batch,
            units,
        );

        self.derived_weight.fill(0.0);
        accumulate_circulant(
            self.weight.slice(s![input_dim.., ..units]),
            self.weight.slice(s![..input_dim, ..units]),
            self.block_size,
            self.derived_weight.view_mut(),
        )?;

        let weights = StepWeights {
            input: self.weight.slice(s![..input_dim, ..]),
            update_recurrent: self.derived_weight.slice(s![input_dim.., ..]),
            reset_recurrent: self.weight.slice(s![input_dim.., units..2 * units]),
            candidate_recurrent: self.weight.slice(s![input_dim.., 2 * units..]),
            bias: self.bias.view(),
        };
        let parallel = batch * units >= CELL_PARALLEL_THRESHOLD;

        for t in 0..timesteps {
            let (done, mut rest) = self.output.view_mut().split_at(Axis(1), t);
            let prev_hidden = if t == 0 {
                self.initial_hidden.view()
            } else {
                done.index_axis(Axis(1), t - 1)
            };
            forward_step(
                input.index_axis(Axis(1), t),
                prev_hidden,
                &weights,
                self.gates.index_axis_mut(Axis(1), t),
                rest.index_axis_mut(Axis(1), 0),
                self.scratch.view_mut(),
                parallel,
            );
        }

        // the cell state is aliased to the hidden state
        ensure_shape(&mut self.final_hidden, Dim([batch, units]));
        ensure_shape(&mut self.final_cell, Dim([batch, units]));
        let last = self.output.index_axis(Axis(1), timesteps - 1);
        self.final_hidden.assign(&last);
        self.final_cell.assign(&last);
        self.carried_batch = Some(batch);
        self.forward_record = Some(ForwardRecord {
            batch,
            timesteps,
            hidden_supplied: h0.is_some(),
            cell_supplied: c0.is_some(),
        });

        Ok(self.output.view())
    }

    /// Backpropagates through time over the sequence of the most recent forward call.
    ///
    /// Gradients of the weight and bias are added to the accumulated gradients, so several
    /// forward/backward pairs may run before an optimizer step.
    ///
    /// # Parameters
    ///
    /// - `input` - The input sequence passed to the matching forward call
    /// - `h0` - The `h0` passed to the matching forward call, if any (shape checked only)
    /// - `c0` - The `c0` passed to the matching forward call, if any (shape checked only)
    /// - `grad_output` - Gradient with respect to every hidden state, shape (batch, timesteps, units)
    /// - `scale` - Gradient scale; only `1.0` is supported
    ///
    /// # Returns
    ///
    /// - `Ok(CellGradients)` - Gradients with respect to the input and the supplied initial states
    ///
    /// # Errors
    ///
    /// - `ModelError::UnsupportedParameter` - If `scale != 1.0`
    /// - `ModelError::ProcessingError` - If no forward call precedes this one
    /// - `ModelError::InputValidationError` - If any shape disagrees with the matching forward call
    pub fn backward(
        &mut self,
        input: ArrayView3<'_, f64>,
        h0: Option<ArrayView2<'_, f64>>,
        c0: Option<ArrayView2<'_, f64>>,
        grad_output: ArrayView3<'_, f64>,
        scale: f64,
    ) -> Result<CellGradients<'_>, ModelError> {
        if scale != 1.0 {
            return Err(ModelError::UnsupportedParameter(format!(
                "backward only supports scale = 1.0, got {}",
                scale
            )));
        }
        let record = self.forward_record.ok_or_else(|| {
            ModelError::ProcessingError("Forward pass has not been run".to_string())
        })?;
        let (batch, timesteps) = validate_sequence_input(&input, self.input_dim)?;
        let units = self.units;
        let input_dim = self.input_dim;
        if (batch, timesteps) != (record.batch, record.timesteps) {
            return Err(ModelError::InputValidationError(format!(
                "input has batch {} and {} timesteps but the last forward call had batch {} and {} timesteps",
                batch, timesteps, record.batch, record.timesteps
            )));
        }
        if grad_output.dim() != (batch, timesteps, units) {
            return Err(ModelError::InputValidationError(format!(
                "grad_output must have shape ({}, {}, {}), got {:?}",
                batch,
                timesteps,
                units,
                grad_output.shape()
            )));
        }
        if let Some(h) = &h0 {
            validate_state_shape(h, batch, units, "h0")?;
        }
        if let Some(c) = &c0 {
            validate_state_shape(c, batch, units, "c0")?;
        }

        ensure_shape(&mut self.grad_input, Dim([batch, timesteps, input_dim]));
        ensure_shape(&mut self.grad_initial_hidden, Dim([batch, units]));
        ensure_shape(&mut self.grad_initial_cell, Dim([batch, units]));
        ensure_shape(&mut self.grad_next_hidden, Dim([batch, units]));
        ensure_shape(&mut self.scratch, Dim([batch, units]));
        ensure_shape(&mut self.grad_gates, Dim([batch, 3 * units]));
        ensure_shape(&mut self.grad_derived, Dim([units, units]));
        self.grad_next_hidden.fill(0.0);
        self.grad_derived.fill(0.0);

        let mode = self.synthesis_gradient;
        let update_recurrent = match mode {
            SynthesisGradient::Exact => self.derived_weight.slice(s![input_dim.., ..]),
            SynthesisGradient::Passthrough => self.weight.slice(s![input_dim.., ..units]),
        };
        let reset_recurrent = self.weight.slice(s![input_dim.., units..2 * units]);
        let candidate_recurrent = self.weight.slice(s![input_dim.., 2 * units..]);
        let input_weight = self.weight.slice(s![..input_dim, ..]);
        let parallel = batch * units >= CELL_PARALLEL_THRESHOLD;

        for t in (0..timesteps).rev() {
            // h_t is both an output and the next step's recurrent input
            self.grad_next_hidden += &grad_output.index_axis(Axis(1), t);

            let prev_hidden = if t == 0 {
                self.initial_hidden.view()
            } else {
                self.output.index_axis(Axis(1), t - 1)
            };
            let gates_t = self.gates.index_axis(Axis(1), t);
            let x_t = input.index_axis(Axis(1), t);

            {
                let (mut grad_update, rest) = self.grad_gates.view_mut().split_at(Axis(1), units);
                let (mut grad_reset, mut grad_candidate) = rest.split_at(Axis(1), units);
                let (update, rest) = gates_t.split_at(Axis(1), units);
                let (reset, candidate) = rest.split_at(Axis(1), units);

                zip_for_each!(
                    parallel,
                    Zip::from(&mut grad_update)
                        .and(&mut grad_candidate)
                        .and(&self.grad_next_hidden)
                        .and(&update)
                        .and(&candidate)
                        .and(&prev_hidden),
                    |gi, gg, &dh, &i, &g, &p| {
                        *gg = (1.0 - g * g) * i * dh;
                        *gi = i * (1.0 - i) * (dh * g - dh * p);
                    }
                );

                // gradient with respect to h_{t-1} ⊙ r_t
                general_mat_mul(
                    1.0,
                    &grad_candidate,
                    &candidate_recurrent.t(),
                    0.0,
                    &mut self.scratch,
                );
                zip_for_each!(
                    parallel,
                    Zip::from(&mut grad_reset)
                        .and(&reset)
                        .and(&prev_hidden)
                        .and(&self.scratch),
                    |gr, &r, &p, &d| *gr = r * (1.0 - r) * p * d
                );

                zip_for_each!(
                    parallel,
                    Zip::from(&mut self.grad_next_hidden)
                        .and(&update)
                        .and(&reset)
                        .and(&self.scratch),
                    |dh, &i, &r, &d| *dh = (1.0 - i) * *dh + r * d
                );
                general_mat_mul(
                    1.0,
                    &grad_update,
                    &update_recurrent.t(),
                    1.0,
                    &mut self.grad_next_hidden,
                );
                general_mat_mul(
                    1.0,
                    &grad_reset,
                    &reset_recurrent.t(),
                    1.0,
                    &mut self.grad_next_hidden,
                );

                let mut grad_hidden_weight = self.grad_weight.slice_mut(s![input_dim.., ..]);
                match mode {
                    SynthesisGradient::Exact => general_mat_mul(
                        1.0,
                        &prev_hidden.t(),
                        &grad_update,
                        1.0,
                        &mut self.grad_derived,
                    ),
                    SynthesisGradient::Passthrough => general_mat_mul(
                        1.0,
                        &prev_hidden.t(),
                        &grad_update,
                        1.0,
                        &mut grad_hidden_weight.slice_mut(s![.., ..units]),
                    ),
                }
                general_mat_mul(
                    1.0,
                    &prev_hidden.t(),
                    &grad_reset,
                    1.0,
                    &mut grad_hidden_weight.slice_mut(s![.., units..2 * units]),
                );
                zip_for_each!(
                    parallel,
                    Zip::from(&mut self.scratch).and(&prev_hidden).and(&reset),
                    |d, &p, &r| *d = p * r
                );
                general_mat_mul(
                    1.0,
                    &self.scratch.t(),
                    &grad_candidate,
                    1.0,
                    &mut grad_hidden_weight.slice_mut(s![.., 2 * units..]),
                );
            }

            general_mat_mul(
                1.0,
                &self.grad_gates,
                &input_weight.t(),
                0.0,
                &mut self.grad_input.index_axis_mut(Axis(1), t),
            );
            general_mat_mul(
                1.0,
                &x_t.t(),
                &self.grad_gates,
                1.0,
                &mut self.grad_weight.slice_mut(s![..input_dim, ..]),
            );
            for row in self.grad_gates.rows() {
                self.grad_bias += &row;
            }
        }

        if mode == SynthesisGradient::Exact {
            accumulate_circulant_adjoint(
                self.grad_derived.view(),
                self.block_size,
                self.grad_weight.slice_mut(s![input_dim.., ..units]),
            )?;
        }

        self.grad_initial_hidden.assign(&self.grad_next_hidden);
        self.grad_initial_cell.assign(&self.grad_next_hidden);

        Ok(CellGradients {
            input: self.grad_input.view(),
            hidden: record
                .hidden_supplied
                .then(|| self.grad_initial_hidden.view()),
            cell: record.cell_supplied.then(|| self.grad_initial_cell.view()),
        })
    }

    /// Returns the number of input features per timestep
    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    /// Returns the hidden state width
    pub fn units(&self) -> usize {
        self.units
    }

    /// Returns the tile side of the update-gate weight synthesis
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Returns whether final states are carried into the next forward call
    pub fn remember_states(&self) -> bool {
        self.remember_states
    }

    /// Returns the gradient routing mode of the synthesized block
    pub fn synthesis_gradient(&self) -> SynthesisGradient {
        self.synthesis_gradient
    }

    /// Returns the weight with shape (input_dim + units, 3 * units)
    pub fn weight(&self) -> &Array2<f64> {
        &self.weight
    }

    /// Returns the bias with length 3 * units
    pub fn bias(&self) -> &Array1<f64> {
        &self.bias
    }

    /// Returns the accumulated weight gradient
    pub fn grad_weight(&self) -> &Array2<f64> {
        &self.grad_weight
    }

    /// Returns the accumulated bias gradient
    pub fn grad_bias(&self) -> &Array1<f64> {
        &self.grad_bias
    }

    /// Returns the hidden states of the most recent forward call
    pub fn output(&self) -> ArrayView3<'_, f64> {
        self.output.view()
    }

    /// Returns the update, reset and candidate activations of the most recent forward call,
    /// shape (batch, timesteps, 3 * units)
    pub fn gates(&self) -> ArrayView3<'_, f64> {
        self.gates.view()
    }

    /// Returns the derived weight synthesized by the most recent forward call
    pub fn derived_weight(&self) -> ArrayView2<'_, f64> {
        self.derived_weight.view()
    }

    /// Returns the final `(hidden, cell)` state of the most recent forward call, if any
    pub fn final_state(&self) -> Option<(ArrayView2<'_, f64>, ArrayView2<'_, f64>)> {
        self.forward_record
            .map(|_| (self.final_hidden.view(), self.final_cell.view()))
    }
}

impl Parameterized for CirculantGRU {
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
        CirculantGRU::zero_gradients(self);
    }
}

/// Fills `target` from the supplied state, the carried state, or zeros, in that order.
fn load_initial_state(
    target: &mut Array2<f64>,
    supplied: Option<ArrayView2<'_, f64>>,
    carried: Option<&Array2<f64>>,
    batch: usize,
    units: usize,
) {
    ensure_shape(target, Dim([batch, units]));
    match (supplied, carried) {
        (Some(state), _) => target.assign(&state),
        (None, Some(state)) => target.assign(state),
        (None, None) => target.fill(0.0),
    }
}

/// Computes the gates and the new hidden state of one timestep.
///
/// `reset_hidden` is scratch space for `h_{t-1} ⊙ r_t`.
fn forward_step(
    x_t: ArrayView2<'_, f64>,
    prev_hidden: ArrayView2<'_, f64>,
    weights: &StepWeights<'_>,
    mut gates: ArrayViewMut2<'_, f64>,
    mut hidden: ArrayViewMut2<'_, f64>,
    mut reset_hidden: ArrayViewMut2<'_, f64>,
    parallel: bool,
) {
    let units = hidden.ncols();
    gates.assign(&weights.bias);
    general_mat_mul(1.0, &x_t, &weights.input, 1.0, &mut gates);

    let (mut update, rest) = gates.split_at(Axis(1), units);
    let (mut reset, mut candidate) = rest.split_at(Axis(1), units);

    general_mat_mul(1.0, &prev_hidden, &weights.update_recurrent, 1.0, &mut update);
    general_mat_mul(1.0, &prev_hidden, &weights.reset_recurrent, 1.0, &mut reset);
    zip_for_each!(
        parallel,
        Zip::from(&mut update).and(&mut reset),
        |i, r| {
            *i = sigmoid(*i);
            *r = sigmoid(*r);
        }
    );

    zip_for_each!(
        parallel,
        Zip::from(&mut reset_hidden).and(&prev_hidden).and(&reset),
        |rh, &p, &r| *rh = p * r
    );
    general_mat_mul(
        1.0,
        &reset_hidden,
        &weights.candidate_recurrent,
        1.0,
        &mut candidate,
    );

    zip_for_each!(
        parallel,
        Zip::from(&mut hidden)
            .and(&mut candidate)
            .and(&update)
            .and(&prev_hidden),
        |h, g, &i, &p| {
            *g = g.tanh();
            *h = (1.0 - i) * p + i * *g;
        }
    );
}
