use super::*;

/// Adam optimizer implementation.
///
/// An optimization algorithm that computes individual adaptive learning
/// rates for different parameters from estimates of first and second moments
/// of the gradients. Moment estimates are bias corrected and sized lazily to the
/// flat parameter vector on the first step.
///
/// # Examples
/// ```rust
/// use rustyrnn::neural_network::{Adam, Optimizer};
/// use ndarray::array;
///
/// let mut adam = Adam::new(0.1, 0.9, 0.999, 1e-8).unwrap();
/// let mut params = array![1.0, -1.0];
/// adam.step(params.view_mut(), array![0.5, -0.5].view()).unwrap();
/// // the first bias-corrected step moves every parameter by about the learning rate
/// assert!((params[0] - 0.9).abs() < 1e-6);
/// assert!((params[1] + 0.9).abs() < 1e-6);
/// ```
#[derive(Debug, Clone)]
pub struct Adam {
    /// Learning rate controlling the size of parameter updates.
    learning_rate: f64,
    /// Exponential decay rate for the first moment estimates.
    beta1: f64,
    /// Exponential decay rate for the second moment estimates.
    beta2: f64,
    /// Small constant added for numerical stability.
    epsilon: f64,
    /// Current timestep, incremented with each update.
    t: i32,
    m: Array1<f64>,
    v: Array1<f64>,
}

impl Adam {
    /// Creates a new Adam optimizer with the specified parameters.
    ///
    /// # Parameters
    ///
    /// - `learning_rate` - Step size for parameter updates
    /// - `beta1` - Decay rate for the first moment estimates (typically 0.9)
    /// - `beta2` - Decay rate for the second moment estimates (typically 0.999)
    /// - `epsilon` - Small constant for numerical stability (typically 1e-8)
    ///
    /// # Returns
    ///
    /// - `Result<Self, ModelError>` - A new Adam optimizer instance or an error
    ///
    /// # Errors
    ///
    /// - `ModelError::InputValidationError` - If any hyperparameter is out of range
    pub fn new(
        learning_rate: f64,
        beta1: f64,
        beta2: f64,
        epsilon: f64,
    ) -> Result<Self, ModelError> {
        validate_learning_rate(learning_rate)?;
        validate_decay_rate(beta1, "beta1")?;
        validate_decay_rate(beta2, "beta2")?;
        validate_epsilon(epsilon)?;

        Ok(Self {
            learning_rate,
            beta1,
            beta2,
            epsilon,
            t: 0,
            m: Array1::zeros(0),
            v: Array1::zeros(0),
        })
    }

    /// Returns the number of steps taken so far
    pub fn timestep(&self) -> i32 {
        self.t
    }
}

impl Optimizer for Adam {
    fn step(
        &mut self,
        mut parameters: ArrayViewMut1<'_, f64>,
        gradients: ArrayView1<'_, f64>,
    ) -> Result<(), ModelError> {
        prepare_state(&mut self.m, &parameters, &gradients)?;
        prepare_state(&mut self.v, &parameters, &gradients)?;
        self.t += 1;

        let (beta1, beta2, epsilon) = (self.beta1, self.beta2, self.epsilon);
        let step_size = self.learning_rate;
        let bias_correction1 = 1.0 - beta1.powi(self.t);
        let bias_correction2 = 1.0 - beta2.powi(self.t);
        let update = |p: &mut f64, m: &mut f64, v: &mut f64, &g: &f64| {
            *m = beta1 * *m + (1.0 - beta1) * g;
            *v = beta2 * *v + (1.0 - beta2) * g * g;
            let m_hat = *m / bias_correction1;
            let v_hat = *v / bias_correction2;
            *p -= step_size * m_hat / (v_hat.sqrt() + epsilon);
        };

        let zip = Zip::from(&mut parameters)
            .and(&mut self.m)
            .and(&mut self.v)
            .and(&gradients);
        if parameters_len_is_large(&gradients) {
            zip.par_for_each(update);
        } else {
            zip.for_each(update);
        }
        Ok(())
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, learning_rate: f64) -> Result<(), ModelError> {
        validate_learning_rate(learning_rate)?;
        self.learning_rate = learning_rate;
        Ok(())
    }
}
