use super::*;

/// RMSprop (Root Mean Square Propagation) optimizer.
///
/// Adapts per-parameter learning rates using a moving average of squared gradients:
///
/// - `s = rho * s + (1 - rho) * g^2`
/// - `p = p - learning_rate * g / (sqrt(s) + epsilon)`
///
/// # Fields
///
/// - `learning_rate` - Learning rate controlling the size of parameter updates
/// - `rho` - Decay rate for the moving average of squared gradients
/// - `epsilon` - Small constant added for numerical stability
/// - `cache` - Moving average of squared gradients, sized on the first step
#[derive(Debug, Clone)]
pub struct RMSprop {
    learning_rate: f64,
    rho: f64,
    epsilon: f64,
    cache: Array1<f64>,
}

impl RMSprop {
    /// Creates a new RMSprop optimizer with the specified parameters.
    ///
    /// Validates hyperparameters and initializes the optimizer.
    ///
    /// # Parameters
    ///
    /// - `learning_rate` - Step size for parameter updates
    /// - `rho` - Decay rate for moving average of squared gradients (typically 0.95)
    /// - `epsilon` - Small constant for numerical stability (typically 1e-8)
    ///
    /// # Returns
    ///
    /// - `Result<Self, ModelError>` - A new RMSprop optimizer instance or an error
    ///
    /// # Errors
    ///
    /// - `ModelError::InputValidationError` - If any hyperparameter is out of range
    pub fn new(learning_rate: f64, rho: f64, epsilon: f64) -> Result<Self, ModelError> {
        // input validation
        validate_learning_rate(learning_rate)?;
        validate_decay_rate(rho, "rho")?;
        validate_epsilon(epsilon)?;

        Ok(Self {
            learning_rate,
            rho,
            epsilon,
            cache: Array1::zeros(0),
        })
    }
}

impl Optimizer for RMSprop {
    fn step(
        &mut self,
        mut parameters: ArrayViewMut1<'_, f64>,
        gradients: ArrayView1<'_, f64>,
    ) -> Result<(), ModelError> {
        prepare_state(&mut self.cache, &parameters, &gradients)?;

        let (rho, epsilon, learning_rate) = (self.rho, self.epsilon, self.learning_rate);
        let update = |p: &mut f64, s: &mut f64, &g: &f64| {
            *s = rho * *s + (1.0 - rho) * g * g;
            *p -= learning_rate * g / (s.sqrt() + epsilon);
        };

        let zip = Zip::from(&mut parameters)
            .and(&mut self.cache)
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
