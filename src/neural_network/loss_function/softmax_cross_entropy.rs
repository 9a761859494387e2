use crate::error::ModelError;
use crate::neural_network::LossFunction;
use ndarray::{Array1, Array3, ArrayView1, ArrayView2, ArrayView3, Axis, Zip};

/// Softmax cross entropy for sequence classification with integer targets.
///
/// Takes raw logits of shape (batch, timesteps, classes) and class indices of shape
/// (batch, timesteps). The loss is the mean negative log-likelihood over all
/// `batch * timesteps` positions, computed with a max-shifted log-softmax so large logits do
/// not overflow.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftmaxCrossEntropy;

impl SoftmaxCrossEntropy {
    /// Creates a new instance of SoftmaxCrossEntropy
    pub fn new() -> Self {
        Self
    }
}

/// Returns `log(sum(exp(row)))` computed around the row maximum.
fn log_sum_exp(row: ArrayView1<'_, f64>) -> f64 {
    let max = row.fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
    max + row.fold(0.0, |acc, &v| acc + (v - max).exp()).ln()
}

fn validate_targets(
    targets: &ArrayView2<'_, usize>,
    logits: &ArrayView3<'_, f64>,
) -> Result<(), ModelError> {
    let (batch, timesteps, classes) = logits.dim();
    if targets.dim() != (batch, timesteps) {
        return Err(ModelError::InputValidationError(format!(
            "targets have shape {:?} but logits have shape {:?}",
            targets.shape(),
            logits.shape()
        )));
    }
    if targets.is_empty() || classes == 0 {
        return Err(ModelError::InputValidationError(
            "targets and logits must not be empty".to_string(),
        ));
    }
    if let Some(&target) = targets.iter().find(|&&t| t >= classes) {
        return Err(ModelError::InputValidationError(format!(
            "target class {} is out of range for {} classes",
            target, classes
        )));
    }
    Ok(())
}

impl LossFunction for SoftmaxCrossEntropy {
    fn compute_loss(
        &self,
        targets: ArrayView2<'_, usize>,
        logits: ArrayView3<'_, f64>,
    ) -> Result<f64, ModelError> {
        validate_targets(&targets, &logits)?;
        let positions = targets.len();
        let classes = logits.shape()[2];

        let flat_logits = logits.to_shape((positions, classes)).map_err(|e| {
            ModelError::ProcessingError(format!("failed to flatten logits: {}", e))
        })?;
        let flat_targets: Array1<usize> = targets.iter().cloned().collect();

        let losses = Zip::from(flat_logits.rows())
            .and(&flat_targets)
            .par_map_collect(|row, &target| log_sum_exp(row) - row[target]);

        Ok(losses.sum() / positions as f64)
    }

    fn compute_grad(
        &self,
        targets: ArrayView2<'_, usize>,
        logits: ArrayView3<'_, f64>,
    ) -> Result<Array3<f64>, ModelError> {
        validate_targets(&targets, &logits)?;
        let scale = 1.0 / targets.len() as f64;

        let mut grad = logits.to_owned();
        Zip::from(grad.lanes_mut(Axis(2)))
            .and(&targets)
            .par_for_each(|mut row, &target| {
                let lse = log_sum_exp(row.view());
                row.mapv_inplace(|v| (v - lse).exp() * scale);
                row[target] -= scale;
            });
        Ok(grad)
    }
}
