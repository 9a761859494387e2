use super::*;

/// Validates that a dimension value is greater than 0
///
/// # Parameters
///
/// - `value` - The dimension value to validate
/// - `name` - The name of the dimension for error messages
///
/// # Returns
///
/// * `Ok(())` if validation passes
/// * `Err(ModelError)` if validation fails
pub(super) fn validate_dimension_greater_than_zero(
    value: usize,
    name: &str,
) -> Result<(), ModelError> {
    if value == 0 {
        return Err(ModelError::InputValidationError(format!(
            "{} must be greater than 0",
            name
        )));
    }
    Ok(())
}

/// Validates input dimensions for recurrent layers
///
/// # Parameters
///
/// - `input_dim` - The input dimension to validate
/// - `units` - The units dimension to validate
///
/// # Returns
///
/// * `Ok(())` if validation passes
/// * `Err(ModelError)` if validation fails
pub(super) fn validate_recurrent_dimensions(
    input_dim: usize,
    units: usize,
) -> Result<(), ModelError> {
    validate_dimension_greater_than_zero(input_dim, "input_dim")?;
    validate_dimension_greater_than_zero(units, "units")?;
    Ok(())
}

/// Validates a (batch, timesteps, features) sequence against the expected feature width
///
/// # Parameters
///
/// - `input` - The input sequence to validate
/// - `input_dim` - Expected number of features per timestep
///
/// # Returns
///
/// * `Ok((batch, timesteps))` if validation passes
/// * `Err(ModelError)` if the sequence is empty or has the wrong feature width
pub(super) fn validate_sequence_input(
    input: &ArrayView3<'_, f64>,
    input_dim: usize,
) -> Result<(usize, usize), ModelError> {
    let (batch, timesteps, features) = input.dim();
    validate_dimension_greater_than_zero(batch, "batch size")?;
    validate_dimension_greater_than_zero(timesteps, "sequence length")?;
    if features != input_dim {
        return Err(ModelError::InputValidationError(format!(
            "input has {} features per timestep, expected {}",
            features, input_dim
        )));
    }
    Ok((batch, timesteps))
}

/// Validates that a supplied state has shape (batch, units)
///
/// # Parameters
///
/// - `state` - The state to validate
/// - `batch` - Expected batch size
/// - `units` - Expected state width
/// - `name` - The name of the state for error messages
///
/// # Returns
///
/// * `Ok(())` if validation passes
/// * `Err(ModelError)` if validation fails
pub(super) fn validate_state_shape(
    state: &ArrayView2<'_, f64>,
    batch: usize,
    units: usize,
    name: &str,
) -> Result<(), ModelError> {
    if state.dim() != (batch, units) {
        return Err(ModelError::InputValidationError(format!(
            "{} must have shape ({}, {}), got {:?}",
            name,
            batch,
            units,
            state.shape()
        )));
    }
    Ok(())
}
