use super::*;

/// Validates that `block_size` tiles a `rows x cols` weight block exactly.
///
/// # Parameters
///
/// - `rows` - Number of rows of the weight block
/// - `cols` - Number of columns of the weight block
/// - `block_size` - Side length of the square tiles
///
/// # Returns
///
/// - `Ok(())` - If `block_size` is nonzero and divides both dimensions
/// - `Err(ModelError::UnsupportedParameter)` - Otherwise
pub fn validate_block_size(rows: usize, cols: usize, block_size: usize) -> Result<(), ModelError> {
    if block_size == 0 {
        return Err(ModelError::UnsupportedParameter(
            "block_size must be greater than 0".to_string(),
        ));
    }
    if rows % block_size != 0 || cols % block_size != 0 {
        return Err(ModelError::UnsupportedParameter(format!(
            "block_size {} does not evenly divide a {}x{} weight block",
            block_size, rows, cols
        )));
    }
    Ok(())
}

/// Synthesizes the block-circulant recurrent weight from the update-gate sub-blocks.
///
/// Returns a fresh `(D + H) x H` buffer: rows `0..D` hold the expansion of `w_x`, rows
/// `D..D + H` the expansion of `w_h`. See [`accumulate_circulant`] for the tile rule.
///
/// # Parameters
///
/// - `w_h` - Hidden-to-update-gate block with shape (H, H)
/// - `w_x` - Input-to-update-gate block with shape (D, H)
/// - `block_size` - Side length of the square tiles
///
/// # Returns
///
/// - `Ok(Array2<f64>)` - The derived weight with shape (D + H, H)
/// - `Err(ModelError)` - If the shapes disagree or `block_size` does not tile them
///
/// # Examples
/// ```rust
/// use rustyrnn::neural_network::synthesize;
/// use ndarray::array;
///
/// let w_h = array![[1.0, 2.0], [3.0, 4.0]];
/// let w_x = array![[5.0, 6.0], [7.0, 8.0]];
/// let derived = synthesize(w_h.view(), w_x.view(), 2).unwrap();
/// // every tile row after the first is the previous row rotated by one
/// assert_eq!(derived, array![[5.0, 6.0], [6.0, 5.0], [1.0, 2.0], [2.0, 1.0]]);
/// ```
pub fn synthesize(
    w_h: ArrayView2<'_, f64>,
    w_x: ArrayView2<'_, f64>,
    block_size: usize,
) -> Result<Array2<f64>, ModelError> {
    let mut derived = Array2::zeros((w_x.nrows() + w_h.nrows(), w_h.ncols()));
    accumulate_circulant(w_h, w_x, block_size, derived.view_mut())?;
    Ok(derived)
}

/// Accumulates the block-circulant expansion of `w_x` and `w_h` into `derived`.
///
/// For every `block_size x block_size` tile with top-left corner `(r0, c0)`:
///
/// `derived[r0 + k][c0 + j] += source[r0][c0 + (j - k) mod block_size]`
///
/// so the first row of each output tile is the first row of the source tile and every later
/// row is the previous output row rotated by one, the last column moving to the front. Only
/// the first row of each source tile is read. The buffer is added to, never overwritten:
/// callers clear it first when they need a fresh result.
///
/// # Parameters
///
/// - `w_h` - Hidden-to-update-gate block with shape (H, H)
/// - `w_x` - Input-to-update-gate block with shape (D, H)
/// - `block_size` - Side length of the square tiles
/// - `derived` - Output buffer with shape (D + H, H)
///
/// # Returns
///
/// - `Ok(())` - The expansion was accumulated
/// - `Err(ModelError::InputValidationError)` - If the shapes disagree
/// - `Err(ModelError::UnsupportedParameter)` - If `block_size` does not tile both blocks
pub fn accumulate_circulant(
    w_h: ArrayView2<'_, f64>,
    w_x: ArrayView2<'_, f64>,
    block_size: usize,
    mut derived: ArrayViewMut2<'_, f64>,
) -> Result<(), ModelError> {
    let units = w_h.ncols();
    if w_h.nrows() != units || w_x.ncols() != units {
        return Err(ModelError::InputValidationError(format!(
            "update-gate blocks must have shapes (H, H) and (D, H), got {:?} and {:?}",
            w_h.shape(),
            w_x.shape()
        )));
    }
    if derived.dim() != (w_x.nrows() + units, units) {
        return Err(ModelError::InputValidationError(format!(
            "derived weight must have shape ({}, {}), got {:?}",
            w_x.nrows() + units,
            units,
            derived.shape()
        )));
    }
    validate_block_size(units, units, block_size)?;
    validate_block_size(w_x.nrows(), units, block_size)?;

    let (input_part, hidden_part) = derived.view_mut().split_at(Axis(0), w_x.nrows());
    expand_tiles(w_x, block_size, input_part);
    expand_tiles(w_h, block_size, hidden_part);
    Ok(())
}

/// Accumulates the adjoint of the circulant expansion for one partition.
///
/// Given the gradient of a loss with respect to an expanded block, adds the gradient with
/// respect to the source block it was expanded from:
///
/// `grad_source[r0][c0 + m] += sum_k grad_derived[r0 + k][c0 + (m + k) mod block_size]`
///
/// Rows of `grad_source` other than the first row of each tile do not influence the
/// expansion and receive nothing.
///
/// # Parameters
///
/// - `grad_derived` - Gradient with respect to the expanded block
/// - `block_size` - Side length of the square tiles
/// - `grad_source` - Gradient buffer of the source block, same shape as `grad_derived`
///
/// # Returns
///
/// - `Ok(())` - The adjoint was accumulated
/// - `Err(ModelError)` - If the shapes disagree or `block_size` does not tile them
pub fn accumulate_circulant_adjoint(
    grad_derived: ArrayView2<'_, f64>,
    block_size: usize,
    mut grad_source: ArrayViewMut2<'_, f64>,
) -> Result<(), ModelError> {
    if grad_derived.dim() != grad_source.dim() {
        return Err(ModelError::InputValidationError(format!(
            "gradient shapes differ: {:?} vs {:?}",
            grad_derived.shape(),
            grad_source.shape()
        )));
    }
    let (rows, cols) = grad_derived.dim();
    validate_block_size(rows, cols, block_size)?;

    for r0 in (0..rows).step_by(block_size) {
        for c0 in (0..cols).step_by(block_size) {
            for m in 0..block_size {
                let mut acc = 0.0;
                for k in 0..block_size {
                    acc += grad_derived[[r0 + k, c0 + (m + k) % block_size]];
                }
                grad_source[[r0, c0 + m]] += acc;
            }
        }
    }
    Ok(())
}

fn expand_tiles(
    source: ArrayView2<'_, f64>,
    block_size: usize,
    mut target: ArrayViewMut2<'_, f64>,
) {
    for r0 in (0..source.nrows()).step_by(block_size) {
        for c0 in (0..source.ncols()).step_by(block_size) {
            for k in 0..block_size {
                for j in 0..block_size {
                    target[[r0 + k, c0 + j]] +=
                        source[[r0, c0 + (j + block_size - k) % block_size]];
                }
            }
        }
    }
}
