use super::*;

/// Serializable representation of CirculantGRU cell weights.
///
/// Only the base parameters are stored; the derived update-gate block is synthesized again on
/// the next forward call.
///
/// # Fields
///
/// - `block_size` - Tile side of the update-gate weight synthesis
/// - `weight` - Combined (input_dim + units) x 3 * units weight stored as nested vectors
/// - `bias` - Combined bias of length 3 * units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializableCirculantGRUWeight {
    pub block_size: usize,
    pub weight: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
}

impl SerializableCirculantGRUWeight {
    /// Captures the current parameters of `cell`.
    pub fn from_layer(cell: &CirculantGRU) -> Self {
        Self {
            block_size: cell.block_size(),
            weight: array2_to_vec2(cell.weight()),
            bias: cell.bias().to_vec(),
        }
    }
}

impl ApplyWeights<CirculantGRU> for SerializableCirculantGRUWeight {
    fn apply_to_layer(&self, layer: &mut CirculantGRU) -> Result<(), IoError> {
        if self.block_size != layer.block_size() {
            return Err(IoError::ModelError(ModelError::InputValidationError(format!(
                "checkpoint uses block_size {} but the cell uses {}",
                self.block_size,
                layer.block_size()
            ))));
        }
        let weight_array = vec2_to_array2(&self.weight)?;
        layer.set_weights(weight_array, vec_to_array1(&self.bias))?;
        Ok(())
    }
}
