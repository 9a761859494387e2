use super::*;

/// Serializable representation of Dense layer weights.
///
/// # Fields
///
/// - `weight` - 2D weight matrix stored as nested vectors
/// - `bias` - Bias vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializableDenseWeight {
    pub weight: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
}

impl SerializableDenseWeight {
    /// Captures the current parameters of `layer`.
    pub fn from_layer(layer: &Dense) -> Self {
        Self {
            weight: array2_to_vec2(layer.weight()),
            bias: layer.bias().to_vec(),
        }
    }
}

impl ApplyWeights<Dense> for SerializableDenseWeight {
    fn apply_to_layer(&self, layer: &mut Dense) -> Result<(), IoError> {
        let weight_array = vec2_to_array2(&self.weight)?;
        layer.set_weights(weight_array, vec_to_array1(&self.bias))?;
        Ok(())
    }
}
