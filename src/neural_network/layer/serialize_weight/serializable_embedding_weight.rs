use super::*;

/// Serializable representation of an Embedding table.
///
/// # Fields
///
/// - `weight` - Embedding table stored as one vector per token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializableEmbeddingWeight {
    pub weight: Vec<Vec<f64>>,
}

impl SerializableEmbeddingWeight {
    /// Captures the current table of `layer`.
    pub fn from_layer(layer: &Embedding) -> Self {
        Self {
            weight: array2_to_vec2(layer.weight()),
        }
    }
}

impl ApplyWeights<Embedding> for SerializableEmbeddingWeight {
    fn apply_to_layer(&self, layer: &mut Embedding) -> Result<(), IoError> {
        layer.set_weights(vec2_to_array2(&self.weight)?)?;
        Ok(())
    }
}
