use crate::error::IoError;
use ndarray::{Array1, Array2};

/// Converts nested row vectors into a 2D array, failing on ragged rows.
pub(super) fn vec2_to_array2(vec: &[Vec<f64>]) -> Result<Array2<f64>, IoError> {
    let rows = vec.len();
    let cols = if rows > 0 { vec[0].len() } else { 0 };
    let flat: Vec<f64> = vec.iter().flat_map(|row| row.iter().cloned()).collect();
    Array2::from_shape_vec((rows, cols), flat).map_err(|e| {
        IoError::StdIoError(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            e.to_string(),
        ))
    })
}

/// Converts a 2D array into nested row vectors.
pub(super) fn array2_to_vec2(array: &Array2<f64>) -> Vec<Vec<f64>> {
    array.outer_iter().map(|row| row.to_vec()).collect()
}

pub(super) fn vec_to_array1(vec: &[f64]) -> Array1<f64> {
    Array1::from_vec(vec.to_vec())
}
