use std::fs::File;
use std::io::BufReader;

/// Error types that can occur during model operations
///
/// # Variants
///
/// - `InputValidationError` - indicates the input data or configuration does not meet the expected shape, range, or precondition
/// - `UnsupportedParameter` - indicates a parameterization the model refuses to run with (e.g. a partial backward scale, an indivisible block size)
/// - `ProcessingError` - indicates that there is something wrong while processing (e.g. backward without a matching forward)
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    InputValidationError(String),
    UnsupportedParameter(String),
    ProcessingError(String),
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelError::InputValidationError(msg) => write!(f, "Input validation error: {}", msg),
            ModelError::UnsupportedParameter(msg) => write!(f, "Unsupported parameter: {}", msg),
            ModelError::ProcessingError(msg) => write!(f, "Processing error: {}", msg),
        }
    }
}

impl std::error::Error for ModelError {}

/// Input/Output error types that can occur during checkpoint serialization and file operations
///
/// # Variants
///
/// - `StdIoError` - Wraps standard I/O errors from file system operations (reading, writing, file access)
/// - `JsonError` - Wraps JSON serialization/deserialization errors
/// - `ModelError` - Wraps model errors raised while applying loaded weights
#[derive(Debug)]
pub enum IoError {
    StdIoError(std::io::Error),
    JsonError(serde_json::Error),
    ModelError(ModelError),
}

impl IoError {
    pub fn load_in_buf_reader(path: &str) -> Result<BufReader<File>, IoError> {
        let file = File::open(path).map_err(IoError::StdIoError)?;
        Ok(BufReader::new(file))
    }
}

impl std::fmt::Display for IoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IoError::StdIoError(e) => write!(f, "IO error: {}", e),
            IoError::JsonError(e) => write!(f, "JSON error: {}", e),
            IoError::ModelError(e) => write!(f, "Model error: {}", e),
        }
    }
}

impl std::error::Error for IoError {}

impl From<ModelError> for IoError {
    fn from(e: ModelError) -> Self {
        IoError::ModelError(e)
    }
}
