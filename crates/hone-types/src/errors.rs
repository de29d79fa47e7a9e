use thiserror::Error;

/// Main error type for the hone workspace
#[derive(Error, Debug)]
pub enum HoneError {
    #[error("Duplicate parameter: {name} is already registered")]
    DuplicateParameter { name: String },

    #[error("Unknown parameter: {name}")]
    UnknownParameter { name: String },

    #[error("Invalid bounds for {name}: min {min} is greater than max {max}")]
    InvalidBounds { name: String, min: f64, max: f64 },

    #[error("Objective evaluation failed: {0}")]
    Objective(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for hone operations
pub type HoneResult<T> = Result<T, HoneError>;
