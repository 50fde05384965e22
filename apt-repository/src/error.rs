//! Error types for the APT repository library.

/// Result type for APT repository operations.
pub type Result<T> = std::result::Result<T, AptRepositoryError>;

/// Errors that can occur when working with APT repository metadata.
#[derive(Debug, thiserror::Error)]
pub enum AptRepositoryError {
    /// I/O error occurred during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisting a temporary index file failed.
    #[error("Failed to move index file into place: {0}")]
    Persist(#[from] tempfile::PersistError),

    /// Malformed Release or index data.
    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    /// Missing required field.
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Invalid field value.
    #[error("Invalid field value for '{field}': {value}")]
    InvalidField { field: String, value: String },

    /// Unknown compression name.
    #[error("Unknown compression format: {0}")]
    UnknownCompression(String),
}

impl AptRepositoryError {
    /// Create a new invalid metadata error.
    pub fn invalid_metadata<S: Into<String>>(msg: S) -> Self {
        Self::InvalidMetadata(msg.into())
    }

    /// Create a new missing field error.
    pub fn missing_field<S: Into<String>>(field: S) -> Self {
        Self::MissingField(field.into())
    }

    /// Create a new invalid field error.
    pub fn invalid_field<S: Into<String>>(field: S, value: S) -> Self {
        Self::InvalidField {
            field: field.into(),
            value: value.into(),
        }
    }
}
