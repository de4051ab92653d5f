use thiserror::Error;

/// Result type for Minerva operations
pub type Result<T> = std::result::Result<T, MinervaError>;

/// Main error type for the Minerva engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MinervaError {
    /// A layer or network was configured with unusable parameters
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter {
        name: String,
        reason: String,
    },

    /// A volume does not have the shape the layer recorded
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        expected: String,
        actual: String,
    },

    /// An operation was called out of order or on the wrong layer kind
    #[error("Precondition violated: {0}")]
    PreconditionViolation(String),

    /// IO errors (file operations)
    #[error("IO error: {0}")]
    IoError(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<std::io::Error> for MinervaError {
    fn from(err: std::io::Error) -> Self {
        MinervaError::IoError(err.to_string())
    }
}

impl From<bincode::Error> for MinervaError {
    fn from(err: bincode::Error) -> Self {
        MinervaError::SerializationError(err.to_string())
    }
}

impl From<serde_json::Error> for MinervaError {
    fn from(err: serde_json::Error) -> Self {
        MinervaError::SerializationError(err.to_string())
    }
}

// Helper functions for common error patterns
impl MinervaError {
    pub fn dimension_mismatch<S: Into<String>>(expected: S, actual: S) -> Self {
        MinervaError::DimensionMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn invalid_parameter<S: Into<String>>(name: S, reason: S) -> Self {
        MinervaError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn precondition<S: Into<String>>(reason: S) -> Self {
        MinervaError::PreconditionViolation(reason.into())
    }

    /// Whether this error reports a construction-time configuration problem
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, MinervaError::InvalidParameter { .. })
    }
}
