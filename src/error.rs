//! Error types for autoencoder anomaly detection

use thiserror::Error;

/// Result type alias for anomaly detection operations
pub type Result<T> = std::result::Result<T, AnomalyError>;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum AnomalyError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Invalid architecture: {0}")]
    ArchitectureError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Threshold error: {0}")]
    ThresholdError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Computation error: {0}")]
    ComputationError(String),
}

impl AnomalyError {
    pub(crate) fn invalid_parameter(
        name: &str,
        value: impl std::fmt::Display,
        reason: &str,
    ) -> Self {
        AnomalyError::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn shape(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        AnomalyError::ShapeError {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

impl From<polars::error::PolarsError> for AnomalyError {
    fn from(err: polars::error::PolarsError) -> Self {
        AnomalyError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for AnomalyError {
    fn from(err: serde_json::Error) -> Self {
        AnomalyError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for AnomalyError {
    fn from(err: ndarray::ShapeError) -> Self {
        AnomalyError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AnomalyError::ArchitectureError("encoder too short".to_string());
        assert_eq!(err.to_string(), "Invalid architecture: encoder too short");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: AnomalyError = io_err.into();
        assert!(matches!(err, AnomalyError::IoError(_)));
    }

    #[test]
    fn test_invalid_parameter_message() {
        let err = AnomalyError::invalid_parameter("beta", 1.5, "must lie in [0, 1]");
        assert_eq!(err.to_string(), "Invalid parameter: beta = 1.5, must lie in [0, 1]");
    }
}
