//! Error types for the vehicle price pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PricingError>;

/// Main error type shared by the encoder, the regressors and the serving path
#[derive(Error, Debug)]
pub enum PricingError {
    #[error("Not fitted: {0}")]
    NotFitted(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dimension mismatch: expected {expected} features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Artifact missing: {}", path.display())]
    ArtifactMissing { path: PathBuf },

    #[error("Artifact corrupt: {} ({reason})", path.display())]
    ArtifactCorrupt { path: PathBuf, reason: String },

    #[error("Validation error at record {index}: {reason}")]
    Validation { index: usize, reason: String },

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Reload signal failed: {0}")]
    ReloadSignal(String),
}

impl PricingError {
    /// True for errors raised while reading a persisted artifact pair
    pub fn is_artifact_error(&self) -> bool {
        matches!(
            self,
            PricingError::ArtifactMissing { .. } | PricingError::ArtifactCorrupt { .. }
        )
    }
}

impl From<polars::error::PolarsError> for PricingError {
    fn from(err: polars::error::PolarsError) -> Self {
        PricingError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for PricingError {
    fn from(err: serde_json::Error) -> Self {
        PricingError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for PricingError {
    fn from(err: bincode::Error) -> Self {
        PricingError::SerializationError(err.to_string())
    }
}

impl From<reqwest::Error> for PricingError {
    fn from(err: reqwest::Error) -> Self {
        PricingError::ReloadSignal(err.to_string())
    }
}

impl From<ndarray::ShapeError> for PricingError {
    fn from(err: ndarray::ShapeError) -> Self {
        PricingError::ComputationError(format!("invalid shape: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PricingError::DimensionMismatch { expected: 7, actual: 6 };
        assert_eq!(err.to_string(), "Dimension mismatch: expected 7 features, got 6");

        let err = PricingError::Validation { index: 3, reason: "seats out of range".to_string() };
        assert_eq!(err.to_string(), "Validation error at record 3: seats out of range");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PricingError = io_err.into();
        assert!(matches!(err, PricingError::IoError(_)));
    }

    #[test]
    fn test_artifact_error_classification() {
        let missing = PricingError::ArtifactMissing { path: PathBuf::from("models/model.bin") };
        assert!(missing.is_artifact_error());
        assert!(missing.to_string().contains("models/model.bin"));
        assert!(!PricingError::NotFitted("encoder".into()).is_artifact_error());
    }
}
