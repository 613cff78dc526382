//! Error types for the metrix experiment pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, MetrixError>;

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum MetrixError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Schema drift in feature set '{feature_set}': {detail}")]
    SchemaDrift { feature_set: String, detail: String },

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Metric error: {0}")]
    MetricError(String),

    #[error("Metric mismatch for {metric} ({view}): manual = {manual}, direct = {direct}")]
    MetricMismatch {
        metric: String,
        view: String,
        manual: f64,
        direct: f64,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("External tool '{program}' failed: {detail}")]
    ExternalTool { program: String, detail: String },

    #[error("Report error: {0}")]
    ReportError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<polars::error::PolarsError> for MetrixError {
    fn from(err: polars::error::PolarsError) -> Self {
        MetrixError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for MetrixError {
    fn from(err: serde_json::Error) -> Self {
        MetrixError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for MetrixError {
    fn from(err: ndarray::ShapeError) -> Self {
        MetrixError::ShapeError {
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
        let err = MetrixError::DataError("test error".to_string());
        assert_eq!(err.to_string(), "Data error: test error");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: MetrixError = io_err.into();
        assert!(matches!(err, MetrixError::IoError(_)));
    }

    #[test]
    fn test_mismatch_display() {
        let err = MetrixError::MetricMismatch {
            metric: "precision".to_string(),
            view: "test".to_string(),
            manual: 0.5,
            direct: 0.25,
        };
        let msg = err.to_string();
        assert!(msg.contains("precision"));
        assert!(msg.contains("0.25"));
    }
}
