//! Error types for the location reliability layer
//!
//! Configuration loading and record (de)serialization return these errors. The
//! composition root also wraps source failures and validation rejections in them
//! before routing to the recovery handler. The cache and validator never fail,
//! and the scheduler folds fetch failures into task state.

use thiserror::Error;

/// Main error type for location reliability operations
#[derive(Error, Debug)]
pub enum LocationError {
    /// Configuration error - invalid limits or unparsable environment overrides
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Serialization/Deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The external data source failed for an operation
    #[error("Source error during {operation}: {message}")]
    SourceError { operation: String, message: String },

    /// A record was rejected by validation
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Result type alias for location reliability operations
pub type Result<T> = std::result::Result<T, LocationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = LocationError::ConfigError("max_entries must be greater than 0".to_string());
        assert_eq!(
            error.to_string(),
            "Configuration error: max_entries must be greater than 0"
        );

        let source_error = LocationError::SourceError {
            operation: "fetch_location".to_string(),
            message: "503 Service Unavailable".to_string(),
        };
        assert!(source_error.to_string().contains("fetch_location"));
        assert!(source_error.to_string().contains("503"));
    }

    #[test]
    fn test_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let error: LocationError = json_error.into();
        assert!(matches!(error, LocationError::SerializationError(_)));
        assert!(error.to_string().starts_with("Serialization error:"));
    }

    #[test]
    fn test_source_error_survives_anyhow_context() {
        let source_error = LocationError::SourceError {
            operation: "get_location".to_string(),
            message: "location loc-1".to_string(),
        };
        let wrapped = anyhow::anyhow!("connection reset by peer").context(source_error);

        assert!(matches!(
            wrapped.downcast_ref::<LocationError>(),
            Some(LocationError::SourceError { .. })
        ));
        assert_eq!(wrapped.root_cause().to_string(), "connection reset by peer");
    }
}
