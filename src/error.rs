//! Error types for ctxtrim
//!
//! Estimation imprecision, unknown pricing entries and no-op optimizations are
//! not errors in this crate; they always produce a best-effort value. The
//! variants below cover configuration problems and the persistence path used
//! when a compression is applied to a message store.

use thiserror::Error;

/// Main error type for ctxtrim operations
#[derive(Error, Debug)]
pub enum CtxtrimError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pricing table file could not be read or parsed
    #[error("Pricing error: {0}")]
    Pricing(String),

    /// Message storage errors (database open, query, decode)
    #[error("Storage error: {0}")]
    Storage(String),

    /// A store mutation failed while applying a compression
    ///
    /// `operation` names the store call that failed, e.g. `save_message` or
    /// `delete_message(42)`.
    #[error("Persistence failed during {operation}: {message}")]
    Persistence {
        /// The store operation that failed
        operation: String,
        /// Underlying failure description
        message: String,
    },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for ctxtrim operations
///
/// Uses `anyhow::Error` so callers get context chains while library code can
/// still downcast to [`CtxtrimError`].
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = CtxtrimError::Config("invalid format".to_string());
        assert_eq!(error.to_string(), "Configuration error: invalid format");
    }

    #[test]
    fn test_pricing_error_display() {
        let error = CtxtrimError::Pricing("missing file".to_string());
        assert_eq!(error.to_string(), "Pricing error: missing file");
    }

    #[test]
    fn test_storage_error_display() {
        let error = CtxtrimError::Storage("database connection failed".to_string());
        assert_eq!(
            error.to_string(),
            "Storage error: database connection failed"
        );
    }

    #[test]
    fn test_persistence_error_names_operation() {
        let error = CtxtrimError::Persistence {
            operation: "delete_message(7)".to_string(),
            message: "disk full".to_string(),
        };
        let s = error.to_string();
        assert!(s.contains("delete_message(7)"));
        assert!(s.contains("disk full"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: CtxtrimError = io_error.into();
        assert!(matches!(error, CtxtrimError::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{invalid json}").unwrap_err();
        let error: CtxtrimError = json_error.into();
        assert!(matches!(error, CtxtrimError::Serialization(_)));
    }

    #[test]
    fn test_yaml_error_conversion() {
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>("invalid: : yaml").unwrap_err();
        let error: CtxtrimError = yaml_error.into();
        assert!(matches!(error, CtxtrimError::Yaml(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CtxtrimError>();
    }
}
