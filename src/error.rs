//! Custom error types for doc-history
//!
//! This module defines the error hierarchy for the crate using thiserror
//! for ergonomic error definitions.

use thiserror::Error;

/// The main error type for doc-history operations
#[derive(Error, Debug)]
pub enum HistoryError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Malformed input (empty chains, missing ids, bad selectors)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Entity not found errors
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// A chain hop names a relation the schema no longer declares as embedded
    #[error("Schema inconsistency: '{relation}' is not an embedded relation of {model}")]
    SchemaInconsistency { relation: String, model: String },

    /// The document an update record describes no longer exists
    #[error("Trackable missing: {0}")]
    TrackableMissing(String),

    /// Failures reported by the document store
    #[error("Store error: {0}")]
    Store(String),
}

impl HistoryError {
    /// Create a "not found" error for audit records
    pub fn record_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Audit record",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for documents
    pub fn document_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Document",
            identifier: identifier.into(),
        }
    }

    /// Create a schema inconsistency error
    pub fn schema_inconsistency(relation: impl Into<String>, model: impl Into<String>) -> Self {
        Self::SchemaInconsistency {
            relation: relation.into(),
            model: model.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a schema inconsistency
    pub fn is_schema_inconsistency(&self) -> bool {
        matches!(self, Self::SchemaInconsistency { .. })
    }

    /// Check if this is a missing trackable
    pub fn is_trackable_missing(&self) -> bool {
        matches!(self, Self::TrackableMissing(_))
    }
}

impl From<std::io::Error> for HistoryError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for HistoryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type alias for doc-history operations
pub type HistoryResult<T> = Result<T, HistoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HistoryError::Config("test error".into());
        assert_eq!(err.to_string(), "Configuration error: test error");
    }

    #[test]
    fn test_not_found_error() {
        let err = HistoryError::record_not_found("Order:1 v3");
        assert_eq!(err.to_string(), "Audit record not found: Order:1 v3");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_schema_inconsistency_error() {
        let err = HistoryError::schema_inconsistency("lineItems", "Order");
        assert_eq!(
            err.to_string(),
            "Schema inconsistency: 'lineItems' is not an embedded relation of Order"
        );
        assert!(err.is_schema_inconsistency());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: HistoryError = io_err.into();
        assert!(matches!(err, HistoryError::Io(_)));
    }
}
