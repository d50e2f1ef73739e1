use thiserror::Error;

/// Main error type for LocText
#[derive(Error, Debug)]
pub enum LoctextError {
    /// Entity tagger service unreachable, erroring, or returning garbage
    #[error("Tagging unavailable: {0}")]
    TaggingUnavailable(String),

    /// Relation model and feature selection do not agree
    #[error("Model configuration error: {0}")]
    ModelConfiguration(String),

    /// Predicted entity or relation lacks what normalization needs
    #[error("Malformed prediction: {0}")]
    MalformedPrediction(String),

    /// Merge target absent from the store
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// Document store get/index/search failure
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Conditional write rejected because the document changed since it was read
    #[error("Version conflict on document: {0}")]
    VersionConflict(String),

    /// SQLite-backed store errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl LoctextError {
    /// Stable kind name used in per-item diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            LoctextError::TaggingUnavailable(_) => "TaggingUnavailable",
            LoctextError::ModelConfiguration(_) => "ModelConfigurationError",
            LoctextError::MalformedPrediction(_) => "MalformedPrediction",
            LoctextError::DocumentNotFound(_) => "DocumentNotFound",
            LoctextError::StoreUnavailable(_) | LoctextError::Database(_) => "StoreUnavailable",
            LoctextError::VersionConflict(_) => "VersionConflict",
            LoctextError::Io(_) => "Io",
            LoctextError::Json(_) => "Json",
            LoctextError::Config(_) => "Config",
            LoctextError::InvalidInput(_) => "InvalidInput",
        }
    }

    /// Whether this error should abort the whole process rather than one item.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LoctextError::ModelConfiguration(_) | LoctextError::Config(_))
    }
}

/// Convenient Result type using LoctextError
pub type Result<T> = std::result::Result<T, LoctextError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LoctextError::DocumentNotFound("12345".to_string());
        assert!(err.to_string().contains("Document not found"));
        assert!(err.to_string().contains("12345"));
    }

    #[test]
    fn test_error_from_rusqlite_reports_store_kind() {
        let rusqlite_err = rusqlite::Error::InvalidQuery;
        let err: LoctextError = rusqlite_err.into();
        assert!(matches!(err, LoctextError::Database(_)));
        assert_eq!(err.kind(), "StoreUnavailable");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: LoctextError = io_err.into();
        assert!(matches!(err, LoctextError::Io(_)));
    }

    #[test]
    fn test_only_configuration_errors_are_fatal() {
        assert!(LoctextError::ModelConfiguration("x".into()).is_fatal());
        assert!(!LoctextError::TaggingUnavailable("x".into()).is_fatal());
        assert!(!LoctextError::DocumentNotFound("x".into()).is_fatal());
    }
}
