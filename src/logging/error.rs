//! Logging error types

use std::io;
use thiserror::Error;

/// Result type for logging operations
pub type LogResult<T> = Result<T, LogError>;

/// Errors raised while building loggers or writing to sinks
#[derive(Debug, Error)]
pub enum LogError {
    /// Directory creation, file open, rename or write failure
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Lock poisoning and other invariant breaks
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "read-only");
        let log_err: LogError = io_err.into();
        assert!(matches!(log_err, LogError::Io(_)));
        assert!(log_err.to_string().starts_with("IO error"));
    }

    #[test]
    fn test_internal_error_display() {
        let err = LogError::Internal("registry lock poisoned".to_string());
        assert_eq!(err.to_string(), "internal error: registry lock poisoned");
    }

    #[test]
    fn test_variants_are_io_or_internal() {
        let errors = [
            LogError::from(io::Error::other("disk full")),
            LogError::Internal("router lock poisoned".to_string()),
        ];
        for err in errors {
            let kind = match &err {
                LogError::Io(_) => "io",
                LogError::Internal(_) => "internal",
            };
            assert!(err.to_string().to_lowercase().starts_with(kind));
        }
    }
}
