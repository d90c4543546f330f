//! Error types and result aliases for poolgate.
//!
//! This module defines the shared error types used across all poolgate
//! components. Errors are structured for programmatic handling and include
//! context for debugging.

use std::fmt;

/// The result type used throughout poolgate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in poolgate operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The requested document was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A store operation failed.
    #[error("store error: {message}")]
    Store {
        /// Description of the store failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// An internal error occurred that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates a new store error with the given message.
    #[must_use]
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new store error with a source cause.
    #[must_use]
    pub fn store_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Store {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new serialization error from a display-able cause.
    #[must_use]
    pub fn serialization(message: impl fmt::Display) -> Self {
        Self::Serialization {
            message: message.to_string(),
        }
    }

    /// Creates a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display_includes_message() {
        let error = Error::store("pools collection unreachable");
        assert_eq!(error.to_string(), "store error: pools collection unreachable");
    }

    #[test]
    fn test_store_error_preserves_source() {
        let cause = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        let error = Error::store_with_source("upsert failed", cause);
        let source = std::error::Error::source(&error).expect("source should be preserved");
        assert!(source.to_string().contains("timed out"));
    }
}
