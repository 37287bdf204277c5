//! Error types for the FAQ bot.
//!
//! This module defines a unified error enum that covers all error categories
//! in the workspace: configuration, I/O, language model, retrieval,
//! embeddings, prompts, and the offline optimization harness.

use thiserror::Error;

/// Unified error type for the FAQ bot.
///
/// Library functions return `Result<T, AppError>`. The serving pipeline
/// absorbs these at its outer boundary; the offline tools propagate them.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Language model provider errors (generation failures)
    #[error("LLM error: {0}")]
    Llm(String),

    /// Vector index errors (retrieval failures)
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Embedding provider errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Invalid input handed to the optimization harness
    #[error("Validation error: {0}")]
    Validation(String),

    /// A network call exceeded its time budget
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether this error came from an elapsed timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, AppError::Timeout(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_detection() {
        assert!(AppError::Timeout("llm".to_string()).is_timeout());
        assert!(!AppError::Llm("boom".to_string()).is_timeout());
    }

    #[test]
    fn test_json_error_maps_to_serialization() {
        let err: AppError = serde_json::from_str::<serde_json::Value>("{oops")
            .unwrap_err()
            .into();
        assert!(matches!(err, AppError::Serialization(_)));
    }
}
