//! Error types for the Talking Tables domain.

use thiserror::Error;

/// A shared error type for the Talking Tables domain layer.
///
/// Tool-level failures never surface through this type: they are recovered
/// into structured tool-result messages. This covers the remaining cases
/// (bad input at construction time, configuration, broken invariants).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TalktabError {
    /// Structurally invalid input, rejected before any side effect
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (a broken invariant; should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TalktabError {
    /// Creates an InvalidInput error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this is an InvalidInput error
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }
}

/// A type alias for `Result<T, TalktabError>`.
pub type Result<T> = std::result::Result<T, TalktabError>;
