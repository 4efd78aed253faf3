//! Unified error types for the CFE matching toolkit
//!
//! This module provides a common error type [`CfeError`] that can represent
//! errors from any part of the system. Domain-specific error types can be
//! converted to `CfeError` for uniform error handling at API boundaries.

use thiserror::Error;

/// Unified error type for all CFE matching operations.
///
/// Allows errors from I/O, configuration, network mutation, and solving to be
/// handled uniformly at the orchestration layer.
#[derive(Error, Debug)]
pub enum CfeError {
    /// I/O errors (file access, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Data validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Solver/algorithm errors
    #[error("Solver error: {0}")]
    Solver(String),

    /// Configuration errors (bad palette entry, empty selector, out-of-range
    /// fraction)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network structure errors (missing bus, name collision)
    #[error("Network error: {0}")]
    Network(String),

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using CfeError.
pub type CfeResult<T> = Result<T, CfeError>;

impl From<anyhow::Error> for CfeError {
    fn from(err: anyhow::Error) -> Self {
        CfeError::Other(err.to_string())
    }
}

impl From<String> for CfeError {
    fn from(s: String) -> Self {
        CfeError::Other(s)
    }
}

impl From<&str> for CfeError {
    fn from(s: &str) -> Self {
        CfeError::Other(s.to_string())
    }
}
