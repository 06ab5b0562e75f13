//! Error types for AccessVault Core.

use thiserror::Error;

/// Boundary validation errors.
///
/// Raised before any store access. Messages name the offending field but
/// never echo its value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} exceeds maximum length of {max} bytes")]
    TooLong { field: &'static str, max: usize },

    #[error("{field} contains control characters")]
    ControlCharacter { field: &'static str },

    #[error("{field} has surrounding whitespace")]
    SurroundingWhitespace { field: &'static str },

    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    #[error("{field} exceeds maximum of {max} seconds")]
    DurationTooLong { field: &'static str, max: u64 },

    #[error("invalid grant id encoding")]
    InvalidGrantId,
}
