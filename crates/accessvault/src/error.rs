//! Error types for the access controller.

use std::fmt;

use accessvault_core::ValidationError;
use accessvault_crypto::CryptoError;
use accessvault_store::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why an existing grant does not allow access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    Expired,
    Revoked,
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialReason::Expired => f.write_str("expired"),
            DenialReason::Revoked => f.write_str("revoked"),
        }
    }
}

/// Coarse classification of an [`AccessError`], for callers that map errors
/// to responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    AccessDenied,
    TamperDetected,
    Validation,
    Internal,
}

/// Errors that can occur during access operations.
///
/// Display strings never carry identifiers, key material, ciphertext or
/// locators.
#[derive(Debug, Error)]
pub enum AccessError {
    /// No grant exists for the (user, content) pair.
    #[error("no access grant for this content")]
    NotFound,

    /// A grant exists but is expired or revoked.
    #[error("access denied: grant {reason}")]
    AccessDenied { reason: DenialReason },

    /// The sealed locator failed authentication. Never retried.
    #[error("content integrity check failed")]
    TamperDetected,

    /// Malformed input, rejected before the store is touched.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Sealing a locator failed.
    #[error("encryption error: {0}")]
    Crypto(#[from] CryptoError),
}

impl AccessError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AccessError::NotFound => ErrorKind::NotFound,
            AccessError::AccessDenied { .. } => ErrorKind::AccessDenied,
            AccessError::TamperDetected => ErrorKind::TamperDetected,
            AccessError::Validation(_) => ErrorKind::Validation,
            AccessError::Store(_) | AccessError::Crypto(_) => ErrorKind::Internal,
        }
    }

    /// Whether this error must be escalated to security monitoring.
    pub fn is_security_fault(&self) -> bool {
        matches!(self, AccessError::TamperDetected)
    }

    /// The denial reason, if this is an `AccessDenied`.
    pub fn denial_reason(&self) -> Option<DenialReason> {
        match self {
            AccessError::AccessDenied { reason } => Some(*reason),
            _ => None,
        }
    }
}

/// Result type for access operations.
pub type Result<T> = std::result::Result<T, AccessError>;
