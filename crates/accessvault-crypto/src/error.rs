//! Error types for the crypto module.

use thiserror::Error;

/// Errors that can occur during key handling and locator encryption.
///
/// Messages never carry key material or plaintext.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// Key material had the wrong length or encoding.
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// Encryption failed.
    #[error("encryption failed")]
    Encryption,

    /// Authentication tag did not verify. Ciphertext, nonce, tag or
    /// algorithm version was modified, or the wrong key was used.
    #[error("integrity check failed")]
    Integrity,

    /// The decrypted bytes are authentic but not a UTF-8 locator.
    #[error("decrypted locator is malformed")]
    MalformedPlaintext,

    /// Unknown algorithm version.
    #[error("unsupported algorithm version: {0}")]
    UnsupportedAlgorithm(u8),

    /// A stored nonce or tag had the wrong length.
    #[error("invalid {field} length: expected {expected}, got {actual}")]
    InvalidLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Result type for crypto operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
