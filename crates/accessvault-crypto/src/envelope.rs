//! Sealed locator envelope.
//!
//! A content locator is encrypted into a [`SealedLocator`]: ciphertext, a
//! 96-bit nonce, a detached 128-bit authentication tag and the algorithm
//! version. The four fields are produced together and must be stored together.

use std::fmt;

use chacha20poly1305::{
    aead::{AeadInPlace, KeyInit},
    ChaCha20Poly1305, Key, Nonce, Tag,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::crypto::ContentKey;
use crate::error::{CryptoError, Result};

/// Nonce length in bytes (96 bits).
pub const IV_LEN: usize = 12;

/// Authentication tag length in bytes (128 bits).
pub const TAG_LEN: usize = 16;

/// Algorithm used to seal a locator.
///
/// Stored with every record so that old records stay readable after a new
/// version is introduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AlgorithmVersion {
    /// BLAKE3 keyed derivation, ChaCha20-Poly1305 with detached tag.
    V1 = 1,
}

impl AlgorithmVersion {
    /// The version used for new grants.
    pub const CURRENT: Self = Self::V1;

    /// Convert to the stored byte.
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Parse a stored byte.
    pub fn from_u8(v: u8) -> Result<Self> {
        match v {
            1 => Ok(Self::V1),
            other => Err(CryptoError::UnsupportedAlgorithm(other)),
        }
    }

    /// Associated data bound into the tag.
    fn associated_data(self) -> [u8; 1] {
        [self.to_u8()]
    }
}

/// A 96-bit nonce. Fresh for every encryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Iv(pub [u8; IV_LEN]);

impl Iv {
    /// Generate a new random nonce.
    pub fn generate() -> Self {
        let mut bytes = [0u8; IV_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; IV_LEN]) -> Self {
        Self(bytes)
    }

    /// Create from a stored slice.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; IV_LEN] = bytes.try_into().map_err(|_| CryptoError::InvalidLength {
            field: "iv",
            expected: IV_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; IV_LEN] {
        &self.0
    }
}

/// A 128-bit Poly1305 authentication tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTag(pub [u8; TAG_LEN]);

impl AuthTag {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; TAG_LEN]) -> Self {
        Self(bytes)
    }

    /// Create from a stored slice.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; TAG_LEN] = bytes.try_into().map_err(|_| CryptoError::InvalidLength {
            field: "auth_tag",
            expected: TAG_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; TAG_LEN] {
        &self.0
    }
}

/// An encrypted content locator.
///
/// `Debug` shows the algorithm and ciphertext length only.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedLocator {
    /// Algorithm used to seal.
    pub algorithm: AlgorithmVersion,

    /// Nonce used for this encryption.
    pub iv: Iv,

    /// Detached authentication tag.
    pub auth_tag: AuthTag,

    /// The encrypted locator (same length as the plaintext).
    pub ciphertext: Vec<u8>,
}

impl SealedLocator {
    /// Encrypt a locator with the given key under the current algorithm.
    pub fn seal(locator: &str, key: &ContentKey) -> Result<Self> {
        let algorithm = AlgorithmVersion::CURRENT;
        let iv = Iv::generate();
        let mut buffer = locator.as_bytes().to_vec();

        let tag = cipher(key)
            .encrypt_in_place_detached(
                Nonce::from_slice(iv.as_bytes()),
                &algorithm.associated_data(),
                &mut buffer,
            )
            .map_err(|_| CryptoError::Encryption)?;

        let mut auth_tag = [0u8; TAG_LEN];
        auth_tag.copy_from_slice(tag.as_slice());

        Ok(Self {
            algorithm,
            iv,
            auth_tag: AuthTag(auth_tag),
            ciphertext: buffer,
        })
    }

    /// Decrypt and verify with the given key.
    ///
    /// Either the full authentic locator comes back or an error does.
    pub fn open(&self, key: &ContentKey) -> Result<String> {
        match self.algorithm {
            AlgorithmVersion::V1 => {
                let mut buffer = self.ciphertext.clone();
                cipher(key)
                    .decrypt_in_place_detached(
                        Nonce::from_slice(self.iv.as_bytes()),
                        &self.algorithm.associated_data(),
                        &mut buffer,
                        Tag::from_slice(self.auth_tag.as_bytes()),
                    )
                    .map_err(|_| CryptoError::Integrity)?;

                String::from_utf8(buffer).map_err(|_| CryptoError::MalformedPlaintext)
            }
        }
    }

    /// Get the size of the ciphertext.
    pub fn ciphertext_len(&self) -> usize {
        self.ciphertext.len()
    }
}

impl fmt::Debug for SealedLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SealedLocator")
            .field("algorithm", &self.algorithm)
            .field("ciphertext_len", &self.ciphertext.len())
            .finish_non_exhaustive()
    }
}

/// Encrypt a locator, returning the sealed record.
pub fn encrypt(locator: &str, key: &ContentKey) -> Result<SealedLocator> {
    SealedLocator::seal(locator, key)
}

/// Decrypt the parts of a record sealed under the current algorithm.
pub fn decrypt(ciphertext: &[u8], iv: &Iv, auth_tag: &AuthTag, key: &ContentKey) -> Result<String> {
    SealedLocator {
        algorithm: AlgorithmVersion::CURRENT,
        iv: *iv,
        auth_tag: *auth_tag,
        ciphertext: ciphertext.to_vec(),
    }
    .open(key)
}

fn cipher(key: &ContentKey) -> ChaCha20Poly1305 {
    ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()))
}
