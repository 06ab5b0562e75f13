//! Key material and per-grant key derivation.
//!
//! The master key is the only long-lived secret. Every grant gets its own
//! content key, derived with a BLAKE3 keyed hash over the grant identity.

use std::fmt;

use rand::RngCore;

use crate::error::{CryptoError, Result};

/// Length of every symmetric key in bytes (256 bits).
pub const KEY_LEN: usize = 32;

/// Domain separation tag for content key derivation.
const CONTENT_KEY_DOMAIN: &[u8] = b"accessvault-content-key-v1";

/// The 256-bit root secret every content key is derived from.
///
/// Loaded once at process start and passed by reference to whoever needs
/// it. There is no setter: a `MasterKey` cannot change after construction.
#[derive(Clone, PartialEq, Eq)]
pub struct MasterKey([u8; KEY_LEN]);

impl MasterKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Create from a byte slice, which must be exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKey(format!("expected {} bytes, got {}", KEY_LEN, bytes.len()))
        })?;
        Ok(Self(arr))
    }

    /// Parse from a 64-character hex string.
    ///
    /// This is the usual shape of a secret handed over by a secret store.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim()).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Generate a new random master key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(<redacted>)")
    }
}

/// A 256-bit per-grant key for ChaCha20-Poly1305.
#[derive(Clone, PartialEq, Eq)]
pub struct ContentKey([u8; KEY_LEN]);

impl ContentKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Generate a new random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ContentKey(<redacted>)")
    }
}

/// Derive the content key for a (user, content) pair.
///
/// `BLAKE3-keyed(master, DOMAIN || len(user) || user || len(content) || content)`
/// with lengths as little-endian u64. The length prefixes keep the encoding
/// injective, so no two distinct pairs hash the same input.
///
/// Pure: no I/O, no state, identical inputs give identical keys.
pub fn derive_content_key(master: &MasterKey, user_id: &str, content_id: &str) -> ContentKey {
    let mut hasher = blake3::Hasher::new_keyed(&master.0);
    hasher.update(CONTENT_KEY_DOMAIN);
    hasher.update(&(user_id.len() as u64).to_le_bytes());
    hasher.update(user_id.as_bytes());
    hasher.update(&(content_id.len() as u64).to_le_bytes());
    hasher.update(content_id.as_bytes());
    ContentKey(*hasher.finalize().as_bytes())
}
