//! # AccessVault Crypto
//!
//! Key derivation and authenticated encryption for content locators.
//!
//! ## Overview
//!
//! Every access grant protects one content locator (typically a storage URL).
//! The locator is never encrypted under the master key directly. Instead:
//!
//! 1. **Master Key**: A single 256-bit root secret, injected at startup
//! 2. **Content Key**: A per-(user, content) key derived from the master key
//!    with a BLAKE3 keyed hash
//! 3. **Sealed Locator**: The locator encrypted under the content key with
//!    ChaCha20-Poly1305 (96-bit nonce, 128-bit detached tag)
//!
//! This gives us:
//! - Independent keys per grant (leaking one reveals no other)
//! - Tamper detection on every field of the sealed record
//! - A version byte so old records keep decrypting after an algorithm change
//!
//! ## Usage
//!
//! ```rust
//! use accessvault_crypto::{derive_content_key, MasterKey, SealedLocator};
//!
//! let master = MasterKey::generate();
//! let key = derive_content_key(&master, "user-1", "content-9");
//!
//! let sealed = SealedLocator::seal("s3://bucket/video.mp4", &key).unwrap();
//! let locator = sealed.open(&key).unwrap();
//! assert_eq!(locator, "s3://bucket/video.mp4");
//! ```

pub mod crypto;
pub mod envelope;
pub mod error;

pub use crypto::{derive_content_key, ContentKey, MasterKey, KEY_LEN};
pub use envelope::{
    decrypt, encrypt, AlgorithmVersion, AuthTag, Iv, SealedLocator, IV_LEN, TAG_LEN,
};
pub use error::{CryptoError, Result};
