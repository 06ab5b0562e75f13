//! # AccessVault
//!
//! Access control for paid content: who may decrypt which content locator,
//! until when.
//!
//! ## Overview
//!
//! Each purchase becomes an access grant holding the content locator sealed
//! under a key derived from a master key and the (user, content) pair. The
//! controller:
//!
//! - **Verifies**: checks the grant is active, decrypts the locator and
//!   counts the attempt
//! - **Grants**: seals the locator and stores the grant on a confirmed purchase
//! - **Revokes**: terminally, and idempotently, on refund
//! - **Extends**: moves the expiry forward on renewal
//! - **Sweeps**: deletes grants that expired more than a grace period ago
//!
//! ## Key Concepts
//!
//! - **Grant state** is `Active`, `Expired` or `Revoked`, computed from the
//!   record and the current time, never stored.
//! - **Revocation is terminal.** Nothing clears it.
//! - **Tampering is escalated.** A locator that fails authentication is a
//!   security fault, not a retryable error.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use accessvault::{AccessConfig, AccessController, PurchaseConfirmed};
//! use accessvault::crypto::MasterKey;
//! use accessvault::store::SqliteStore;
//!
//! async fn example() {
//!     // Supplied by the secret store at startup
//!     let master_key = MasterKey::from_hex(&std::env::var("MASTER_KEY").unwrap()).unwrap();
//!
//!     let store = SqliteStore::open("grants.db").unwrap();
//!     let controller = AccessController::new(store, master_key, AccessConfig::default()).unwrap();
//!     let sweeper = controller.spawn_sweeper();
//!
//!     controller
//!         .grant_access(&PurchaseConfirmed {
//!             content_id: "movie-1".into(),
//!             user_id: "alice".into(),
//!             content_locator: "s3://media/movie-1.mp4".into(),
//!             content_type: "video/mp4".into(),
//!             purchase_ref: "tx-42".into(),
//!             duration_secs: 7 * 86_400,
//!         })
//!         .await
//!         .unwrap();
//!
//!     let access = controller.verify_and_decrypt("alice", "movie-1").await.unwrap();
//!     println!("stream from {}", access.locator);
//!
//!     sweeper.shutdown().await;
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `accessvault::core` - Identifiers, grant records, derived state
//! - `accessvault::crypto` - Key derivation and locator encryption
//! - `accessvault::store` - Storage abstraction and SQLite

pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod sweeper;

// Re-export component crates
pub use accessvault_core as core;
pub use accessvault_crypto as crypto;
pub use accessvault_store as store;

// Re-export main types for convenience
pub use config::{AccessConfig, ExpiredExtensionPolicy};
pub use controller::{AccessController, DecryptedAccess};
pub use error::{AccessError, DenialReason, ErrorKind, Result};
pub use events::{AccessEvent, PurchaseConfirmed, RefundIssued, SubscriptionRenewed};
pub use sweeper::{SweepReport, Sweeper, SweeperHandle};

// Re-export commonly used core types
pub use accessvault_core::{AccessStatus, GrantState, GrantSummary};
