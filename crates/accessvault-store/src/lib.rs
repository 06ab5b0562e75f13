//! # AccessVault Store
//!
//! Persistence for access grants. Provides a trait-based interface with
//! SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The store abstracts grant storage behind the [`GrantStore`] trait so the
//! access controller is storage-agnostic. The primary implementation is
//! [`SqliteStore`], with [`MemoryStore`] for tests.
//!
//! ## Key Types
//!
//! - [`GrantStore`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`UpsertResult`], [`AccessResult`], [`RevokeResult`], [`ExtendResult`] - Outcomes of writes
//!
//! ## Usage
//!
//! ```rust,no_run
//! use accessvault_store::{GrantStore, SqliteStore};
//!
//! async fn example() {
//!     // Open a SQLite database
//!     let store = SqliteStore::open("grants.db").unwrap();
//!
//!     // Or use an in-memory database for testing
//!     let store = SqliteStore::open_memory().unwrap();
//!
//!     let swept = store.delete_older_than(0).await.unwrap();
//!     assert_eq!(swept, 0);
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Upsert**: One grant per (user, content); writing again replaces it
//! - **Atomic counters**: Attempts are counted by a single update, never
//!   read-modify-write in the caller
//! - **Conditional writes**: Revoke, extend and sweep-delete each check the
//!   row's current state inside the same atomic step that changes it

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{AccessResult, ExtendResult, GrantStore, RevokeResult, UpsertResult};
