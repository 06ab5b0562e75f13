//! # AccessVault Testkit
//!
//! Testing utilities for AccessVault.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: A controller wired to a store and a [`ManualClock`], with
//!   helpers for the common purchase/verify/revoke steps
//! - **Generators**: Proptest strategies for identifiers, locators and
//!   lifecycle operations
//!
//! ## Test Fixtures
//!
//! ```rust
//! use accessvault_testkit::TestFixture;
//!
//! # tokio_test_block(async {
//! let fixture = TestFixture::new();
//! fixture.grant("alice", "movie-1", 3_600).await;
//! fixture.advance_secs(3_600);
//! assert!(fixture.status("alice", "movie-1").await.is_expired);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f);
//! # }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use accessvault_testkit::generators::{user_id, content_id};
//!
//! proptest! {
//!     #[test]
//!     fn grant_id_is_deterministic(u in user_id(), c in content_id()) {
//!         prop_assert_eq!(GrantId::derive(&u, &c), GrantId::derive(&u, &c));
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use accessvault_core::ManualClock;
pub use fixtures::{locator_for, purchase, TestFixture, FIXTURE_EPOCH};
pub use generators::LifecycleOp;
