//! # AccessVault Core
//!
//! Pure domain types for AccessVault: identifiers, access grant records and
//! the derived access state.
//!
//! This crate contains no I/O, no storage, no async. It is the vocabulary the
//! store and the controller share.
//!
//! ## Key Types
//!
//! - [`UserId`], [`ContentId`] - Validated identifiers of a grant
//! - [`GrantId`] - Deterministic identifier of a (user, content) pair
//! - [`AccessGrant`] - The stored access record
//! - [`GrantState`] - `Active`, `Expired` or `Revoked`, always computed
//! - [`AccessStatus`] - Read-only view for dashboards
//!
//! ## Derived State
//!
//! Grant state is never stored. [`GrantState::evaluate`] is the single place
//! that turns `revoked_at`, `expires_at` and the current time into a state.

pub mod clock;
pub mod error;
pub mod grant;
pub mod types;
pub mod validation;

pub use clock::{now_millis, Clock, ManualClock, SystemClock, MILLIS_PER_DAY, MILLIS_PER_SEC};
pub use error::ValidationError;
pub use grant::{AccessGrant, AccessStatus, AttemptCounters, GrantState, GrantSummary, NewGrant};
pub use types::{ContentId, GrantId, UserId};
pub use validation::{
    secs_to_millis, validate_content_type, validate_locator, validate_purchase_ref,
    validate_reason, MAX_CONTENT_TYPE_LEN, MAX_ID_LEN, MAX_LOCATOR_LEN, MAX_REASON_LEN,
};
