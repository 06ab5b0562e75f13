//! GrantStore trait: the abstract interface for access grant persistence.
//!
//! This trait allows the controller to be storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use accessvault_core::{
    AccessGrant, AttemptCounters, ContentId, GrantId, GrantState, NewGrant, UserId,
};

use crate::error::Result;

/// Result of upserting a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertResult {
    /// No grant existed for the pair.
    Created,
    /// An existing grant was replaced. Counters were reset, revocation kept.
    Replaced,
}

/// Result of a conditional access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessResult {
    /// The grant was active; the attempt counted as a success.
    Granted(AttemptCounters),
    /// The grant was not active at `now`; the attempt counted as a failure.
    Denied {
        state: GrantState,
        counters: AttemptCounters,
    },
    /// No grant with this id.
    NotFound,
}

/// Result of revoking a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeResult {
    /// The grant is now revoked.
    Revoked { revoked_at: i64 },
    /// The grant was already revoked (idempotent - not an error).
    AlreadyRevoked { revoked_at: i64 },
    /// No grant with this id.
    NotFound,
}

/// Result of extending a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendResult {
    /// The expiry moved forward.
    Extended { expires_at: i64 },
    /// Rejected: the grant is revoked.
    Revoked,
    /// Rejected: the grant is expired and reactivation was not allowed.
    Expired,
    /// No grant with this id.
    NotFound,
}

/// The GrantStore trait: async interface for grant persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, we use `spawn_blocking` internally to avoid blocking the runtime.
///
/// # Design Notes
///
/// - **Whole-record writes**: the sealed locator is written in the same
///   statement as the rest of the record, so a grant never holds a partial
///   ciphertext/nonce/tag set.
/// - **Atomic counters**: `record_attempt` is one atomic increment. N
///   concurrent calls add exactly N.
/// - **Terminal revocation**: no method clears `revoked_at`.
#[async_trait]
pub trait GrantStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Grant Records
    // ─────────────────────────────────────────────────────────────────────────

    /// Create the grant for a (user, content) pair, or fully replace it.
    ///
    /// On replacement the sealed locator, expiry, content type and purchase
    /// reference are overwritten and the counters reset. `revoked_at` and
    /// `created_at` are kept.
    async fn upsert_grant(&self, grant: &NewGrant, now: i64) -> Result<UpsertResult>;

    /// Get a grant by id.
    async fn get_grant(&self, grant_id: &GrantId) -> Result<Option<AccessGrant>>;

    /// Get the grant for a (user, content) pair.
    async fn find_grant(
        &self,
        user_id: &UserId,
        content_id: &ContentId,
    ) -> Result<Option<AccessGrant>> {
        self.get_grant(&GrantId::derive(user_id, content_id)).await
    }

    /// List all grants of a user, ordered by content id.
    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<AccessGrant>>;

    /// Number of stored grants.
    async fn count(&self) -> Result<u64>;

    // ─────────────────────────────────────────────────────────────────────────
    // Atomic Updates
    // ─────────────────────────────────────────────────────────────────────────

    /// Record an access attempt.
    ///
    /// Increments `access_attempts`; on success sets `last_accessed_at` to
    /// `now`, on failure increments `failed_access_attempts`. Returns the
    /// counters after the update, or `None` if the grant does not exist.
    async fn record_attempt(
        &self,
        grant_id: &GrantId,
        success: bool,
        now: i64,
    ) -> Result<Option<AttemptCounters>>;

    /// Record an access attempt that succeeds only if the grant is active.
    ///
    /// The state check and the increment are one atomic step: a grant
    /// revoked or expired by the time this runs is counted as a failed
    /// attempt and reported as [`AccessResult::Denied`] with its state.
    async fn record_access(&self, grant_id: &GrantId, now: i64) -> Result<AccessResult>;

    /// Revoke a grant. Revoking twice is not an error.
    async fn revoke(&self, grant_id: &GrantId, reason: Option<&str>, now: i64)
        -> Result<RevokeResult>;

    /// Move a grant's expiry forward by `extra_millis`.
    ///
    /// The new expiry is `max(expires_at, now) + extra_millis`, which for an
    /// active grant is simply `expires_at + extra_millis`. Rejected if the
    /// grant is revoked, or expired while `allow_expired` is false.
    async fn extend(
        &self,
        grant_id: &GrantId,
        extra_millis: i64,
        now: i64,
        allow_expired: bool,
    ) -> Result<ExtendResult>;

    // ─────────────────────────────────────────────────────────────────────────
    // Maintenance
    // ─────────────────────────────────────────────────────────────────────────

    /// Delete every grant whose `expires_at` is strictly before `cutoff`,
    /// revoked or not. The check runs against each row's current expiry at
    /// delete time. Returns the number of deleted grants.
    async fn delete_older_than(&self, cutoff: i64) -> Result<u64>;
}
