//! The AccessController: the one place that decides whether a user may
//! read a piece of content.
//!
//! It ties together key derivation, the sealed locator and the grant store.
//! Every call validates its identifiers first, then reads the grant, then
//! decides from [`GrantState`] alone.

use std::fmt;
use std::sync::Arc;

use accessvault_core::{
    secs_to_millis, validate_content_type, validate_locator, validate_purchase_ref,
    validate_reason, AccessStatus, Clock, ContentId, GrantId, GrantState, GrantSummary, NewGrant,
    SystemClock, UserId,
};
use accessvault_crypto::{derive_content_key, MasterKey, SealedLocator};
use accessvault_store::{AccessResult, ExtendResult, GrantStore, RevokeResult, UpsertResult};
use tracing::{debug, error, info, warn};

use crate::config::AccessConfig;
use crate::error::{AccessError, DenialReason, Result};
use crate::events::PurchaseConfirmed;
use crate::sweeper::{Sweeper, SweeperHandle};

/// A successfully decrypted locator.
#[derive(Clone, PartialEq, Eq)]
pub struct DecryptedAccess {
    /// The plaintext content locator.
    pub locator: String,
    /// Total attempts on this grant, including this one.
    pub access_attempts: u64,
    /// Expiry of the grant (Unix ms).
    pub expires_at: i64,
}

impl fmt::Debug for DecryptedAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptedAccess")
            .field("locator", &"[redacted]")
            .field("access_attempts", &self.access_attempts)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// The access controller.
///
/// Provides:
/// - Verification and decryption of content locators
/// - Grant creation from confirmed purchases
/// - Revocation and extension
/// - Read-only status for dashboards
pub struct AccessController<S: GrantStore> {
    /// The storage backend.
    store: Arc<S>,
    /// Root of every content key.
    master_key: MasterKey,
    /// Time source.
    clock: Arc<dyn Clock>,
    /// Configuration.
    config: AccessConfig,
}

impl<S: GrantStore> AccessController<S> {
    /// Create a controller reading the system clock.
    ///
    /// Fails if the configuration is invalid.
    pub fn new(store: S, master_key: MasterKey, config: AccessConfig) -> Result<Self> {
        Self::with_clock(Arc::new(store), master_key, Arc::new(SystemClock), config)
    }

    /// Create a controller over a shared store and an explicit clock.
    pub fn with_clock(
        store: Arc<S>,
        master_key: MasterKey,
        clock: Arc<dyn Clock>,
        config: AccessConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            master_key,
            clock,
            config,
        })
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the configuration.
    pub fn config(&self) -> &AccessConfig {
        &self.config
    }

    /// Build a sweeper sharing this controller's store, clock and grace
    /// period.
    pub fn sweeper(&self) -> Sweeper<S> {
        Sweeper::new(
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            self.config.sweep_grace(),
        )
    }

    /// Start a background sweeper on the current tokio runtime, running
    /// every [`AccessConfig::sweep_interval`].
    pub fn spawn_sweeper(&self) -> SweeperHandle
    where
        S: 'static,
    {
        self.sweeper().spawn(self.config.sweep_interval())
    }

    fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Access
    // ─────────────────────────────────────────────────────────────────────────

    /// Verify a grant and decrypt its content locator.
    ///
    /// Every attempt on an existing grant is counted, including denied and
    /// tampered ones. A missing grant is not counted since there is nothing
    /// to count against.
    ///
    /// The success is recorded by a conditional increment, so a grant
    /// revoked after it was read but before the increment is denied and no
    /// locator is returned.
    pub async fn verify_and_decrypt(
        &self,
        user_id: &str,
        content_id: &str,
    ) -> Result<DecryptedAccess> {
        let (user_id, content_id) = parse_pair(user_id, content_id)?;
        let grant_id = GrantId::derive(&user_id, &content_id);
        let now = self.now();

        let grant = self
            .store
            .get_grant(&grant_id)
            .await?
            .ok_or(AccessError::NotFound)?;

        let reason = match grant.state(now) {
            GrantState::Active => None,
            GrantState::Expired => Some(DenialReason::Expired),
            GrantState::Revoked => Some(DenialReason::Revoked),
        };
        if let Some(reason) = reason {
            self.store.record_attempt(&grant_id, false, now).await?;
            debug!(grant_id = %grant_id, %reason, "access denied");
            return Err(AccessError::AccessDenied { reason });
        }

        let key = derive_content_key(&self.master_key, user_id.as_str(), content_id.as_str());
        let locator = match grant.sealed.open(&key) {
            Ok(locator) => locator,
            Err(e) => {
                let counters = self.store.record_attempt(&grant_id, false, now).await?;
                error!(
                    grant_id = %grant_id,
                    failed_attempts = counters.map(|c| c.failed_access_attempts),
                    error = %e,
                    "sealed locator failed authentication; possible tampering"
                );
                return Err(AccessError::TamperDetected);
            }
        };

        // The grant can vanish between the read and the increment if the
        // sweeper deletes it. Treat that as not found.
        let counters = match self.store.record_access(&grant_id, now).await? {
            AccessResult::Granted(counters) => counters,
            AccessResult::Denied { state, .. } => {
                let reason = match state {
                    GrantState::Revoked => DenialReason::Revoked,
                    _ => DenialReason::Expired,
                };
                debug!(grant_id = %grant_id, %reason, "access denied after decrypt");
                return Err(AccessError::AccessDenied { reason });
            }
            AccessResult::NotFound => return Err(AccessError::NotFound),
        };

        debug!(
            grant_id = %grant_id,
            access_attempts = counters.access_attempts,
            "access granted"
        );

        Ok(DecryptedAccess {
            locator,
            access_attempts: counters.access_attempts,
            expires_at: grant.expires_at,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Read-only status of a grant. Does not count as an access attempt.
    pub async fn get_status(&self, user_id: &str, content_id: &str) -> Result<AccessStatus> {
        let (user_id, content_id) = parse_pair(user_id, content_id)?;
        let grant = self
            .store
            .find_grant(&user_id, &content_id)
            .await?
            .ok_or(AccessError::NotFound)?;
        Ok(AccessStatus::of(&grant, self.now()))
    }

    /// All grants of a user, for display. Ordered by content id.
    pub async fn list_by_user(&self, user_id: &str) -> Result<Vec<GrantSummary>> {
        let user_id = UserId::new(user_id)?;
        let now = self.now();
        let grants = self.store.list_by_user(&user_id).await?;
        Ok(grants.iter().map(|g| GrantSummary::of(g, now)).collect())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Create or replace the grant for a confirmed purchase.
    ///
    /// The locator is sealed under the key derived for this (user, content)
    /// pair and the grant expires `duration_secs` from now. Replacing a
    /// revoked grant keeps it revoked.
    pub async fn grant_access(&self, purchase: &PurchaseConfirmed) -> Result<AccessStatus> {
        let (user_id, content_id) = parse_pair(&purchase.user_id, &purchase.content_id)?;
        validate_locator(&purchase.content_locator)?;
        validate_content_type(&purchase.content_type)?;
        validate_purchase_ref(&purchase.purchase_ref)?;
        let duration = secs_to_millis(
            "duration_secs",
            purchase.duration_secs,
            self.config.max_grant_duration_secs,
        )?;

        let key = derive_content_key(&self.master_key, user_id.as_str(), content_id.as_str());
        let sealed = SealedLocator::seal(&purchase.content_locator, &key)?;

        let now = self.now();
        let grant = NewGrant {
            user_id,
            content_id,
            sealed,
            expires_at: now.saturating_add(duration),
            content_type: purchase.content_type.clone(),
            purchase_ref: purchase.purchase_ref.clone(),
        };
        let grant_id = grant.grant_id();

        let result = self.store.upsert_grant(&grant, now).await?;
        let stored = self
            .store
            .get_grant(&grant_id)
            .await?
            .ok_or(AccessError::NotFound)?;
        let status = AccessStatus::of(&stored, now);

        match result {
            UpsertResult::Created => info!(
                grant_id = %grant_id,
                expires_at = stored.expires_at,
                "access granted"
            ),
            UpsertResult::Replaced if status.is_revoked => warn!(
                grant_id = %grant_id,
                "purchase replaced a revoked grant; grant stays revoked"
            ),
            UpsertResult::Replaced => info!(
                grant_id = %grant_id,
                expires_at = stored.expires_at,
                "access grant replaced"
            ),
        }

        Ok(status)
    }

    /// Revoke a grant. Revoking an already revoked grant succeeds and keeps
    /// the original revocation time.
    pub async fn revoke_access(
        &self,
        user_id: &str,
        content_id: &str,
        reason: Option<&str>,
    ) -> Result<()> {
        let (user_id, content_id) = parse_pair(user_id, content_id)?;
        if let Some(reason) = reason {
            validate_reason(reason)?;
        }
        let grant_id = GrantId::derive(&user_id, &content_id);

        match self.store.revoke(&grant_id, reason, self.now()).await? {
            RevokeResult::Revoked { revoked_at } => {
                info!(grant_id = %grant_id, revoked_at, "access revoked");
                Ok(())
            }
            RevokeResult::AlreadyRevoked { revoked_at } => {
                debug!(grant_id = %grant_id, revoked_at, "grant already revoked");
                Ok(())
            }
            RevokeResult::NotFound => Err(AccessError::NotFound),
        }
    }

    /// Move a grant's expiry forward by `extra_secs`.
    ///
    /// An active grant keeps its remaining time plus the extension. An
    /// expired grant is extended from now, or refused, depending on
    /// [`AccessConfig::expired_extension`]. A revoked grant is refused.
    pub async fn extend_access(
        &self,
        user_id: &str,
        content_id: &str,
        extra_secs: u64,
    ) -> Result<AccessStatus> {
        let (user_id, content_id) = parse_pair(user_id, content_id)?;
        let extra = secs_to_millis("extra_secs", extra_secs, self.config.max_extension_secs)?;
        let grant_id = GrantId::derive(&user_id, &content_id);
        let now = self.now();

        match self
            .store
            .extend(
                &grant_id,
                extra,
                now,
                self.config.allows_expired_extension(),
            )
            .await?
        {
            ExtendResult::Extended { expires_at } => {
                info!(grant_id = %grant_id, expires_at, "access extended");
            }
            ExtendResult::Revoked => {
                return Err(AccessError::AccessDenied {
                    reason: DenialReason::Revoked,
                })
            }
            ExtendResult::Expired => {
                return Err(AccessError::AccessDenied {
                    reason: DenialReason::Expired,
                })
            }
            ExtendResult::NotFound => return Err(AccessError::NotFound),
        }

        let grant = self
            .store
            .get_grant(&grant_id)
            .await?
            .ok_or(AccessError::NotFound)?;
        Ok(AccessStatus::of(&grant, now))
    }
}

/// Validate a (user, content) pair at the boundary.
fn parse_pair(user_id: &str, content_id: &str) -> Result<(UserId, ContentId)> {
    Ok((UserId::new(user_id)?, ContentId::new(content_id)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use accessvault_core::{ManualClock, ValidationError, MILLIS_PER_SEC};
    use accessvault_store::MemoryStore;

    const T0: i64 = 1_700_000_000_000;

    fn setup() -> (AccessController<MemoryStore>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(T0));
        let controller = AccessController::with_clock(
            Arc::new(MemoryStore::new()),
            MasterKey::generate(),
            clock.clone(),
            AccessConfig::default(),
        )
        .unwrap();
        (controller, clock)
    }

    fn purchase(user: &str, content: &str, duration_secs: u64) -> PurchaseConfirmed {
        PurchaseConfirmed {
            content_id: content.into(),
            user_id: user.into(),
            content_locator: format!("s3://media/{}.mp4", content),
            content_type: "video/mp4".into(),
            purchase_ref: format!("tx-{}-{}", user, content),
            duration_secs,
        }
    }

    #[tokio::test]
    async fn test_grant_then_decrypt() {
        let (controller, _clock) = setup();
        let status = controller
            .grant_access(&purchase("alice", "movie-1", 3_600))
            .await
            .unwrap();
        assert!(status.is_active);
        assert_eq!(status.expires_at, T0 + 3_600 * MILLIS_PER_SEC);

        let access = controller
            .verify_and_decrypt("alice", "movie-1")
            .await
            .unwrap();
        assert_eq!(access.locator, "s3://media/movie-1.mp4");
        assert_eq!(access.access_attempts, 1);
    }

    #[tokio::test]
    async fn test_missing_grant_not_found() {
        let (controller, _clock) = setup();
        let err = controller
            .verify_and_decrypt("alice", "movie-1")
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::NotFound));
    }

    #[tokio::test]
    async fn test_invalid_ids_rejected_before_lookup() {
        let (controller, _clock) = setup();
        let err = controller.verify_and_decrypt("", "movie-1").await.unwrap_err();
        assert!(matches!(
            err,
            AccessError::Validation(ValidationError::Empty { field: "user_id" })
        ));
        let err = controller.get_status("alice", "a\nb").await.unwrap_err();
        assert!(matches!(err, AccessError::Validation(_)));
    }

    #[tokio::test]
    async fn test_zero_duration_rejected() {
        let (controller, _clock) = setup();
        let err = controller
            .grant_access(&purchase("alice", "movie-1", 0))
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::Validation(ValidationError::ZeroDuration { .. })));
        assert_eq!(controller.store().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_revoke_missing_is_not_found() {
        let (controller, _clock) = setup();
        let err = controller
            .revoke_access("alice", "movie-1", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::NotFound));
    }

    #[tokio::test]
    async fn test_expired_counts_failed_attempt() {
        let (controller, clock) = setup();
        controller
            .grant_access(&purchase("alice", "movie-1", 10))
            .await
            .unwrap();
        clock.advance_secs(10);

        let err = controller
            .verify_and_decrypt("alice", "movie-1")
            .await
            .unwrap_err();
        assert_eq!(err.denial_reason(), Some(DenialReason::Expired));

        let status = controller.get_status("alice", "movie-1").await.unwrap();
        assert!(status.is_expired);
        assert_eq!(status.access_attempts, 1);
        assert_eq!(status.failed_access_attempts, 1);
    }

    #[tokio::test]
    async fn test_status_is_read_only() {
        let (controller, _clock) = setup();
        controller
            .grant_access(&purchase("alice", "movie-1", 60))
            .await
            .unwrap();
        for _ in 0..3 {
            controller.get_status("alice", "movie-1").await.unwrap();
        }
        let status = controller.get_status("alice", "movie-1").await.unwrap();
        assert_eq!(status.access_attempts, 0);
        assert_eq!(status.last_accessed_at, None);
    }

    #[tokio::test]
    async fn test_sweeper_shares_clock() {
        let (controller, clock) = setup();
        controller
            .grant_access(&purchase("alice", "movie-1", 1))
            .await
            .unwrap();
        clock.advance(controller.config().sweep_grace_millis() + 2 * MILLIS_PER_SEC);

        let report = controller.sweeper().run_once().await.unwrap();
        assert_eq!(report.deleted, 1);
        assert_eq!(controller.store().count().await.unwrap(), 0);
    }

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let config = AccessConfig {
            max_grant_duration_secs: 0,
            ..AccessConfig::default()
        };
        let err = AccessController::new(MemoryStore::new(), MasterKey::generate(), config)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            AccessError::Validation(ValidationError::ZeroDuration {
                field: "max_grant_duration_secs"
            })
        ));

        let config = AccessConfig {
            sweep_interval_secs: 0,
            ..AccessConfig::default()
        };
        assert!(AccessController::new(MemoryStore::new(), MasterKey::generate(), config).is_err());
    }

    #[tokio::test]
    async fn test_spawn_sweeper_uses_configured_interval() {
        let clock = Arc::new(ManualClock::new(T0));
        let config = AccessConfig {
            sweep_interval_secs: 1,
            ..AccessConfig::default()
        };
        let controller = AccessController::with_clock(
            Arc::new(MemoryStore::new()),
            MasterKey::generate(),
            clock.clone(),
            config,
        )
        .unwrap();
        controller
            .grant_access(&purchase("alice", "movie-1", 1))
            .await
            .unwrap();
        clock.advance(controller.config().sweep_grace_millis() + 2 * MILLIS_PER_SEC);

        // The first sweep runs as soon as the task starts.
        let handle = controller.spawn_sweeper();
        for _ in 0..100 {
            if controller.store().count().await.unwrap() == 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(controller.store().count().await.unwrap(), 0);
        assert!(!handle.is_finished());

        handle.shutdown().await;
    }

    #[test]
    fn test_decrypted_access_debug_redacts() {
        let access = DecryptedAccess {
            locator: "s3://secret/file".into(),
            access_attempts: 1,
            expires_at: 0,
        };
        assert!(!format!("{:?}", access).contains("secret"));
    }
}
