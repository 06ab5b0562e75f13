//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: a controller over a store, with
//! a clock the test moves by hand.

use std::sync::Arc;

use accessvault::{
    AccessConfig, AccessController, AccessStatus, DecryptedAccess, PurchaseConfirmed, SweepReport,
};
use accessvault_core::{Clock, ContentId, ManualClock, NewGrant, UserId, MILLIS_PER_SEC};
use accessvault_crypto::MasterKey;
use accessvault_store::{GrantStore, MemoryStore, SqliteStore};

use crate::generators::LifecycleOp;

/// Start time of every fixture clock: 2023-11-14T22:13:20Z.
pub const FIXTURE_EPOCH: i64 = 1_700_000_000_000;

/// The locator the fixtures seal for a pair.
pub fn locator_for(user: &str, content: &str) -> String {
    format!("s3://fixture-media/{}/{}.bin", user, content)
}

/// A purchase event for a pair.
pub fn purchase(user: &str, content: &str, duration_secs: u64) -> PurchaseConfirmed {
    PurchaseConfirmed {
        content_id: content.to_string(),
        user_id: user.to_string(),
        content_locator: locator_for(user, content),
        content_type: "application/octet-stream".to_string(),
        purchase_ref: format!("tx-{}-{}", user, content),
        duration_secs,
    }
}

/// A test fixture: controller, shared store and manual clock.
pub struct TestFixture<S: GrantStore = MemoryStore> {
    pub controller: AccessController<S>,
    pub store: Arc<S>,
    pub clock: Arc<ManualClock>,
    pub master_key: MasterKey,
}

impl TestFixture<MemoryStore> {
    /// Create a fixture over a memory store with a random master key.
    pub fn new() -> Self {
        Self::with_config(AccessConfig::default())
    }

    /// Create a memory-backed fixture with the given configuration.
    pub fn with_config(config: AccessConfig) -> Self {
        Self::with_store(MemoryStore::new(), MasterKey::generate(), config)
    }

    /// Create with a deterministic master key from seed.
    pub fn with_seed(seed: [u8; 32]) -> Self {
        Self::with_store(
            MemoryStore::new(),
            MasterKey::from_bytes(seed),
            AccessConfig::default(),
        )
    }
}

impl Default for TestFixture<MemoryStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl TestFixture<SqliteStore> {
    /// Create a fixture over an in-memory SQLite database.
    pub fn sqlite() -> Self {
        Self::sqlite_with_config(AccessConfig::default())
    }

    /// Create an SQLite-backed fixture with the given configuration.
    pub fn sqlite_with_config(config: AccessConfig) -> Self {
        let store = SqliteStore::open_memory().expect("open in-memory sqlite");
        Self::with_store(store, MasterKey::generate(), config)
    }
}

impl<S: GrantStore> TestFixture<S> {
    /// Wire a controller over `store`.
    pub fn with_store(store: S, master_key: MasterKey, config: AccessConfig) -> Self {
        let store = Arc::new(store);
        let clock = Arc::new(ManualClock::new(FIXTURE_EPOCH));
        let controller = AccessController::with_clock(
            Arc::clone(&store),
            master_key.clone(),
            clock.clone(),
            config,
        )
        .expect("valid fixture config");
        Self {
            controller,
            store,
            clock,
            master_key,
        }
    }

    /// Current fixture time (Unix ms).
    pub fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Move the clock forward by whole seconds.
    pub fn advance_secs(&self, secs: i64) -> i64 {
        self.clock.advance_secs(secs)
    }

    /// Grant access, panicking on failure.
    pub async fn grant(&self, user: &str, content: &str, duration_secs: u64) -> AccessStatus {
        self.controller
            .grant_access(&purchase(user, content, duration_secs))
            .await
            .expect("grant_access")
    }

    /// Verify and decrypt.
    pub async fn verify(&self, user: &str, content: &str) -> accessvault::Result<DecryptedAccess> {
        self.controller.verify_and_decrypt(user, content).await
    }

    /// Status of a grant, panicking if it does not exist.
    pub async fn status(&self, user: &str, content: &str) -> AccessStatus {
        self.controller
            .get_status(user, content)
            .await
            .expect("get_status")
    }

    /// Flip one ciphertext bit of a stored grant, writing it back in place.
    ///
    /// The write goes through `upsert_grant`, so counters are reset.
    pub async fn tamper(&self, user: &str, content: &str) {
        let user_id = UserId::new(user).expect("valid user id");
        let content_id = ContentId::new(content).expect("valid content id");
        let grant = self
            .store
            .find_grant(&user_id, &content_id)
            .await
            .expect("find_grant")
            .expect("grant exists");

        let mut sealed = grant.sealed;
        sealed.ciphertext[0] ^= 0x01;

        let tampered = NewGrant {
            user_id,
            content_id,
            sealed,
            expires_at: grant.expires_at,
            content_type: grant.content_type,
            purchase_ref: grant.purchase_ref,
        };
        self.store
            .upsert_grant(&tampered, self.now())
            .await
            .expect("upsert tampered grant");
    }

    /// Run one sweep.
    pub async fn sweep(&self) -> SweepReport {
        self.controller
            .sweeper()
            .run_once()
            .await
            .expect("sweep")
    }

    /// Apply a lifecycle operation to a pair.
    pub async fn apply(
        &self,
        user: &str,
        content: &str,
        op: &LifecycleOp,
    ) -> accessvault::Result<()> {
        match op {
            LifecycleOp::Verify => self.verify(user, content).await.map(|_| ()),
            LifecycleOp::Revoke => self.controller.revoke_access(user, content, None).await,
            LifecycleOp::Extend(secs) => self
                .controller
                .extend_access(user, content, *secs)
                .await
                .map(|_| ()),
            LifecycleOp::Repurchase(secs) => self
                .controller
                .grant_access(&purchase(user, content, *secs))
                .await
                .map(|_| ()),
            LifecycleOp::Advance(secs) => {
                self.clock.advance(*secs as i64 * MILLIS_PER_SEC);
                Ok(())
            }
            LifecycleOp::Sweep => self.controller.sweeper().run_once().await.map(|_| ()),
        }
    }
}
