//! Concurrent access against a single grant.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use accessvault::core::{AccessGrant, AttemptCounters, GrantId, NewGrant, UserId};
use accessvault::crypto::MasterKey;
use accessvault::store::{
    AccessResult, ExtendResult, GrantStore, MemoryStore, Result as StoreResult, RevokeResult,
    UpsertResult,
};
use accessvault::{AccessConfig, AccessError, DenialReason};
use accessvault_testkit::{purchase, TestFixture, FIXTURE_EPOCH};
use async_trait::async_trait;

const N: u64 = 64;

async fn concurrent_successes_all_counted<S: GrantStore + 'static>(f: TestFixture<S>) {
    let f = Arc::new(f);
    f.grant("alice", "movie-1", 3_600).await;

    let handles: Vec<_> = (0..N)
        .map(|_| {
            let f = Arc::clone(&f);
            tokio::spawn(async move { f.verify("alice", "movie-1").await })
        })
        .collect();

    let mut seen = Vec::new();
    for handle in handles {
        let access = handle.await.unwrap().unwrap();
        seen.push(access.access_attempts);
    }

    // Every caller saw a distinct post-increment count.
    seen.sort_unstable();
    assert_eq!(seen, (1..=N).collect::<Vec<_>>());

    let status = f.status("alice", "movie-1").await;
    assert_eq!(status.access_attempts, N);
    assert_eq!(status.failed_access_attempts, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_successes_memory() {
    concurrent_successes_all_counted(TestFixture::new()).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_successes_sqlite() {
    concurrent_successes_all_counted(TestFixture::sqlite()).await;
}

async fn concurrent_denials_all_counted<S: GrantStore + 'static>(f: TestFixture<S>) {
    let f = Arc::new(f);
    f.grant("alice", "movie-1", 1).await;
    f.advance_secs(5);

    let handles: Vec<_> = (0..N)
        .map(|_| {
            let f = Arc::clone(&f);
            tokio::spawn(async move { f.verify("alice", "movie-1").await })
        })
        .collect();

    for handle in handles {
        let err = handle.await.unwrap().unwrap_err();
        assert_eq!(err.denial_reason(), Some(DenialReason::Expired));
    }

    let status = f.status("alice", "movie-1").await;
    assert_eq!(status.access_attempts, N);
    assert_eq!(status.failed_access_attempts, N);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_denials_memory() {
    concurrent_denials_all_counted(TestFixture::new()).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_denials_sqlite() {
    concurrent_denials_all_counted(TestFixture::sqlite()).await;
}

/// Revoking while verifications are in flight: every attempt is counted,
/// each one either succeeds or is denied as revoked, and the grant ends up
/// revoked.
async fn revoke_races_verify<S: GrantStore + 'static>(f: TestFixture<S>) {
    let f = Arc::new(f);
    f.grant("alice", "movie-1", 3_600).await;

    let mut handles = Vec::new();
    for i in 0..N {
        let f = Arc::clone(&f);
        handles.push(tokio::spawn(async move {
            if i == N / 2 {
                f.controller
                    .revoke_access("alice", "movie-1", None)
                    .await
                    .map(|_| false)
            } else {
                f.verify("alice", "movie-1").await.map(|_| true)
            }
        }));
    }

    let mut successes = 0u64;
    let mut denials = 0u64;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(true) => successes += 1,
            Ok(false) => {}
            Err(AccessError::AccessDenied {
                reason: DenialReason::Revoked,
            }) => denials += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    let status = f.status("alice", "movie-1").await;
    assert!(status.is_revoked);
    assert_eq!(successes + denials, N - 1);
    assert_eq!(status.access_attempts, N - 1);
    assert_eq!(status.failed_access_attempts, denials);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_revoke_races_verify_memory() {
    revoke_races_verify(TestFixture::new()).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_revoke_races_verify_sqlite() {
    revoke_races_verify(TestFixture::sqlite()).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_revokes_agree_on_time() {
    let f = Arc::new(TestFixture::sqlite());
    f.grant("alice", "movie-1", 3_600).await;

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let f = Arc::clone(&f);
            tokio::spawn(async move {
                f.clock.advance(i);
                f.controller.revoke_access("alice", "movie-1", None).await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // Exactly one revocation took effect; later ones kept its timestamp.
    let status = f.status("alice", "movie-1").await;
    assert!(status.is_revoked);
    let revoked_at = status.revoked_at.unwrap();
    assert!((FIXTURE_EPOCH..=FIXTURE_EPOCH + 28).contains(&revoked_at));

    f.clock.advance(1_000);
    f.controller
        .revoke_access("alice", "movie-1", None)
        .await
        .unwrap();
    assert_eq!(
        f.status("alice", "movie-1").await.revoked_at,
        Some(revoked_at)
    );
}

/// A memory store that, once armed, revokes every grant right after handing
/// it out, so a revocation lands between the state check and the increment.
#[derive(Default)]
struct RevokeAfterReadStore {
    inner: MemoryStore,
    armed: AtomicBool,
}

#[async_trait]
impl GrantStore for RevokeAfterReadStore {
    async fn upsert_grant(&self, grant: &NewGrant, now: i64) -> StoreResult<UpsertResult> {
        self.inner.upsert_grant(grant, now).await
    }
    async fn get_grant(&self, grant_id: &GrantId) -> StoreResult<Option<AccessGrant>> {
        let grant = self.inner.get_grant(grant_id).await?;
        if let (Some(grant), true) = (&grant, self.armed.load(Ordering::SeqCst)) {
            self.inner.revoke(grant_id, Some("race"), grant.updated_at).await?;
        }
        Ok(grant)
    }
    async fn list_by_user(&self, user_id: &UserId) -> StoreResult<Vec<AccessGrant>> {
        self.inner.list_by_user(user_id).await
    }
    async fn count(&self) -> StoreResult<u64> {
        self.inner.count().await
    }
    async fn record_attempt(
        &self,
        grant_id: &GrantId,
        success: bool,
        now: i64,
    ) -> StoreResult<Option<AttemptCounters>> {
        self.inner.record_attempt(grant_id, success, now).await
    }
    async fn record_access(&self, grant_id: &GrantId, now: i64) -> StoreResult<AccessResult> {
        self.inner.record_access(grant_id, now).await
    }
    async fn revoke(
        &self,
        grant_id: &GrantId,
        reason: Option<&str>,
        now: i64,
    ) -> StoreResult<RevokeResult> {
        self.inner.revoke(grant_id, reason, now).await
    }
    async fn extend(
        &self,
        grant_id: &GrantId,
        extra_millis: i64,
        now: i64,
        allow_expired: bool,
    ) -> StoreResult<ExtendResult> {
        self.inner.extend(grant_id, extra_millis, now, allow_expired).await
    }
    async fn delete_older_than(&self, cutoff: i64) -> StoreResult<u64> {
        self.inner.delete_older_than(cutoff).await
    }
}

#[tokio::test]
async fn test_revoke_between_check_and_increment_denies() {
    let f = TestFixture::with_store(
        RevokeAfterReadStore::default(),
        MasterKey::generate(),
        AccessConfig::default(),
    );
    f.controller
        .grant_access(&purchase("alice", "movie-1", 3_600))
        .await
        .unwrap();
    f.store.armed.store(true, Ordering::SeqCst);

    // The grant read as active, then was revoked before the increment.
    let err = f.verify("alice", "movie-1").await.unwrap_err();
    assert!(matches!(
        err,
        AccessError::AccessDenied {
            reason: DenialReason::Revoked
        }
    ));

    let grants = f
        .store
        .inner
        .list_by_user(&UserId::new("alice").unwrap())
        .await
        .unwrap();
    let grant = &grants[0];
    assert!(grant.revoked_at.is_some());
    assert_eq!(grant.access_attempts, 1);
    assert_eq!(grant.failed_access_attempts, 1);
    assert_eq!(grant.last_accessed_at, None);
}
