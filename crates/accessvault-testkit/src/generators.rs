//! Proptest generators for property-based testing.

use proptest::prelude::*;

use accessvault_core::{ContentId, UserId, MAX_ID_LEN};
use accessvault_crypto::{MasterKey, KEY_LEN};

/// One step in a grant's life, as driven by a test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleOp {
    Verify,
    Revoke,
    Extend(u64),
    Repurchase(u64),
    /// Move the clock forward by this many seconds.
    Advance(u64),
    Sweep,
}

/// Generate a random master key.
pub fn master_key() -> impl Strategy<Value = MasterKey> {
    any::<[u8; KEY_LEN]>().prop_map(MasterKey::from_bytes)
}

/// Generate a plain ASCII identifier string.
pub fn ascii_identifier() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9][a-zA-Z0-9_.:-]{0,63}"
}

/// Generate any string that passes identifier validation, including
/// non-ASCII text.
pub fn identifier() -> impl Strategy<Value = String> {
    "\\PC{1,64}".prop_filter("must be a valid identifier", |s| {
        s.len() <= MAX_ID_LEN && s.trim() == s && UserId::new(s.as_str()).is_ok()
    })
}

/// Generate a valid UserId.
pub fn user_id() -> impl Strategy<Value = UserId> {
    identifier().prop_filter_map("valid user id", |s| UserId::new(s).ok())
}

/// Generate a valid ContentId.
pub fn content_id() -> impl Strategy<Value = ContentId> {
    identifier().prop_filter_map("valid content id", |s| ContentId::new(s).ok())
}

/// Generate a content locator URL.
pub fn locator() -> impl Strategy<Value = String> {
    "(s3|https|ipfs)://[a-z0-9-]{1,32}(/[a-zA-Z0-9._~%-]{1,40}){0,6}"
}

/// Generate a grant duration between one second and thirty days.
pub fn duration_secs() -> impl Strategy<Value = u64> {
    1u64..=30 * 86_400
}

/// Generate a lifecycle operation.
pub fn lifecycle_op() -> impl Strategy<Value = LifecycleOp> {
    prop_oneof![
        3 => Just(LifecycleOp::Verify),
        1 => Just(LifecycleOp::Revoke),
        2 => duration_secs().prop_map(LifecycleOp::Extend),
        1 => duration_secs().prop_map(LifecycleOp::Repurchase),
        3 => (1u64..=90 * 86_400).prop_map(LifecycleOp::Advance),
        1 => Just(LifecycleOp::Sweep),
    ]
}

/// Generate a sequence of lifecycle operations.
pub fn lifecycle(max_len: usize) -> impl Strategy<Value = Vec<LifecycleOp>> {
    prop::collection::vec(lifecycle_op(), 0..=max_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::TestFixture;
    use accessvault::{AccessError, GrantState};
    use accessvault_core::GrantId;
    use accessvault_crypto::{derive_content_key, SealedLocator};

    fn block_on<F: std::future::Future>(f: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(f)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn grant_id_is_deterministic(u in user_id(), c in content_id()) {
            prop_assert_eq!(GrantId::derive(&u, &c), GrantId::derive(&u, &c));
        }

        #[test]
        fn locator_round_trips_under_derived_key(
            key in master_key(),
            u in ascii_identifier(),
            c in ascii_identifier(),
            loc in locator(),
        ) {
            let content_key = derive_content_key(&key, &u, &c);
            let sealed = SealedLocator::seal(&loc, &content_key).unwrap();
            prop_assert_eq!(sealed.open(&content_key).unwrap(), loc);
        }

        /// A revoked grant never reads as active again, whatever happens to
        /// it afterwards, until it is swept and bought anew.
        #[test]
        fn revocation_is_terminal(
            duration in duration_secs(),
            ops in lifecycle(24),
        ) {
            block_on(async {
                let fixture = TestFixture::new();
                fixture.grant("alice", "movie-1", duration).await;
                let mut revoked = false;

                for op in &ops {
                    let result = fixture.apply("alice", "movie-1", op).await;

                    match fixture.controller.get_status("alice", "movie-1").await {
                        Ok(status) => {
                            if revoked {
                                prop_assert_eq!(status.state(), GrantState::Revoked);
                            }
                            revoked = status.is_revoked;
                        }
                        Err(AccessError::NotFound) => revoked = false,
                        Err(e) => prop_assert!(false, "unexpected error: {}", e),
                    }

                    if let Err(e) = result {
                        prop_assert!(
                            matches!(e, AccessError::NotFound | AccessError::AccessDenied { .. }),
                            "unexpected error from {:?}: {}", op, e
                        );
                    }
                }
                Ok(())
            })?;
        }

        /// Counters only grow, and failures never exceed total attempts,
        /// between replacements of the grant.
        #[test]
        fn counters_are_consistent(ops in lifecycle(24)) {
            block_on(async {
                let fixture = TestFixture::new();
                fixture.grant("alice", "movie-1", 3_600).await;
                let mut last_attempts = 0u64;

                for op in &ops {
                    let _ = fixture.apply("alice", "movie-1", op).await;
                    if let Ok(status) = fixture.controller.get_status("alice", "movie-1").await {
                        prop_assert!(status.failed_access_attempts <= status.access_attempts);
                        if !matches!(op, LifecycleOp::Repurchase(_) | LifecycleOp::Sweep) {
                            prop_assert!(status.access_attempts >= last_attempts);
                        }
                        last_attempts = status.access_attempts;
                    } else {
                        last_attempts = 0;
                    }
                }
                Ok(())
            })?;
        }
    }
}
