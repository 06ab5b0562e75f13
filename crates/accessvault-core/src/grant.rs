//! Access grant records and derived state.
//!
//! A grant is the per-(user, content) record that decides whether the user
//! may decrypt the content locator. Its state is computed from `revoked_at`,
//! `expires_at` and the current time by [`GrantState::evaluate`] and nowhere
//! else.

use serde::{Deserialize, Serialize};

use accessvault_crypto::SealedLocator;

use crate::types::{ContentId, GrantId, UserId};

/// Derived state of a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantState {
    /// Not revoked and not yet expired.
    Active,
    /// Not revoked, expiry instant reached. Reversible by extension.
    Expired,
    /// Explicitly revoked. Terminal.
    Revoked,
}

impl GrantState {
    /// Compute the state of a grant at `now`.
    ///
    /// Revocation dominates expiry. A grant expiring exactly at `now` is
    /// already expired.
    pub fn evaluate(revoked_at: Option<i64>, expires_at: i64, now: i64) -> Self {
        if revoked_at.is_some() {
            GrantState::Revoked
        } else if now < expires_at {
            GrantState::Active
        } else {
            GrantState::Expired
        }
    }

    /// Whether no operation can leave this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, GrantState::Revoked)
    }
}

/// A stored access grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGrant {
    /// Identifier, derived from the (user, content) pair.
    pub grant_id: GrantId,

    /// Who bought access.
    pub user_id: UserId,

    /// What they bought access to.
    pub content_id: ContentId,

    /// The encrypted locator. Ciphertext, nonce, tag and algorithm are
    /// always written as one unit.
    pub sealed: SealedLocator,

    /// Absolute expiry (Unix ms).
    pub expires_at: i64,

    /// When the grant was revoked (Unix ms). Never cleared once set.
    pub revoked_at: Option<i64>,

    /// Reason given with the revocation, if any.
    pub revoke_reason: Option<String>,

    /// Total access attempts, successful or not.
    pub access_attempts: u64,

    /// Failed access attempts. Never exceeds `access_attempts`.
    pub failed_access_attempts: u64,

    /// Last successful access (Unix ms).
    pub last_accessed_at: Option<i64>,

    /// Correlation id from the purchase collaborator.
    pub purchase_ref: String,

    /// Informational content type, e.g. `video/mp4`.
    pub content_type: String,

    /// When the grant was first created (Unix ms).
    pub created_at: i64,

    /// Last write of any kind (Unix ms).
    pub updated_at: i64,
}

impl AccessGrant {
    /// Compute the state of this grant at `now`.
    pub fn state(&self, now: i64) -> GrantState {
        GrantState::evaluate(self.revoked_at, self.expires_at, now)
    }

    /// Check if this grant currently allows decryption.
    pub fn is_active(&self, now: i64) -> bool {
        self.state(now) == GrantState::Active
    }

    /// Current audit counters.
    pub fn counters(&self) -> AttemptCounters {
        AttemptCounters {
            access_attempts: self.access_attempts,
            failed_access_attempts: self.failed_access_attempts,
            last_accessed_at: self.last_accessed_at,
        }
    }
}

/// Input for creating or replacing a grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGrant {
    pub user_id: UserId,
    pub content_id: ContentId,
    pub sealed: SealedLocator,
    pub expires_at: i64,
    pub content_type: String,
    pub purchase_ref: String,
}

impl NewGrant {
    /// The grant id this record will be stored under.
    pub fn grant_id(&self) -> GrantId {
        GrantId::derive(&self.user_id, &self.content_id)
    }
}

/// Audit counters after an attempt was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptCounters {
    pub access_attempts: u64,
    pub failed_access_attempts: u64,
    pub last_accessed_at: Option<i64>,
}

/// Read-only status of a grant, for dashboards and UI.
///
/// Contains no key material, ciphertext or locator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessStatus {
    pub is_active: bool,
    pub is_expired: bool,
    pub is_revoked: bool,
    pub expires_at: i64,
    pub revoked_at: Option<i64>,
    pub access_attempts: u64,
    pub failed_access_attempts: u64,
    pub last_accessed_at: Option<i64>,
}

impl AccessStatus {
    /// Build the status view of a grant at `now`.
    pub fn of(grant: &AccessGrant, now: i64) -> Self {
        let state = grant.state(now);
        Self {
            is_active: state == GrantState::Active,
            is_expired: state == GrantState::Expired,
            is_revoked: state == GrantState::Revoked,
            expires_at: grant.expires_at,
            revoked_at: grant.revoked_at,
            access_attempts: grant.access_attempts,
            failed_access_attempts: grant.failed_access_attempts,
            last_accessed_at: grant.last_accessed_at,
        }
    }

    /// The state these flags describe.
    pub fn state(&self) -> GrantState {
        if self.is_revoked {
            GrantState::Revoked
        } else if self.is_active {
            GrantState::Active
        } else {
            GrantState::Expired
        }
    }
}

/// One row of a user's grant listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantSummary {
    pub content_id: ContentId,
    pub content_type: String,
    pub purchase_ref: String,
    pub status: AccessStatus,
}

impl GrantSummary {
    /// Build the summary of a grant at `now`.
    pub fn of(grant: &AccessGrant, now: i64) -> Self {
        Self {
            content_id: grant.content_id.clone(),
            content_type: grant.content_type.clone(),
            purchase_ref: grant.purchase_ref.clone(),
            status: AccessStatus::of(grant, now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accessvault_crypto::ContentKey;
    use proptest::prelude::*;

    fn make_grant(expires_at: i64, revoked_at: Option<i64>) -> AccessGrant {
        let user_id = UserId::new("alice").unwrap();
        let content_id = ContentId::new("movie-1").unwrap();
        AccessGrant {
            grant_id: GrantId::derive(&user_id, &content_id),
            user_id,
            content_id,
            sealed: SealedLocator::seal("s3://bucket/movie-1", &ContentKey::generate()).unwrap(),
            expires_at,
            revoked_at,
            revoke_reason: None,
            access_attempts: 3,
            failed_access_attempts: 1,
            last_accessed_at: Some(500),
            purchase_ref: "tx-1".into(),
            content_type: "video/mp4".into(),
            created_at: 0,
            updated_at: 500,
        }
    }

    #[test]
    fn test_active_before_expiry() {
        assert_eq!(GrantState::evaluate(None, 1000, 999), GrantState::Active);
    }

    #[test]
    fn test_expired_at_and_after_expiry() {
        assert_eq!(GrantState::evaluate(None, 1000, 1000), GrantState::Expired);
        assert_eq!(GrantState::evaluate(None, 1000, 5000), GrantState::Expired);
    }

    #[test]
    fn test_revoked_dominates() {
        // Revoked with expiry still in the future.
        assert_eq!(GrantState::evaluate(Some(10), 1000, 500), GrantState::Revoked);
        // Revoked and expired.
        assert_eq!(GrantState::evaluate(Some(10), 1000, 5000), GrantState::Revoked);
        assert!(GrantState::Revoked.is_terminal());
        assert!(!GrantState::Expired.is_terminal());
    }

    #[test]
    fn test_status_flags() {
        let grant = make_grant(1000, None);

        let active = AccessStatus::of(&grant, 500);
        assert!(active.is_active && !active.is_expired && !active.is_revoked);
        assert_eq!(active.state(), GrantState::Active);
        assert_eq!(active.access_attempts, 3);

        let expired = AccessStatus::of(&grant, 1500);
        assert!(!expired.is_active && expired.is_expired && !expired.is_revoked);
        assert_eq!(expired.state(), GrantState::Expired);

        let revoked = AccessStatus::of(&make_grant(1000, Some(100)), 500);
        assert!(!revoked.is_active && !revoked.is_expired && revoked.is_revoked);
        assert_eq!(revoked.state(), GrantState::Revoked);
    }

    #[test]
    fn test_status_serializes_camel_case() {
        let status = AccessStatus::of(&make_grant(1000, None), 500);
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["isActive"], true);
        assert_eq!(json["expiresAt"], 1000);
        assert!(json.get("ciphertext").is_none());
    }

    #[test]
    fn test_summary_has_no_secret_fields() {
        let summary = GrantSummary::of(&make_grant(1000, None), 500);
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("movie-1"));
        assert!(!json.contains("s3://"));
    }

    #[test]
    fn test_new_grant_id_matches_derivation() {
        let grant = make_grant(1000, None);
        let new = NewGrant {
            user_id: grant.user_id.clone(),
            content_id: grant.content_id.clone(),
            sealed: grant.sealed.clone(),
            expires_at: grant.expires_at,
            content_type: grant.content_type.clone(),
            purchase_ref: grant.purchase_ref.clone(),
        };
        assert_eq!(new.grant_id(), grant.grant_id);
    }

    proptest! {
        #[test]
        fn prop_exactly_one_state(revoked in any::<Option<i64>>(), expires in any::<i64>(), now in any::<i64>()) {
            let state = GrantState::evaluate(revoked, expires, now);
            match revoked {
                Some(_) => prop_assert_eq!(state, GrantState::Revoked),
                None if now < expires => prop_assert_eq!(state, GrantState::Active),
                None => prop_assert_eq!(state, GrantState::Expired),
            }
        }
    }
}
