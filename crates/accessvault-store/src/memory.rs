//! In-memory implementation of the GrantStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence. Every write happens
//! inside one write-lock critical section, which is what makes counters,
//! revoke, extend and sweep-delete atomic here.

use std::collections::{BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use accessvault_core::{AccessGrant, AttemptCounters, GrantId, GrantState, NewGrant, UserId};

use crate::error::{Result, StoreError};
use crate::traits::{AccessResult, ExtendResult, GrantStore, RevokeResult, UpsertResult};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Grants indexed by ID.
    grants: HashMap<GrantId, AccessGrant>,

    /// Index: user -> their grant IDs.
    by_user: HashMap<UserId, BTreeSet<GrantId>>,
}

impl MemoryStoreInner {
    fn remove(&mut self, grant_id: &GrantId) {
        if let Some(grant) = self.grants.remove(grant_id) {
            if let Some(ids) = self.by_user.get_mut(&grant.user_id) {
                ids.remove(grant_id);
                if ids.is_empty() {
                    self.by_user.remove(&grant.user_id);
                }
            }
        }
    }
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner.write().map_err(|_| StoreError::LockPoisoned)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GrantStore for MemoryStore {
    async fn upsert_grant(&self, grant: &NewGrant, now: i64) -> Result<UpsertResult> {
        let mut inner = self.write()?;
        let grant_id = grant.grant_id();

        if let Some(existing) = inner.grants.get_mut(&grant_id) {
            existing.sealed = grant.sealed.clone();
            existing.expires_at = grant.expires_at;
            existing.content_type = grant.content_type.clone();
            existing.purchase_ref = grant.purchase_ref.clone();
            existing.access_attempts = 0;
            existing.failed_access_attempts = 0;
            existing.last_accessed_at = None;
            existing.updated_at = now;
            return Ok(UpsertResult::Replaced);
        }

        inner.grants.insert(
            grant_id,
            AccessGrant {
                grant_id,
                user_id: grant.user_id.clone(),
                content_id: grant.content_id.clone(),
                sealed: grant.sealed.clone(),
                expires_at: grant.expires_at,
                revoked_at: None,
                revoke_reason: None,
                access_attempts: 0,
                failed_access_attempts: 0,
                last_accessed_at: None,
                purchase_ref: grant.purchase_ref.clone(),
                content_type: grant.content_type.clone(),
                created_at: now,
                updated_at: now,
            },
        );
        inner
            .by_user
            .entry(grant.user_id.clone())
            .or_default()
            .insert(grant_id);

        Ok(UpsertResult::Created)
    }

    async fn get_grant(&self, grant_id: &GrantId) -> Result<Option<AccessGrant>> {
        let inner = self.read()?;
        Ok(inner.grants.get(grant_id).cloned())
    }

    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<AccessGrant>> {
        let inner = self.read()?;

        let mut grants: Vec<AccessGrant> = inner
            .by_user
            .get(user_id)
            .map(|ids| ids.iter().filter_map(|id| inner.grants.get(id)).cloned().collect())
            .unwrap_or_default();

        grants.sort_by(|a, b| a.content_id.cmp(&b.content_id));
        Ok(grants)
    }

    async fn count(&self) -> Result<u64> {
        let inner = self.read()?;
        Ok(inner.grants.len() as u64)
    }

    async fn record_attempt(
        &self,
        grant_id: &GrantId,
        success: bool,
        now: i64,
    ) -> Result<Option<AttemptCounters>> {
        let mut inner = self.write()?;

        Ok(inner.grants.get_mut(grant_id).map(|grant| {
            grant.access_attempts += 1;
            if success {
                grant.last_accessed_at = Some(now);
            } else {
                grant.failed_access_attempts += 1;
            }
            grant.updated_at = now;
            grant.counters()
        }))
    }

    async fn record_access(&self, grant_id: &GrantId, now: i64) -> Result<AccessResult> {
        let mut inner = self.write()?;

        let Some(grant) = inner.grants.get_mut(grant_id) else {
            return Ok(AccessResult::NotFound);
        };

        let state = grant.state(now);
        grant.access_attempts += 1;
        grant.updated_at = now;
        if state == GrantState::Active {
            grant.last_accessed_at = Some(now);
            Ok(AccessResult::Granted(grant.counters()))
        } else {
            grant.failed_access_attempts += 1;
            Ok(AccessResult::Denied {
                state,
                counters: grant.counters(),
            })
        }
    }

    async fn revoke(
        &self,
        grant_id: &GrantId,
        reason: Option<&str>,
        now: i64,
    ) -> Result<RevokeResult> {
        let mut inner = self.write()?;

        let Some(grant) = inner.grants.get_mut(grant_id) else {
            return Ok(RevokeResult::NotFound);
        };

        if let Some(revoked_at) = grant.revoked_at {
            return Ok(RevokeResult::AlreadyRevoked { revoked_at });
        }

        grant.revoked_at = Some(now);
        grant.revoke_reason = reason.map(String::from);
        grant.updated_at = now;
        Ok(RevokeResult::Revoked { revoked_at: now })
    }

    async fn extend(
        &self,
        grant_id: &GrantId,
        extra_millis: i64,
        now: i64,
        allow_expired: bool,
    ) -> Result<ExtendResult> {
        let mut inner = self.write()?;

        let Some(grant) = inner.grants.get_mut(grant_id) else {
            return Ok(ExtendResult::NotFound);
        };

        if grant.revoked_at.is_some() {
            return Ok(ExtendResult::Revoked);
        }
        if grant.expires_at <= now && !allow_expired {
            return Ok(ExtendResult::Expired);
        }

        grant.expires_at = grant.expires_at.max(now).saturating_add(extra_millis);
        grant.updated_at = now;
        Ok(ExtendResult::Extended {
            expires_at: grant.expires_at,
        })
    }

    async fn delete_older_than(&self, cutoff: i64) -> Result<u64> {
        let mut inner = self.write()?;

        let stale: Vec<GrantId> = inner
            .grants
            .values()
            .filter(|g| g.expires_at < cutoff)
            .map(|g| g.grant_id)
            .collect();

        for grant_id in &stale {
            inner.remove(grant_id);
        }

        Ok(stale.len() as u64)
    }
}
