//! SQLite implementation of the GrantStore trait.
//!
//! This is the primary storage backend. It uses rusqlite with bundled
//! SQLite, wrapped in async via tokio::spawn_blocking. Every mutating
//! operation is a single SQL statement, so SQLite's own write lock provides
//! the atomicity the controller relies on.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use accessvault_core::{
    AccessGrant, AttemptCounters, ContentId, GrantId, GrantState, NewGrant, UserId,
};
use accessvault_crypto::{AlgorithmVersion, AuthTag, Iv, SealedLocator};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{AccessResult, ExtendResult, GrantStore, RevokeResult, UpsertResult};

/// How long a statement waits on a locked database file before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const GRANT_COLUMNS: &str = "grant_id, user_id, content_id, algorithm, iv, auth_tag, ciphertext,
     expires_at, revoked_at, revoke_reason, access_attempts, failed_access_attempts,
     last_accessed_at, purchase_ref, content_type, created_at, updated_at";

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation on the connection off the async runtime.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|_| StoreError::LockPoisoned)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn conversion_error<E>(idx: usize, ty: Type, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, ty, Box::new(err))
}

// Helper to convert a row to AccessGrant
fn row_to_grant(row: &rusqlite::Row<'_>) -> rusqlite::Result<AccessGrant> {
    let grant_id_bytes: Vec<u8> = row.get("grant_id")?;
    let user_id: String = row.get("user_id")?;
    let content_id: String = row.get("content_id")?;
    let algorithm: u8 = row.get("algorithm")?;
    let iv_bytes: Vec<u8> = row.get("iv")?;
    let tag_bytes: Vec<u8> = row.get("auth_tag")?;

    let grant_id = GrantId::try_from(grant_id_bytes.as_slice())
        .map_err(|e| conversion_error(0, Type::Blob, e))?;
    let user_id = UserId::new(user_id).map_err(|e| conversion_error(1, Type::Text, e))?;
    let content_id = ContentId::new(content_id).map_err(|e| conversion_error(2, Type::Text, e))?;
    let algorithm =
        AlgorithmVersion::from_u8(algorithm).map_err(|e| conversion_error(3, Type::Integer, e))?;
    let iv = Iv::from_slice(&iv_bytes).map_err(|e| conversion_error(4, Type::Blob, e))?;
    let auth_tag = AuthTag::from_slice(&tag_bytes).map_err(|e| conversion_error(5, Type::Blob, e))?;

    Ok(AccessGrant {
        grant_id,
        user_id,
        content_id,
        sealed: SealedLocator {
            algorithm,
            iv,
            auth_tag,
            ciphertext: row.get("ciphertext")?,
        },
        expires_at: row.get("expires_at")?,
        revoked_at: row.get("revoked_at")?,
        revoke_reason: row.get("revoke_reason")?,
        access_attempts: row.get::<_, i64>("access_attempts")? as u64,
        failed_access_attempts: row.get::<_, i64>("failed_access_attempts")? as u64,
        last_accessed_at: row.get("last_accessed_at")?,
        purchase_ref: row.get("purchase_ref")?,
        content_type: row.get("content_type")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

#[async_trait]
impl GrantStore for SqliteStore {
    async fn upsert_grant(&self, grant: &NewGrant, now: i64) -> Result<UpsertResult> {
        let grant = grant.clone();

        self.with_conn(move |conn| {
            let grant_id = grant.grant_id();
            let tx = conn.transaction()?;

            let exists = tx
                .query_row(
                    "SELECT 1 FROM access_grants WHERE grant_id = ?1",
                    params![grant_id.as_bytes().as_slice()],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();

            // The sealed columns are always written in this one statement.
            tx.execute(
                "INSERT INTO access_grants (
                    grant_id, user_id, content_id, algorithm, iv, auth_tag, ciphertext,
                    expires_at, purchase_ref, content_type, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
                ON CONFLICT(grant_id) DO UPDATE SET
                    algorithm = excluded.algorithm,
                    iv = excluded.iv,
                    auth_tag = excluded.auth_tag,
                    ciphertext = excluded.ciphertext,
                    expires_at = excluded.expires_at,
                    purchase_ref = excluded.purchase_ref,
                    content_type = excluded.content_type,
                    access_attempts = 0,
                    failed_access_attempts = 0,
                    last_accessed_at = NULL,
                    updated_at = excluded.updated_at",
                params![
                    grant_id.as_bytes().as_slice(),
                    grant.user_id.as_str(),
                    grant.content_id.as_str(),
                    grant.sealed.algorithm.to_u8(),
                    grant.sealed.iv.as_bytes().as_slice(),
                    grant.sealed.auth_tag.as_bytes().as_slice(),
                    grant.sealed.ciphertext.as_slice(),
                    grant.expires_at,
                    grant.purchase_ref.as_str(),
                    grant.content_type.as_str(),
                    now,
                ],
            )?;

            tx.commit()?;

            Ok(if exists {
                UpsertResult::Replaced
            } else {
                UpsertResult::Created
            })
        })
        .await
    }

    async fn get_grant(&self, grant_id: &GrantId) -> Result<Option<AccessGrant>> {
        let grant_id = *grant_id;

        self.with_conn(move |conn| {
            conn.query_row(
                &format!("SELECT {} FROM access_grants WHERE grant_id = ?1", GRANT_COLUMNS),
                params![grant_id.as_bytes().as_slice()],
                row_to_grant,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<AccessGrant>> {
        let user_id = user_id.clone();

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM access_grants WHERE user_id = ?1 ORDER BY content_id",
                GRANT_COLUMNS
            ))?;

            let grants = stmt
                .query_map(params![user_id.as_str()], row_to_grant)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(grants)
        })
        .await
    }

    async fn count(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM access_grants", [], |row| row.get(0))?;
            Ok(count as u64)
        })
        .await
    }

    async fn record_attempt(
        &self,
        grant_id: &GrantId,
        success: bool,
        now: i64,
    ) -> Result<Option<AttemptCounters>> {
        let grant_id = *grant_id;

        self.with_conn(move |conn| {
            conn.query_row(
                "UPDATE access_grants SET
                    access_attempts = access_attempts + 1,
                    failed_access_attempts = failed_access_attempts + (1 - ?2),
                    last_accessed_at = CASE WHEN ?2 = 1 THEN ?3 ELSE last_accessed_at END,
                    updated_at = ?3
                 WHERE grant_id = ?1
                 RETURNING access_attempts, failed_access_attempts, last_accessed_at",
                params![grant_id.as_bytes().as_slice(), success as i64, now],
                |row| {
                    Ok(AttemptCounters {
                        access_attempts: row.get::<_, i64>(0)? as u64,
                        failed_access_attempts: row.get::<_, i64>(1)? as u64,
                        last_accessed_at: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn record_access(&self, grant_id: &GrantId, now: i64) -> Result<AccessResult> {
        let grant_id = *grant_id;

        // SET expressions read the row as it was before the update.
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "UPDATE access_grants SET
                        access_attempts = access_attempts + 1,
                        failed_access_attempts = failed_access_attempts
                            + CASE WHEN revoked_at IS NULL AND expires_at > ?2 THEN 0 ELSE 1 END,
                        last_accessed_at = CASE WHEN revoked_at IS NULL AND expires_at > ?2
                            THEN ?2 ELSE last_accessed_at END,
                        updated_at = ?2
                     WHERE grant_id = ?1
                     RETURNING access_attempts, failed_access_attempts, last_accessed_at,
                               revoked_at, expires_at",
                    params![grant_id.as_bytes().as_slice(), now],
                    |row| {
                        let counters = AttemptCounters {
                            access_attempts: row.get::<_, i64>(0)? as u64,
                            failed_access_attempts: row.get::<_, i64>(1)? as u64,
                            last_accessed_at: row.get(2)?,
                        };
                        let state = GrantState::evaluate(row.get(3)?, row.get(4)?, now);
                        Ok((state, counters))
                    },
                )
                .optional()?;

            Ok(match row {
                None => AccessResult::NotFound,
                Some((GrantState::Active, counters)) => AccessResult::Granted(counters),
                Some((state, counters)) => AccessResult::Denied { state, counters },
            })
        })
        .await
    }

    async fn revoke(
        &self,
        grant_id: &GrantId,
        reason: Option<&str>,
        now: i64,
    ) -> Result<RevokeResult> {
        let grant_id = *grant_id;
        let reason = reason.map(String::from);

        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE access_grants SET revoked_at = ?2, revoke_reason = ?3, updated_at = ?2
                 WHERE grant_id = ?1 AND revoked_at IS NULL",
                params![grant_id.as_bytes().as_slice(), now, reason],
            )?;

            if changed == 1 {
                return Ok(RevokeResult::Revoked { revoked_at: now });
            }

            // Nothing changed: either already revoked (terminal, so this
            // read cannot race a clear) or missing.
            let existing: Option<Option<i64>> = conn
                .query_row(
                    "SELECT revoked_at FROM access_grants WHERE grant_id = ?1",
                    params![grant_id.as_bytes().as_slice()],
                    |row| row.get(0),
                )
                .optional()?;

            Ok(match existing {
                Some(Some(revoked_at)) => RevokeResult::AlreadyRevoked { revoked_at },
                Some(None) => {
                    return Err(StoreError::InvalidData(
                        "revoke matched no row but grant is not revoked".into(),
                    ))
                }
                None => RevokeResult::NotFound,
            })
        })
        .await
    }

    async fn extend(
        &self,
        grant_id: &GrantId,
        extra_millis: i64,
        now: i64,
        allow_expired: bool,
    ) -> Result<ExtendResult> {
        let grant_id = *grant_id;

        self.with_conn(move |conn| {
            let extended: Option<i64> = conn
                .query_row(
                    "UPDATE access_grants SET
                        expires_at = MAX(expires_at, ?3) + ?2,
                        updated_at = ?3
                     WHERE grant_id = ?1
                       AND revoked_at IS NULL
                       AND (?4 = 1 OR expires_at > ?3)
                     RETURNING expires_at",
                    params![
                        grant_id.as_bytes().as_slice(),
                        extra_millis,
                        now,
                        allow_expired as i64
                    ],
                    |row| row.get(0),
                )
                .optional()?;

            if let Some(expires_at) = extended {
                return Ok(ExtendResult::Extended { expires_at });
            }

            let existing: Option<Option<i64>> = conn
                .query_row(
                    "SELECT revoked_at FROM access_grants WHERE grant_id = ?1",
                    params![grant_id.as_bytes().as_slice()],
                    |row| row.get(0),
                )
                .optional()?;

            Ok(match existing {
                Some(Some(_)) => ExtendResult::Revoked,
                Some(None) => ExtendResult::Expired,
                None => ExtendResult::NotFound,
            })
        })
        .await
    }

    async fn delete_older_than(&self, cutoff: i64) -> Result<u64> {
        self.with_conn(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM access_grants WHERE expires_at < ?1",
                params![cutoff],
            )?;
            Ok(deleted as u64)
        })
        .await
    }
}
