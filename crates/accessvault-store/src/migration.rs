//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;

use accessvault_core::now_millis;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
            tracing::debug!(version, "applied schema migration");
        }

        tx.commit()?;
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- One row per (user_id, content_id)
        CREATE TABLE access_grants (
            grant_id BLOB PRIMARY KEY,          -- 32 bytes, Blake3 of (user_id, content_id)
            user_id TEXT NOT NULL,
            content_id TEXT NOT NULL,
            algorithm INTEGER NOT NULL,         -- AlgorithmVersion as u8
            iv BLOB NOT NULL,                   -- 12 bytes
            auth_tag BLOB NOT NULL,             -- 16 bytes
            ciphertext BLOB NOT NULL,
            expires_at INTEGER NOT NULL,        -- Unix ms
            revoked_at INTEGER,                 -- Unix ms, never cleared once set
            revoke_reason TEXT,
            access_attempts INTEGER NOT NULL DEFAULT 0,
            failed_access_attempts INTEGER NOT NULL DEFAULT 0,
            last_accessed_at INTEGER,
            purchase_ref TEXT NOT NULL,
            content_type TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,

            UNIQUE(user_id, content_id),       -- also serves per-user listing
            CHECK (failed_access_attempts >= 0),
            CHECK (access_attempts >= failed_access_attempts)
        );

        CREATE INDEX idx_grants_expires ON access_grants(expires_at);
        "#,
    )?;

    Ok(())
}
