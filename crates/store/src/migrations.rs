// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Versioned schema migrations.
//!
//! Migrations apply incrementally from a caller-supplied `base` (the current
//! on-disk version) so multi-tenant prefixes can be upgraded independently.
//! History:
//! - v1: `objects` and `alarms` tables, unique keys, `scheduled_at` index
//!   (the original `objects` carried `locked_by`/`locked_at` columns)
//! - v2: drops the legacy locking columns
//! - v3: adds `claimed_at` to `alarms`

use thiserror::Error;

use crate::db::{table_name, Db};

pub const LATEST_VERSION: u32 = 3;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("unknown schema version {0} (latest is {LATEST_VERSION})")]
    UnknownVersion(u32),
}

/// Apply migrations `base+1..=LATEST_VERSION` for the given prefix.
/// Returns the resulting version.
pub async fn migrate(db: &Db, prefix: Option<&str>, base: u32) -> Result<u32, MigrationError> {
    if base > LATEST_VERSION {
        return Err(MigrationError::UnknownVersion(base));
    }
    for version in (base + 1)..=LATEST_VERSION {
        apply_step(db, prefix, version).await?;
        tracing::debug!(version, prefix = prefix.unwrap_or_default(), "applied schema migration");
    }
    Ok(LATEST_VERSION)
}

/// The schema version recorded in the database file.
///
/// Tracked via SQLite's `user_version` pragma; prefixed scopes created in
/// the same file share it, so multi-prefix upgrades pass `base` explicitly
/// to [`migrate`] instead.
pub async fn current_version(db: &Db) -> Result<u32, MigrationError> {
    let (version,): (i64,) =
        sqlx::query_as("PRAGMA user_version").fetch_one(db.pool()).await?;
    Ok(version as u32)
}

/// Migrate from the recorded version and record the result.
pub async fn migrate_to_latest(db: &Db, prefix: Option<&str>) -> Result<u32, MigrationError> {
    let base = current_version(db).await?;
    let version = migrate(db, prefix, base).await?;
    sqlx::query(&format!("PRAGMA user_version = {version}"))
        .execute(db.pool())
        .await?;
    Ok(version)
}

async fn apply_step(db: &Db, prefix: Option<&str>, version: u32) -> Result<(), MigrationError> {
    let objects = table_name(prefix, "objects");
    let alarms = table_name(prefix, "alarms");
    let statements: Vec<String> = match version {
        1 => vec![
            format!(
                "CREATE TABLE IF NOT EXISTS {objects} (
                    type TEXT NOT NULL,
                    id TEXT NOT NULL,
                    state TEXT NOT NULL,
                    version INTEGER NOT NULL DEFAULT 1,
                    locked_by TEXT,
                    locked_at INTEGER,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL,
                    PRIMARY KEY (type, id)
                )"
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {alarms} (
                    type TEXT NOT NULL,
                    id TEXT NOT NULL,
                    name TEXT NOT NULL,
                    scheduled_at INTEGER NOT NULL,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL,
                    PRIMARY KEY (type, id, name)
                )"
            ),
            format!("CREATE INDEX IF NOT EXISTS idx_{alarms}_scheduled_at ON {alarms} (scheduled_at)"),
        ],
        2 => vec![
            format!("ALTER TABLE {objects} DROP COLUMN locked_by"),
            format!("ALTER TABLE {objects} DROP COLUMN locked_at"),
        ],
        3 => vec![format!("ALTER TABLE {alarms} ADD COLUMN claimed_at INTEGER")],
        other => return Err(MigrationError::UnknownVersion(other)),
    };
    for sql in statements {
        sqlx::query(&sql).execute(db.pool()).await?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "migration_tests.rs"]
mod tests;
