// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CRUD and claim operations on alarm records.
//!
//! All timestamps are passed in by the caller so pollers drive time through
//! their own clock. The claim update is the only operation that must be
//! strictly atomic; ownership is decided by the affected-row count.

use chrono::{DateTime, Utc};

use stead_core::{AlarmName, EntityKey};

use crate::db::{table_name, Db, StoreError};
use crate::objects::ms_to_utc;

/// A persisted alarm record.
#[derive(Debug, Clone, PartialEq)]
pub struct AlarmRecord {
    pub key: EntityKey,
    pub name: AlarmName,
    pub scheduled_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct AlarmRow {
    kind: String,
    id: String,
    name: String,
    scheduled_at: i64,
    claimed_at: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

impl From<AlarmRow> for AlarmRecord {
    fn from(row: AlarmRow) -> Self {
        AlarmRecord {
            key: EntityKey::new(row.kind, row.id),
            name: AlarmName::new(row.name),
            scheduled_at: ms_to_utc(row.scheduled_at),
            claimed_at: row.claimed_at.map(ms_to_utc),
            created_at: ms_to_utc(row.created_at),
            updated_at: ms_to_utc(row.updated_at),
        }
    }
}

const COLUMNS: &str = "type AS kind, id, name, scheduled_at, claimed_at, created_at, updated_at";

/// Alarm table operations, scoped by an optional prefix.
#[derive(Clone)]
pub struct AlarmStore {
    db: Db,
    prefix: Option<String>,
}

impl AlarmStore {
    pub fn new(db: Db, prefix: Option<String>) -> Self {
        Self { db, prefix }
    }

    fn table(&self) -> String {
        table_name(self.prefix.as_deref(), "alarms")
    }

    /// Upsert on `(type, id, name)`: replaces `scheduled_at` and clears any
    /// outstanding claim.
    pub async fn upsert(
        &self,
        key: &EntityKey,
        name: &AlarmName,
        scheduled_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO {} (type, id, name, scheduled_at, claimed_at, created_at, updated_at)
             VALUES (?, ?, ?, ?, NULL, ?, ?)
             ON CONFLICT (type, id, name) DO UPDATE SET
                 scheduled_at = excluded.scheduled_at,
                 claimed_at = NULL,
                 updated_at = excluded.updated_at",
            self.table()
        );
        sqlx::query(&sql)
            .bind(key.kind.as_str())
            .bind(key.id.as_str())
            .bind(name.as_str())
            .bind(scheduled_at.timestamp_millis())
            .bind(now.timestamp_millis())
            .bind(now.timestamp_millis())
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    /// Unconditional delete; also used to retire orphaned rows.
    pub async fn remove(&self, key: &EntityKey, name: &AlarmName) -> Result<(), StoreError> {
        let sql = format!("DELETE FROM {} WHERE type = ? AND id = ? AND name = ?", self.table());
        sqlx::query(&sql)
            .bind(key.kind.as_str())
            .bind(key.id.as_str())
            .bind(name.as_str())
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    /// Remove every pending alarm for the entity.
    pub async fn remove_all(&self, key: &EntityKey) -> Result<(), StoreError> {
        let sql = format!("DELETE FROM {} WHERE type = ? AND id = ?", self.table());
        sqlx::query(&sql)
            .bind(key.kind.as_str())
            .bind(key.id.as_str())
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    /// Alarms for one entity in ascending `scheduled_at` order.
    pub async fn list(&self, key: &EntityKey) -> Result<Vec<AlarmRecord>, StoreError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM {} WHERE type = ? AND id = ? ORDER BY scheduled_at ASC",
            self.table()
        );
        let rows = sqlx::query_as::<_, AlarmRow>(&sql)
            .bind(key.kind.as_str())
            .bind(key.id.as_str())
            .fetch_all(self.db.pool())
            .await?;
        Ok(rows.into_iter().map(AlarmRecord::from).collect())
    }

    /// Rows due at `now` that are unclaimed or whose claim has gone stale.
    pub async fn due(
        &self,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<AlarmRecord>, StoreError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM {}
             WHERE scheduled_at <= ? AND (claimed_at IS NULL OR claimed_at <= ?)
             ORDER BY scheduled_at ASC LIMIT ?",
            self.table()
        );
        let rows = sqlx::query_as::<_, AlarmRow>(&sql)
            .bind(now.timestamp_millis())
            .bind(stale_before.timestamp_millis())
            .bind(limit)
            .fetch_all(self.db.pool())
            .await?;
        Ok(rows.into_iter().map(AlarmRecord::from).collect())
    }

    /// Atomically take responsibility for firing one row.
    ///
    /// Returns true when this caller won: the conditional update matched an
    /// unclaimed or stale row and stamped it with `claim_ts`.
    pub async fn claim(
        &self,
        key: &EntityKey,
        name: &AlarmName,
        claim_ts: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let sql = format!(
            "UPDATE {} SET claimed_at = ?, updated_at = ?
             WHERE type = ? AND id = ? AND name = ?
               AND (claimed_at IS NULL OR claimed_at <= ?)",
            self.table()
        );
        let result = sqlx::query(&sql)
            .bind(claim_ts.timestamp_millis())
            .bind(claim_ts.timestamp_millis())
            .bind(key.kind.as_str())
            .bind(key.id.as_str())
            .bind(name.as_str())
            .bind(stale_before.timestamp_millis())
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Delete a fired row, but only while it still carries this claim.
    ///
    /// Zero rows deleted means the handler rescheduled the alarm between
    /// claim and retire (the upsert cleared `claimed_at`), which leaves the
    /// new row intact.
    pub async fn retire(
        &self,
        key: &EntityKey,
        name: &AlarmName,
        claim_ts: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let sql = format!(
            "DELETE FROM {} WHERE type = ? AND id = ? AND name = ? AND claimed_at = ?",
            self.table()
        );
        let result = sqlx::query(&sql)
            .bind(key.kind.as_str())
            .bind(key.id.as_str())
            .bind(name.as_str())
            .bind(claim_ts.timestamp_millis())
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
#[path = "alarms_tests.rs"]
mod tests;
