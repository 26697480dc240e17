// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CRUD on entity records

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::sync::Arc;

use stead_core::observe::{paths, Metadata, Telemetry};
use stead_core::EntityKey;

use crate::db::{system_time_ms, table_name, Db, StoreError};

/// A persisted entity record.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRecord {
    pub key: EntityKey,
    pub state: Map<String, Value>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of a load: the record, or nothing persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub enum Loaded {
    Found(ObjectRecord),
    Missing,
}

#[derive(sqlx::FromRow)]
struct ObjectRow {
    kind: String,
    id: String,
    state: String,
    version: i64,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<ObjectRow> for ObjectRecord {
    type Error = StoreError;

    fn try_from(row: ObjectRow) -> Result<Self, Self::Error> {
        let key = EntityKey::new(row.kind, row.id);
        let state = match serde_json::from_str::<Value>(&row.state) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                return Err(StoreError::Corrupt(key.to_string(), format!("non-object state: {other}")))
            }
            Err(e) => return Err(StoreError::Corrupt(key.to_string(), e.to_string())),
        };
        Ok(ObjectRecord {
            key,
            state,
            version: row.version,
            created_at: ms_to_utc(row.created_at),
            updated_at: ms_to_utc(row.updated_at),
        })
    }
}

pub(crate) fn ms_to_utc(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

/// Persistence port for entity records.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn load(&self, key: &EntityKey, prefix: Option<&str>) -> Result<Loaded, StoreError>;

    /// Upsert on `(type, id)`. Sets `updated_at` to `now`; an insert also
    /// sets `created_at = updated_at`.
    async fn save(
        &self,
        key: &EntityKey,
        state: &Value,
        prefix: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ObjectRecord, StoreError>;

    /// Idempotent delete.
    async fn delete(&self, key: &EntityKey, prefix: Option<&str>) -> Result<(), StoreError>;
}

/// The SQL-backed store.
#[derive(Clone)]
pub struct SqlObjectStore {
    db: Db,
    telemetry: Arc<Telemetry>,
}

impl SqlObjectStore {
    pub fn new(db: Db, telemetry: Arc<Telemetry>) -> Self {
        Self { db, telemetry }
    }

    fn metadata(key: &EntityKey) -> Metadata {
        Metadata::entity(key.kind.as_str(), key.id.as_str()).store("sqlite")
    }
}

#[async_trait]
impl ObjectStore for SqlObjectStore {
    async fn load(&self, key: &EntityKey, prefix: Option<&str>) -> Result<Loaded, StoreError> {
        let table = table_name(prefix, "objects");
        let sql = format!(
            "SELECT type AS kind, id, state, version, created_at, updated_at
             FROM {table} WHERE type = ? AND id = ?"
        );
        self.telemetry
            .observe(paths::STORE_LOAD, Self::metadata(key), system_time_ms(), async {
                let row = sqlx::query_as::<_, ObjectRow>(&sql)
                    .bind(key.kind.as_str())
                    .bind(key.id.as_str())
                    .fetch_optional(self.db.pool())
                    .await?;
                match row {
                    Some(row) => Ok(Loaded::Found(row.try_into()?)),
                    None => Ok(Loaded::Missing),
                }
            })
            .await
    }

    async fn save(
        &self,
        key: &EntityKey,
        state: &Value,
        prefix: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ObjectRecord, StoreError> {
        let table = table_name(prefix, "objects");
        let sql = format!(
            "INSERT INTO {table} (type, id, state, version, created_at, updated_at)
             VALUES (?, ?, ?, 1, ?, ?)
             ON CONFLICT (type, id) DO UPDATE SET
                 state = excluded.state,
                 updated_at = excluded.updated_at
             RETURNING type AS kind, id, state, version, created_at, updated_at"
        );
        let state_json = state.to_string();
        let now_ms = now.timestamp_millis();
        self.telemetry
            .observe(paths::STORE_SAVE, Self::metadata(key), system_time_ms(), async {
                if !state.is_object() {
                    return Err(StoreError::Validation(value_kind(state).to_string()));
                }
                let row = sqlx::query_as::<_, ObjectRow>(&sql)
                    .bind(key.kind.as_str())
                    .bind(key.id.as_str())
                    .bind(&state_json)
                    .bind(now_ms)
                    .bind(now_ms)
                    .fetch_one(self.db.pool())
                    .await?;
                row.try_into()
            })
            .await
    }

    async fn delete(&self, key: &EntityKey, prefix: Option<&str>) -> Result<(), StoreError> {
        let table = table_name(prefix, "objects");
        let sql = format!("DELETE FROM {table} WHERE type = ? AND id = ?");
        self.telemetry
            .observe(paths::STORE_DELETE, Self::metadata(key), system_time_ms(), async {
                sqlx::query(&sql)
                    .bind(key.kind.as_str())
                    .bind(key.id.as_str())
                    .execute(self.db.pool())
                    .await?;
                Ok(())
            })
            .await
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
#[path = "objects_tests.rs"]
mod tests;
