// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pooled SQLite connections

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("state must be a JSON object, got {0}")]
    Validation(String),
    #[error("corrupt record for {0}: {1}")]
    Corrupt(String, String),
}

/// Shared handle to the backing database.
#[derive(Clone, Debug)]
pub struct Db {
    pool: SqlitePool,
}

impl Db {
    /// Open (creating if missing) a database file.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new().filename(path).create_if_missing(true);
        let pool = SqlitePoolOptions::new().max_connections(5).connect_with(options).await?;
        Ok(Self { pool })
    }

    /// Open an in-memory database.
    ///
    /// Pinned to a single connection: each SQLite memory database is private
    /// to its connection, so a wider pool would see different databases.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new().in_memory(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Render a scoped table name. The prefix is opaque; it arrives from
/// configuration and is applied to every table the runtime touches.
pub(crate) fn table_name(prefix: Option<&str>, base: &str) -> String {
    match prefix {
        Some(p) => format!("{p}_{base}"),
        None => base.to_string(),
    }
}

pub(crate) fn system_time_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
