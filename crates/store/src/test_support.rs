// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Database fixtures and a failure-injecting store for tests.

#![allow(clippy::unwrap_used)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use stead_core::EntityKey;

use crate::db::{Db, StoreError};
use crate::migrations::migrate_to_latest;
use crate::objects::{Loaded, ObjectRecord, ObjectStore};

/// Fresh in-memory database with the latest schema.
pub async fn memory_db() -> Db {
    let db = Db::open_in_memory().await.unwrap();
    migrate_to_latest(&db, None).await.unwrap();
    db
}

/// Open (creating if missing) a file-backed database with the latest schema.
pub async fn open_migrated(path: &Path) -> Db {
    let db = Db::open(path).await.unwrap();
    migrate_to_latest(&db, None).await.unwrap();
    db
}

/// Wrapper that fails a configured number of upcoming operations, for
/// rollback and load-failure tests.
pub struct FlakyStore {
    inner: Arc<dyn ObjectStore>,
    failing_saves: AtomicU32,
    failing_loads: AtomicU32,
}

impl FlakyStore {
    pub fn new(inner: Arc<dyn ObjectStore>) -> Self {
        Self { inner, failing_saves: AtomicU32::new(0), failing_loads: AtomicU32::new(0) }
    }

    pub fn fail_next_save(&self) {
        self.failing_saves.fetch_add(1, Ordering::SeqCst);
    }

    pub fn fail_next_load(&self) {
        self.failing_loads.fetch_add(1, Ordering::SeqCst);
    }

    fn take(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl ObjectStore for FlakyStore {
    async fn load(&self, key: &EntityKey, prefix: Option<&str>) -> Result<Loaded, StoreError> {
        if Self::take(&self.failing_loads) {
            return Err(StoreError::Validation("injected load failure".into()));
        }
        self.inner.load(key, prefix).await
    }

    async fn save(
        &self,
        key: &EntityKey,
        state: &Value,
        prefix: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ObjectRecord, StoreError> {
        if Self::take(&self.failing_saves) {
            return Err(StoreError::Validation("injected save failure".into()));
        }
        self.inner.save(key, state, prefix, now).await
    }

    async fn delete(&self, key: &EntityKey, prefix: Option<&str>) -> Result<(), StoreError> {
        self.inner.delete(key, prefix).await
    }
}
