// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::db::Db;

async fn column_count(db: &Db, table: &str, column: &str) -> i64 {
    let sql = format!("SELECT COUNT(*) FROM pragma_table_info('{table}') WHERE name = ?");
    let (count,): (i64,) = sqlx::query_as(&sql).bind(column).fetch_one(db.pool()).await.unwrap();
    count
}

#[tokio::test]
async fn fresh_database_migrates_to_latest() {
    let db = Db::open_in_memory().await.unwrap();
    let version = migrate_to_latest(&db, None).await.unwrap();
    assert_eq!(version, LATEST_VERSION);
    assert_eq!(current_version(&db).await.unwrap(), LATEST_VERSION);
}

#[tokio::test]
async fn migrate_to_latest_is_idempotent() {
    let db = Db::open_in_memory().await.unwrap();
    migrate_to_latest(&db, None).await.unwrap();
    let version = migrate_to_latest(&db, None).await.unwrap();
    assert_eq!(version, LATEST_VERSION);
}

#[tokio::test]
async fn v2_drops_legacy_locking_columns() {
    let db = Db::open_in_memory().await.unwrap();
    migrate(&db, None, 0).await.unwrap();

    assert_eq!(column_count(&db, "objects", "locked_by").await, 0);
    assert_eq!(column_count(&db, "objects", "locked_at").await, 0);
}

#[tokio::test]
async fn v3_adds_claimed_at() {
    let db = Db::open_in_memory().await.unwrap();
    migrate(&db, None, 0).await.unwrap();
    assert_eq!(column_count(&db, "alarms", "claimed_at").await, 1);
}

#[tokio::test]
async fn prefixed_scope_applies_full_history() {
    let db = Db::open_in_memory().await.unwrap();
    migrate(&db, None, 0).await.unwrap();

    migrate(&db, Some("tenant"), 0).await.unwrap();
    assert_eq!(column_count(&db, "tenant_alarms", "claimed_at").await, 1);
    assert_eq!(column_count(&db, "tenant_objects", "locked_by").await, 0);
}

#[tokio::test]
async fn prefixed_tables_are_separate() {
    let db = Db::open_in_memory().await.unwrap();
    migrate(&db, None, 0).await.unwrap();
    migrate(&db, Some("tenant"), 0).await.unwrap();

    sqlx::query("INSERT INTO tenant_objects (type, id, state, created_at, updated_at) VALUES ('t', 'x', '{}', 0, 0)")
        .execute(db.pool())
        .await
        .unwrap();
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM objects").fetch_one(db.pool()).await.unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn base_beyond_latest_is_rejected() {
    let db = Db::open_in_memory().await.unwrap();
    let err = migrate(&db, None, LATEST_VERSION + 1).await.unwrap_err();
    assert!(matches!(err, MigrationError::UnknownVersion(_)));
}
