// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::migrations::migrate;
use crate::test_support::memory_db;
use chrono::TimeZone;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};

fn store(db: Db) -> SqlObjectStore {
    SqlObjectStore::new(db, Arc::new(Telemetry::new()))
}

fn at(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap()
}

#[tokio::test]
async fn insert_sets_created_equal_to_updated() {
    let store = store(memory_db().await);
    let key = EntityKey::new("counter", "a");

    let record = store.save(&key, &json!({"count": 1}), None, at(5_000)).await.unwrap();
    assert_eq!(record.created_at, at(5_000));
    assert_eq!(record.updated_at, at(5_000));
    assert_eq!(record.version, 1);
}

#[tokio::test]
async fn update_preserves_created_at() {
    let store = store(memory_db().await);
    let key = EntityKey::new("counter", "a");

    store.save(&key, &json!({"count": 1}), None, at(5_000)).await.unwrap();
    let record = store.save(&key, &json!({"count": 2}), None, at(9_500)).await.unwrap();

    assert_eq!(record.created_at, at(5_000));
    assert_eq!(record.updated_at, at(9_500));
    assert_eq!(record.state.get("count"), Some(&json!(2)));
}

#[tokio::test]
async fn load_round_trips_state() {
    let store = store(memory_db().await);
    let key = EntityKey::new("counter", "a");
    store.save(&key, &json!({"count": 7, "label": "x"}), None, at(1_000)).await.unwrap();

    match store.load(&key, None).await.unwrap() {
        Loaded::Found(record) => {
            assert_eq!(record.key, key);
            assert_eq!(record.state.get("count"), Some(&json!(7)));
            assert_eq!(record.state.get("label"), Some(&json!("x")));
        }
        Loaded::Missing => panic!("expected record"),
    }
}

#[tokio::test]
async fn load_unseen_is_missing() {
    let store = store(memory_db().await);
    let loaded = store.load(&EntityKey::new("counter", "nope"), None).await.unwrap();
    assert_eq!(loaded, Loaded::Missing);
}

#[tokio::test]
async fn delete_is_idempotent() {
    let store = store(memory_db().await);
    let key = EntityKey::new("counter", "a");
    store.save(&key, &json!({"count": 1}), None, at(1_000)).await.unwrap();

    store.delete(&key, None).await.unwrap();
    store.delete(&key, None).await.unwrap();
    assert_eq!(store.load(&key, None).await.unwrap(), Loaded::Missing);
}

#[tokio::test]
async fn non_object_state_is_a_validation_error() {
    let store = store(memory_db().await);
    let err = store
        .save(&EntityKey::new("counter", "a"), &json!([1, 2]), None, at(1_000))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation(kind) if kind == "array"));
}

#[tokio::test]
async fn prefix_scopes_records() {
    let db = memory_db().await;
    migrate(&db, Some("tenant"), 0).await.unwrap();
    let store = store(db);
    let key = EntityKey::new("counter", "a");

    store.save(&key, &json!({"count": 1}), Some("tenant"), at(1_000)).await.unwrap();
    assert_eq!(store.load(&key, None).await.unwrap(), Loaded::Missing);
    assert!(matches!(store.load(&key, Some("tenant")).await.unwrap(), Loaded::Found(_)));
}

#[tokio::test]
async fn operations_emit_spans() {
    let db = memory_db().await;
    let telemetry = Arc::new(Telemetry::new());
    let saves = Arc::new(AtomicUsize::new(0));
    let counter = saves.clone();
    telemetry.attach(stead_core::observe::paths::STORE_SAVE, move |event| {
        if event.phase == stead_core::observe::Phase::Stop {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });
    let store = SqlObjectStore::new(db, telemetry);

    let key = EntityKey::new("counter", "a");
    store.save(&key, &json!({"count": 1}), None, at(1_000)).await.unwrap();
    store.load(&key, None).await.unwrap();

    assert_eq!(saves.load(Ordering::SeqCst), 1);
}
