//! Forward-compatible loading: unknown keys dropped, new fields defaulted.

use crate::prelude::*;
use std::sync::Arc;

use stead_core::{EntityKey, Telemetry};
use stead_store::{Loaded, ObjectStore, SqlObjectStore};

#[tokio::test]
async fn legacy_row_loads_and_saves_back_only_declared_fields() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_migrated(&dir.path().join("stead.db")).await;
    let store = SqlObjectStore::new(db.clone(), Arc::new(Telemetry::new()));
    let key = EntityKey::new("counter", "old");

    // A row written by an earlier schema: one extra key, no `count` yet.
    store
        .save(&key, &json!({"legacy_field": 7}), None, chrono::Utc::now())
        .await
        .unwrap();

    let rt = start_runtime(db).await;

    // Activation succeeds; the declared field adopts its default.
    let reply = rt.invoke("counter", "old", "get", vec![]).await.unwrap();
    assert_eq!(reply_i64(&reply), 0);

    // Writing back persists only declared fields.
    rt.invoke("counter", "old", "increment", vec![json!(3)]).await.unwrap();
    let Loaded::Found(record) = store.load(&key, None).await.unwrap() else {
        panic!("expected record");
    };
    assert_eq!(record.state.get("count"), Some(&json!(3)));
    assert!(!record.state.contains_key("legacy_field"));
    assert!(!record.state.contains_key("id"));
}
