//! Failed persistence rolls back both memory and storage.

use crate::prelude::*;
use std::sync::Arc;

use stead_core::Telemetry;
use stead_store::test_support::FlakyStore;
use stead_store::{Loaded, ObjectStore, SqlObjectStore};

#[tokio::test]
async fn rejected_write_reverts_to_the_pre_handler_value() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_migrated(&dir.path().join("stead.db")).await;
    let telemetry = Arc::new(Telemetry::new());
    let sql = Arc::new(SqlObjectStore::new(db.clone(), telemetry.clone()));
    let flaky = Arc::new(FlakyStore::new(sql.clone()));

    let rt = RuntimeBuilder::new(test_catalog())
        .db(db)
        .store(flaky.clone())
        .telemetry(telemetry)
        .options(fast_options())
        .start()
        .await
        .unwrap();

    // Persisted count is 0.
    rt.ensure_activated("counter", "c1").await.unwrap();

    flaky.fail_next_save();
    let err = rt.invoke("counter", "c1", "increment", vec![json!(1)]).await.unwrap_err();
    assert!(matches!(err, CallError::Persistence(_)), "got {err:?}");

    // In-memory read through the live instance.
    let reply = rt.invoke("counter", "c1", "get", vec![]).await.unwrap();
    assert_eq!(reply_i64(&reply), 0);

    // Storage row read directly.
    let key = stead_core::EntityKey::new("counter", "c1");
    let Loaded::Found(record) = sql.load(&key, None).await.unwrap() else {
        panic!("expected a seeded record");
    };
    assert_eq!(record.state.get("count"), Some(&json!(0)));
}
