// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

async fn flaky_runtime() -> (Runtime, Arc<FlakyStore>, Db) {
    let db = memory_db().await;
    let telemetry = Arc::new(Telemetry::new());
    let flaky = Arc::new(FlakyStore::new(Arc::new(SqlObjectStore::new(
        db.clone(),
        telemetry.clone(),
    ))));
    let rt = RuntimeBuilder::new(test_catalog())
        .db(db.clone())
        .store(flaky.clone())
        .telemetry(telemetry)
        .start()
        .await
        .unwrap();
    (rt, flaky, db)
}

async fn raw_state(db: &Db, key: &EntityKey) -> serde_json::Map<String, serde_json::Value> {
    let store = SqlObjectStore::new(db.clone(), Arc::new(Telemetry::new()));
    match store.load(key, None).await.unwrap() {
        Loaded::Found(record) => record.state,
        Loaded::Missing => panic!("expected record for {key}"),
    }
}

#[tokio::test]
async fn first_activation_seeds_the_default_record() {
    let db = memory_db().await;
    let rt = RuntimeBuilder::new(test_catalog()).db(db.clone()).start().await.unwrap();

    rt.ensure_activated("counter", "fresh").await.unwrap();

    let state = raw_state(&db, &EntityKey::new("counter", "fresh")).await;
    assert_eq!(state.get("count"), Some(&json!(0)));
}

#[tokio::test]
async fn rejected_save_rolls_back_memory_and_storage() {
    let (rt, flaky, db) = flaky_runtime().await;
    let key = EntityKey::new("counter", "c1");

    rt.ensure_activated("counter", "c1").await.unwrap();
    flaky.fail_next_save();

    let err = rt.invoke("counter", "c1", "increment", vec![json!(1)]).await.unwrap_err();
    assert!(matches!(err, CallError::Persistence(_)));

    // In-memory state reverted.
    let reply = rt.invoke("counter", "c1", "get", vec![]).await.unwrap();
    assert_eq!(reply.value(), Some(&json!(0)));
    // Storage row matches.
    assert_eq!(raw_state(&db, &key).await.get("count"), Some(&json!(0)));
}

#[tokio::test]
async fn next_mutation_after_rollback_succeeds() {
    let (rt, flaky, _db) = flaky_runtime().await;
    rt.ensure_activated("counter", "c1").await.unwrap();
    flaky.fail_next_save();

    rt.invoke("counter", "c1", "increment", vec![json!(1)]).await.unwrap_err();
    let reply = rt.invoke("counter", "c1", "increment", vec![json!(2)]).await.unwrap();
    assert_eq!(reply.value(), Some(&json!(2)));
}

#[tokio::test]
async fn load_failure_terminates_activation_and_next_call_retries() {
    let (rt, flaky, _db) = flaky_runtime().await;
    flaky.fail_next_load();

    let err = rt.invoke("counter", "c1", "get", vec![]).await.unwrap_err();
    assert!(matches!(err, CallError::Load(_)));
    assert!(rt.locate("counter", "c1").is_none());

    let reply = rt.invoke("counter", "c1", "get", vec![]).await.unwrap();
    assert_eq!(reply.value(), Some(&json!(0)));
}

#[tokio::test]
async fn unchanged_state_skips_the_save() {
    let mut catalog = Catalog::new();
    catalog
        .register(
            EntityDef::builder("echo")
                .field("value", 0)
                .handler("peek", 0, |_, state| {
                    // Declared state change that is structurally identical.
                    Return::reply_update(state.integer("value").unwrap_or(0), state.clone())
                })
                .build()
                .unwrap(),
        )
        .unwrap();
    let telemetry = Arc::new(Telemetry::new());
    let saves = span_counter(&telemetry, paths::STORE_SAVE);
    let rt = RuntimeBuilder::new(catalog)
        .db(memory_db().await)
        .telemetry(telemetry)
        .start()
        .await
        .unwrap();

    rt.invoke("echo", "e1", "peek", vec![]).await.unwrap();
    let after_seed = saves.load(Ordering::SeqCst);

    rt.invoke("echo", "e1", "peek", vec![]).await.unwrap();
    rt.invoke("echo", "e1", "peek", vec![]).await.unwrap();
    assert_eq!(saves.load(Ordering::SeqCst), after_seed);
}

#[tokio::test]
async fn legacy_keys_are_dropped_and_new_fields_defaulted() {
    let db = memory_db().await;
    let store = SqlObjectStore::new(db.clone(), Arc::new(Telemetry::new()));
    let key = EntityKey::new("counter", "old");
    // A row written before the current schema: an extra legacy key, and no
    // value for a later-declared field.
    store
        .save(&key, &json!({"legacy_field": 7}), None, chrono::Utc::now())
        .await
        .unwrap();

    let rt = RuntimeBuilder::new(test_catalog()).db(db.clone()).start().await.unwrap();
    let reply = rt.invoke("counter", "old", "get", vec![]).await.unwrap();
    assert_eq!(reply.value(), Some(&json!(0)));

    // Saving back writes only declared fields.
    rt.invoke("counter", "old", "increment", vec![json!(1)]).await.unwrap();
    let state = raw_state(&db, &key).await;
    assert!(!state.contains_key("legacy_field"));
    assert_eq!(state.get("count"), Some(&json!(1)));
}

#[tokio::test]
async fn existing_symbols_policy_fails_activation_on_unknown_nested_key() {
    let mut catalog = Catalog::new();
    catalog
        .register(
            EntityDef::builder("doc")
                .field("meta", json!({}))
                .handler("get", 0, |_, state| {
                    Return::reply(state.get("meta").cloned().unwrap_or_default())
                })
                .key_policy(KeyPolicy::ExistingSymbols)
                .build()
                .unwrap(),
        )
        .unwrap();
    let db = memory_db().await;
    let store = SqlObjectStore::new(db.clone(), Arc::new(Telemetry::new()));
    store
        .save(
            &EntityKey::new("doc", "d1"),
            &json!({"meta": {"mystery": 1}}),
            None,
            chrono::Utc::now(),
        )
        .await
        .unwrap();

    let rt = RuntimeBuilder::new(catalog).db(db).start().await.unwrap();
    let err = rt.invoke("doc", "d1", "get", vec![]).await.unwrap_err();
    assert!(matches!(err, CallError::Load(_)));
}

#[tokio::test]
async fn create_symbols_policy_interns_and_loads() {
    let mut catalog = Catalog::new();
    catalog
        .register(
            EntityDef::builder("doc")
                .field("meta", json!({}))
                .handler("get", 0, |_, state| {
                    Return::reply(state.get("meta").cloned().unwrap_or_default())
                })
                .key_policy(KeyPolicy::CreateSymbols)
                .build()
                .unwrap(),
        )
        .unwrap();
    let db = memory_db().await;
    let store = SqlObjectStore::new(db.clone(), Arc::new(Telemetry::new()));
    store
        .save(&EntityKey::new("doc", "d1"), &json!({"meta": {"fresh": 1}}), None, chrono::Utc::now())
        .await
        .unwrap();

    let rt = RuntimeBuilder::new(catalog).db(db).start().await.unwrap();
    let reply = rt.invoke("doc", "d1", "get", vec![]).await.unwrap();
    assert_eq!(reply.value(), Some(&json!({"fresh": 1})));
}

#[tokio::test]
async fn after_load_rewrite_is_persisted_before_ready() {
    let mut catalog = Catalog::new();
    catalog
        .register(
            EntityDef::builder("session")
                .field("resumed", 0)
                .handler("get", 0, |_, state| {
                    Return::reply(state.integer("resumed").unwrap_or(0))
                })
                .after_load(|state| {
                    let n = state.integer("resumed").unwrap_or(0) + 1;
                    stead_core::AfterLoad::state(state.with("resumed", n))
                })
                .build()
                .unwrap(),
        )
        .unwrap();
    let db = memory_db().await;
    let rt = RuntimeBuilder::new(catalog).db(db.clone()).start().await.unwrap();

    let reply = rt.invoke("session", "s1", "get", vec![]).await.unwrap();
    assert_eq!(reply.value(), Some(&json!(1)));
    assert_eq!(raw_state(&db, &EntityKey::new("session", "s1")).await.get("resumed"), Some(&json!(1)));

    // A fresh activation runs the hook again.
    rt.deactivate("session", "s1", "test").await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    let reply = rt.invoke("session", "s1", "get", vec![]).await.unwrap();
    assert_eq!(reply.value(), Some(&json!(2)));
}
