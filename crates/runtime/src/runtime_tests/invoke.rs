// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn increment_replies_and_reads_back() {
    let rt = counter_runtime().await;

    let reply = rt.invoke("counter", "visits", "increment", vec![json!(5)]).await.unwrap();
    assert_eq!(reply.value(), Some(&json!(5)));

    let reply = rt.invoke("counter", "visits", "get", vec![]).await.unwrap();
    assert_eq!(reply.value(), Some(&json!(5)));
}

#[tokio::test]
async fn entities_are_isolated_by_id() {
    let rt = counter_runtime().await;
    rt.invoke("counter", "a", "increment", vec![json!(3)]).await.unwrap();
    rt.invoke("counter", "b", "increment", vec![json!(10)]).await.unwrap();

    let reply = rt.invoke("counter", "a", "get", vec![]).await.unwrap();
    assert_eq!(reply.value(), Some(&json!(3)));
}

#[tokio::test]
async fn unknown_handler_name_is_rejected() {
    let rt = counter_runtime().await;
    let err = rt.invoke("counter", "a", "reset", vec![]).await.unwrap_err();
    assert_eq!(err, CallError::UnknownHandler("reset".into()));
}

#[tokio::test]
async fn wrong_arity_is_an_unknown_handler() {
    let rt = counter_runtime().await;
    let err = rt.invoke("counter", "a", "increment", vec![]).await.unwrap_err();
    assert_eq!(err, CallError::UnknownHandler("increment".into()));
}

#[tokio::test]
async fn unknown_entity_type_fails_activation() {
    let rt = counter_runtime().await;
    let err = rt.invoke("gauge", "a", "get", vec![]).await.unwrap_err();
    assert!(matches!(err, CallError::Activation(_)));
}

#[tokio::test]
async fn handler_fail_returns_cause_verbatim_and_keeps_state() {
    let mut catalog = Catalog::new();
    catalog
        .register(
            EntityDef::builder("vault")
                .field("balance", 100)
                .handler("withdraw", 1, |args, state| {
                    let amount = args.first().and_then(serde_json::Value::as_i64).unwrap_or(0);
                    let balance = state.integer("balance").unwrap_or(0);
                    if amount > balance {
                        return Return::fail(json!({"reason": "insufficient", "balance": balance}));
                    }
                    Return::reply_update(
                        balance - amount,
                        state.clone().with("balance", balance - amount),
                    )
                })
                .handler("balance", 0, |_, state| {
                    Return::reply(state.integer("balance").unwrap_or(0))
                })
                .build()
                .unwrap(),
        )
        .unwrap();
    let rt = RuntimeBuilder::new(catalog).db(memory_db().await).start().await.unwrap();

    let err = rt.invoke("vault", "v1", "withdraw", vec![json!(500)]).await.unwrap_err();
    assert_eq!(err, CallError::Handler(json!({"reason": "insufficient", "balance": 100})));

    let reply = rt.invoke("vault", "v1", "balance", vec![]).await.unwrap();
    assert_eq!(reply.value(), Some(&json!(100)));
}

#[tokio::test]
async fn noreply_handlers_acknowledge_without_result() {
    let mut catalog = Catalog::new();
    catalog
        .register(
            EntityDef::builder("log")
                .field("entries", 0)
                .handler("append", 0, |_, state| {
                    let n = state.integer("entries").unwrap_or(0) + 1;
                    Return::noreply(state.clone().with("entries", n))
                })
                .build()
                .unwrap(),
        )
        .unwrap();
    let rt = RuntimeBuilder::new(catalog).db(memory_db().await).start().await.unwrap();

    let reply = rt.invoke("log", "l1", "append", vec![]).await.unwrap();
    assert_eq!(reply, CallReply::NoReply);
}

#[tokio::test]
async fn handlers_for_one_entity_never_overlap() {
    let mut catalog = Catalog::new();
    let in_flight = Arc::new(AtomicUsize::new(0));
    let overlaps = Arc::new(AtomicUsize::new(0));
    let in_flight_h = in_flight.clone();
    let overlaps_h = overlaps.clone();
    catalog
        .register(
            EntityDef::builder("probe")
                .field("calls", 0)
                .handler("touch", 0, move |_, state| {
                    if in_flight_h.fetch_add(1, Ordering::SeqCst) != 0 {
                        overlaps_h.fetch_add(1, Ordering::SeqCst);
                    }
                    std::thread::sleep(Duration::from_millis(2));
                    in_flight_h.fetch_sub(1, Ordering::SeqCst);
                    let calls = state.integer("calls").unwrap_or(0) + 1;
                    Return::reply_update(calls, state.clone().with("calls", calls))
                })
                .build()
                .unwrap(),
        )
        .unwrap();
    let rt = RuntimeBuilder::new(catalog).db(memory_db().await).start().await.unwrap();

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let rt = rt.clone();
        tasks.push(tokio::spawn(async move {
            rt.invoke("probe", "p1", "touch", vec![]).await.unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    let reply = rt.invoke("probe", "p1", "touch", vec![]).await.unwrap();
    assert_eq!(reply.value(), Some(&json!(17)));
}

#[tokio::test]
async fn serialized_invocations_observe_arrival_order() {
    let rt = counter_runtime().await;
    for n in 1..=10 {
        let reply = rt.invoke("counter", "ordered", "increment", vec![json!(1)]).await.unwrap();
        assert_eq!(reply.value(), Some(&json!(n)));
    }
}

#[tokio::test]
async fn id_field_is_visible_to_handlers_but_not_persisted() {
    let mut catalog = Catalog::new();
    catalog
        .register(
            EntityDef::builder("badge")
                .field("label", "")
                .handler("whoami", 0, |_, state| {
                    Return::reply(state.text("id").unwrap_or_default())
                })
                .handler("label", 1, |args, state| {
                    let label = args.first().cloned().unwrap_or_default();
                    Return::noreply(state.clone().with("label", label))
                })
                .build()
                .unwrap(),
        )
        .unwrap();
    let db = memory_db().await;
    let rt = RuntimeBuilder::new(catalog).db(db.clone()).start().await.unwrap();

    let reply = rt.invoke("badge", "b-42", "whoami", vec![]).await.unwrap();
    assert_eq!(reply.value(), Some(&json!("b-42")));

    rt.invoke("badge", "b-42", "label", vec![json!("gold")]).await.unwrap();
    let store = SqlObjectStore::new(db, Arc::new(Telemetry::new()));
    let Loaded::Found(record) =
        store.load(&EntityKey::new("badge", "b-42"), None).await.unwrap()
    else {
        panic!("expected record");
    };
    assert!(!record.state.contains_key("id"));
    assert_eq!(record.state.get("label"), Some(&json!("gold")));
}

#[tokio::test]
async fn declaring_an_id_field_is_a_definition_error() {
    let err = EntityDef::builder("bad").field("id", 1).build().unwrap_err();
    assert_eq!(err, stead_core::DefError::ReservedField);
}
