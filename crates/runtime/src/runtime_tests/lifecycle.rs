// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn deactivate_then_reinvoke_reloads_persisted_state() {
    let rt = counter_runtime().await;
    rt.invoke("counter", "c1", "increment", vec![json!(7)]).await.unwrap();

    rt.deactivate("counter", "c1", "maintenance").await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(rt.locate("counter", "c1").is_none());

    let reply = rt.invoke("counter", "c1", "get", vec![]).await.unwrap();
    assert_eq!(reply.value(), Some(&json!(7)));
}

#[tokio::test]
async fn deactivating_an_inactive_entity_is_a_no_op() {
    let rt = counter_runtime().await;
    rt.deactivate("counter", "ghost", "cleanup").await;
    assert!(rt.locate("counter", "ghost").is_none());
}

#[tokio::test]
async fn inactivity_shutdown_stops_and_next_call_reactivates() {
    let db = memory_db().await;
    let rt = RuntimeBuilder::new(test_catalog())
        .db(db)
        .options(fast_options().shutdown_after(Duration::from_millis(80)))
        .start()
        .await
        .unwrap();

    rt.invoke("counter", "c1", "increment", vec![json!(4)]).await.unwrap();
    assert!(rt.locate("counter", "c1").is_some());

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(rt.locate("counter", "c1").is_none());

    let reply = rt.invoke("counter", "c1", "get", vec![]).await.unwrap();
    assert_eq!(reply.value(), Some(&json!(4)));
}

#[tokio::test]
async fn activity_resets_the_inactivity_timer() {
    let db = memory_db().await;
    let rt = RuntimeBuilder::new(test_catalog())
        .db(db)
        .options(fast_options().shutdown_after(Duration::from_millis(500)))
        .start()
        .await
        .unwrap();

    rt.invoke("counter", "c1", "increment", vec![json!(1)]).await.unwrap();
    for _ in 0..3 {
        tokio::time::sleep(Duration::from_millis(200)).await;
        rt.invoke("counter", "c1", "get", vec![]).await.unwrap();
    }
    // 600ms of wall time, but never 500ms idle.
    assert!(rt.locate("counter", "c1").is_some());
}

#[tokio::test]
async fn hibernated_instance_wakes_with_its_state() {
    let db = memory_db().await;
    let rt = RuntimeBuilder::new(test_catalog())
        .db(db)
        .options(fast_options().hibernate_after(Duration::from_millis(40)))
        .start()
        .await
        .unwrap();

    rt.invoke("counter", "c1", "increment", vec![json!(9)]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    // Still registered while hibernated.
    assert!(rt.locate("counter", "c1").is_some());
    let reply = rt.invoke("counter", "c1", "get", vec![]).await.unwrap();
    assert_eq!(reply.value(), Some(&json!(9)));
}

#[tokio::test]
async fn shutdown_deactivates_everything() {
    let rt = counter_runtime().await;
    rt.invoke("counter", "a", "increment", vec![json!(1)]).await.unwrap();
    rt.invoke("counter", "b", "increment", vec![json!(1)]).await.unwrap();

    rt.shutdown().await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(rt.locate("counter", "a").is_none());
    assert!(rt.locate("counter", "b").is_none());
    assert!(!rt.poller_running());
}

#[tokio::test]
async fn in_memory_runtime_works_without_a_store() {
    let rt = RuntimeBuilder::new(test_catalog()).start().await.unwrap();

    let reply = rt.invoke("counter", "c1", "increment", vec![json!(3)]).await.unwrap();
    assert_eq!(reply.value(), Some(&json!(3)));

    // No durable home for alarms without a store.
    let err = rt.schedule("counter", "c1", "poke", Duration::ZERO).await.unwrap_err();
    assert!(matches!(err, stead_scheduler::ScheduleError::NotConfigured));
}
