// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use stead_scheduler::test_support::InMemoryJobSystem;
use stead_scheduler::{JobVerdict, JobWorker};
use stead_core::SchedulerKind;

async fn ticks(rt: &Runtime) -> i64 {
    let reply = rt.invoke("ticker", "t1", "get", vec![]).await.unwrap();
    reply.value().and_then(serde_json::Value::as_i64).unwrap()
}

#[tokio::test]
async fn recurring_alarm_fires_and_keeps_one_row() {
    init_tracing();
    let rt = counter_runtime().await;
    rt.schedule("ticker", "t1", "tick", Duration::ZERO).await.unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(ticks(&rt).await >= 4, "expected several firings");
    // Rescheduling the same name keeps exactly one row.
    assert_eq!(rt.list_alarms("ticker", "t1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn cancel_all_stops_the_recurrence() {
    let rt = counter_runtime().await;
    rt.schedule("ticker", "t1", "tick", Duration::ZERO).await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    // Quiesce delivery so no firing can reschedule mid-cancel.
    rt.stop_poller().await;
    rt.cancel_all_alarms("ticker", "t1").await.unwrap();
    assert!(rt.list_alarms("ticker", "t1").await.unwrap().is_empty());

    let seen = ticks(&rt).await;
    rt.spawn_poller().unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(ticks(&rt).await, seen);
    assert!(rt.list_alarms("ticker", "t1").await.unwrap().is_empty());
}

#[tokio::test]
async fn alarm_without_handler_retires_quietly() {
    let rt = counter_runtime().await;
    rt.invoke("counter", "c1", "increment", vec![json!(2)]).await.unwrap();
    rt.schedule("counter", "c1", "poke", Duration::ZERO).await.unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;

    // Retired despite no on_alarm, state untouched.
    assert!(rt.list_alarms("counter", "c1").await.unwrap().is_empty());
    let reply = rt.invoke("counter", "c1", "get", vec![]).await.unwrap();
    assert_eq!(reply.value(), Some(&json!(2)));
}

#[tokio::test]
async fn handler_alarm_directive_schedules_after_commit() {
    let mut catalog = Catalog::new();
    catalog
        .register(
            EntityDef::builder("kettle")
                .field("on", false)
                .handler("boil", 0, |_, state| {
                    Return::reply_update(true, state.clone().with("on", true))
                        .with_alarm("whistle", Duration::from_secs(60))
                })
                .build()
                .unwrap(),
        )
        .unwrap();
    let rt = RuntimeBuilder::new(catalog).db(memory_db().await).start().await.unwrap();

    rt.invoke("kettle", "k1", "boil", vec![]).await.unwrap();
    let alarms = rt.list_alarms("kettle", "k1").await.unwrap();
    assert_eq!(alarms.len(), 1);
    assert_eq!(alarms[0].name.as_str(), "whistle");
}

#[tokio::test]
async fn failed_save_drops_the_alarm_directive() {
    let mut catalog = Catalog::new();
    catalog
        .register(
            EntityDef::builder("kettle")
                .field("on", false)
                .handler("boil", 0, |_, state| {
                    Return::reply_update(true, state.clone().with("on", true))
                        .with_alarm("whistle", Duration::from_secs(60))
                })
                .build()
                .unwrap(),
        )
        .unwrap();
    let db = memory_db().await;
    let telemetry = Arc::new(Telemetry::new());
    let flaky =
        Arc::new(FlakyStore::new(Arc::new(SqlObjectStore::new(db.clone(), telemetry.clone()))));
    let rt = RuntimeBuilder::new(catalog)
        .db(db)
        .store(flaky.clone())
        .telemetry(telemetry)
        .start()
        .await
        .unwrap();

    rt.ensure_activated("kettle", "k1").await.unwrap();
    flaky.fail_next_save();
    rt.invoke("kettle", "k1", "boil", vec![]).await.unwrap_err();

    assert!(rt.list_alarms("kettle", "k1").await.unwrap().is_empty());
}

#[tokio::test]
async fn after_load_alarm_directive_is_committed() {
    let mut catalog = Catalog::new();
    catalog
        .register(
            EntityDef::builder("lease")
                .field("renewals", 0)
                .handler("get", 0, |_, state| {
                    Return::reply(state.integer("renewals").unwrap_or(0))
                })
                .after_load(|state| {
                    stead_core::AfterLoad::state(state).with_alarm("renew", Duration::from_secs(30))
                })
                .build()
                .unwrap(),
        )
        .unwrap();
    let rt = RuntimeBuilder::new(catalog).db(memory_db().await).start().await.unwrap();

    rt.ensure_activated("lease", "l1").await.unwrap();
    let alarms = rt.list_alarms("lease", "l1").await.unwrap();
    assert_eq!(alarms.len(), 1);
    assert_eq!(alarms[0].name.as_str(), "renew");
}

#[tokio::test]
async fn external_job_backend_round_trips_through_the_worker() {
    let system = Arc::new(InMemoryJobSystem::new());
    let rt = RuntimeBuilder::new(test_catalog())
        .options(RuntimeOptions::new().scheduler(SchedulerKind::ExternalJob))
        .db(memory_db().await)
        .job_system(system.clone())
        .start()
        .await
        .unwrap();

    rt.schedule("ticker", "t1", "tick", Duration::ZERO).await.unwrap();
    let due = system.take_due(chrono::Utc::now());
    assert_eq!(due.len(), 1);

    let worker = JobWorker::new(rt.alarm_router());
    assert_eq!(worker.process(&due[0]).await, JobVerdict::Done);
    assert_eq!(ticks(&rt).await, 1);

    // The handler's reschedule went back through the job system.
    assert_eq!(rt.list_alarms("ticker", "t1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn external_job_backend_requires_a_job_system() {
    let err = RuntimeBuilder::new(test_catalog())
        .options(RuntimeOptions::new().scheduler(SchedulerKind::ExternalJob))
        .db(memory_db().await)
        .start()
        .await
        .unwrap_err();
    assert!(matches!(err, StartError::MissingJobSystem));
}
