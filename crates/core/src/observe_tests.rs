// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use parking_lot::Mutex;

fn collect(telemetry: &Telemetry, prefix: &[&'static str]) -> Arc<Mutex<Vec<SpanEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    telemetry.attach(prefix, move |event| sink.lock().push(event.clone()));
    seen
}

async fn run_ok(telemetry: &Telemetry) -> Result<u32, std::convert::Infallible> {
    telemetry
        .observe(paths::STORE_SAVE, Metadata::entity("counter", "a"), 1_000, async { Ok(42) })
        .await
}

#[tokio::test]
async fn observe_emits_start_then_stop() {
    let telemetry = Telemetry::new();
    let seen = collect(&telemetry, paths::STORE_SAVE);

    let result = run_ok(&telemetry).await.unwrap();
    assert_eq!(result, 42);

    let events = seen.lock();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].phase, Phase::Start);
    assert_eq!(events[0].measurements.system_time_ms, Some(1_000));
    assert_eq!(events[1].phase, Phase::Stop);
    assert!(events[1].measurements.duration.is_some());
}

#[tokio::test]
async fn observe_emits_exception_with_cause() {
    let telemetry = Telemetry::new();
    let seen = collect(&telemetry, paths::STORE_LOAD);

    let result: Result<(), String> = telemetry
        .observe(paths::STORE_LOAD, Metadata::entity("counter", "a"), 2_000, async {
            Err("disk full".to_string())
        })
        .await;
    assert!(result.is_err());

    let events = seen.lock();
    assert_eq!(events[1].phase, Phase::Exception);
    assert_eq!(events[1].measurements.cause.as_deref(), Some("disk full"));
}

#[tokio::test]
async fn prefix_filters_events() {
    let telemetry = Telemetry::new();
    let store_events = collect(&telemetry, &["runtime", "store"]);
    let fire_events = collect(&telemetry, paths::INSTANCE_FIRE);

    run_ok(&telemetry).await.unwrap();

    assert_eq!(store_events.lock().len(), 2);
    assert!(fire_events.lock().is_empty());
}

#[tokio::test]
async fn empty_prefix_matches_everything() {
    let telemetry = Telemetry::new();
    let seen = collect(&telemetry, &[]);
    run_ok(&telemetry).await.unwrap();
    assert_eq!(seen.lock().len(), 2);
}

#[tokio::test]
async fn detach_stops_delivery() {
    let telemetry = Telemetry::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let id = telemetry.attach(&[], move |event| sink.lock().push(event.clone()));

    telemetry.detach(id);
    run_ok(&telemetry).await.unwrap();
    assert!(seen.lock().is_empty());
}
