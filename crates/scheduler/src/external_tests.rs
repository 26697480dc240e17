// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{InMemoryJobSystem, ScriptedRouter};
use chrono::Utc;

fn key() -> EntityKey {
    EntityKey::new("ticker", "t1")
}

fn scheduler(system: Arc<InMemoryJobSystem>) -> ExternalJobScheduler {
    ExternalJobScheduler::new(system, "entity_alarms")
}

#[tokio::test]
async fn schedule_replaces_pending_job_for_same_name() {
    let system = Arc::new(InMemoryJobSystem::new());
    let scheduler = scheduler(system.clone());
    let name = AlarmName::new("tick");

    scheduler.schedule(&key(), &name, Duration::from_secs(10)).await.unwrap();
    scheduler.schedule(&key(), &name, Duration::from_secs(20)).await.unwrap();

    assert_eq!(system.len(), 1);
    assert_eq!(scheduler.list(&key()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn subsecond_delay_floors_to_immediate() {
    let system = Arc::new(InMemoryJobSystem::new());
    let scheduler = scheduler(system.clone());

    scheduler.schedule(&key(), &AlarmName::new("tick"), Duration::from_millis(999)).await.unwrap();

    let due = system.take_due(Utc::now());
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].name.as_str(), "tick");
}

#[tokio::test]
async fn cancel_all_clears_only_this_entity() {
    let system = Arc::new(InMemoryJobSystem::new());
    let scheduler = scheduler(system.clone());
    scheduler.schedule(&key(), &AlarmName::new("a"), Duration::from_secs(5)).await.unwrap();
    scheduler.schedule(&key(), &AlarmName::new("b"), Duration::from_secs(5)).await.unwrap();
    let other = EntityKey::new("ticker", "other");
    scheduler.schedule(&other, &AlarmName::new("c"), Duration::from_secs(5)).await.unwrap();

    scheduler.cancel_all(&key()).await.unwrap();
    assert!(scheduler.list(&key()).await.unwrap().is_empty());
    assert_eq!(scheduler.list(&other).await.unwrap().len(), 1);
}

#[tokio::test]
async fn list_orders_by_scheduled_time() {
    let system = Arc::new(InMemoryJobSystem::new());
    let scheduler = scheduler(system);
    scheduler.schedule(&key(), &AlarmName::new("later"), Duration::from_secs(60)).await.unwrap();
    scheduler.schedule(&key(), &AlarmName::new("sooner"), Duration::from_secs(5)).await.unwrap();

    let names: Vec<_> = scheduler
        .list(&key())
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.name.as_str().to_string())
        .collect();
    assert_eq!(names, vec!["sooner", "later"]);
}

#[tokio::test]
async fn worker_maps_outcomes_to_verdicts() {
    let job = AlarmJob { key: key(), name: AlarmName::new("tick") };

    let router = Arc::new(ScriptedRouter::scripted([
        FireOutcome::Completed,
        FireOutcome::PersistenceFailed("disk full".into()),
        FireOutcome::Failed("boom".into()),
        FireOutcome::UnknownTarget,
    ]));
    let worker = JobWorker::new(router);

    assert_eq!(worker.process(&job).await, JobVerdict::Done);
    assert_eq!(worker.process(&job).await, JobVerdict::Retry("disk full".into()));
    assert_eq!(worker.process(&job).await, JobVerdict::Retry("boom".into()));
    assert_eq!(worker.process(&job).await, JobVerdict::Discard);
}

#[tokio::test]
async fn retryable_jobs_stay_pending_for_cancellation() {
    let system = Arc::new(InMemoryJobSystem::new());
    let scheduler = scheduler(system.clone());
    let name = AlarmName::new("tick");
    scheduler.schedule(&key(), &name, Duration::ZERO).await.unwrap();

    let taken = system.take_due(Utc::now());
    assert_eq!(taken.len(), 1);
    system.requeue("entity_alarms", taken[0].clone(), Utc::now());

    assert_eq!(scheduler.list(&key()).await.unwrap().len(), 1);
    scheduler.cancel(&key(), &name).await.unwrap();
    assert!(system.is_empty());
}
