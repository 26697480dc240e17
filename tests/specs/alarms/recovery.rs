//! Crash recovery: a stranded claim is retried after its TTL.

use crate::prelude::*;
use chrono::{Duration as ChronoDuration, Utc};
use serial_test::serial;

use stead_core::{AlarmName, EntityKey};
use stead_store::AlarmStore;

#[tokio::test]
#[serial]
async fn stranded_claim_is_reclaimed_and_fired() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_migrated(&dir.path().join("stead.db")).await;
    let alarms = AlarmStore::new(db.clone(), None);
    let key = EntityKey::new("ticker", "t1");
    let name = AlarmName::new("tick");

    // A due alarm claimed by a worker that died long ago (two TTLs back).
    let now = Utc::now();
    alarms.upsert(&key, &name, now, now).await.unwrap();
    let dead_claim = now - ChronoDuration::milliseconds(1_000);
    assert!(alarms.claim(&key, &name, dead_claim, now).await.unwrap());

    // The poller re-claims and fires it.
    let rt = start_runtime(db).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let reply = rt.invoke("ticker", "t1", "get", vec![]).await.unwrap();
    assert!(reply_i64(&reply) >= 1, "stranded alarm was re-fired");

    // The handler rescheduled under the same name: one unclaimed row.
    let rows = alarms.list(&key).await.unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
#[serial]
async fn fresh_claims_are_not_stolen() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_migrated(&dir.path().join("stead.db")).await;
    let alarms = AlarmStore::new(db.clone(), None);
    let key = EntityKey::new("ticker", "t2");
    let name = AlarmName::new("tick");

    let now = Utc::now();
    alarms.upsert(&key, &name, now, now).await.unwrap();
    // Freshly claimed, as if another worker is mid-fire.
    assert!(alarms.claim(&key, &name, now, now).await.unwrap());

    let rt = start_runtime(db).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let reply = rt.invoke("ticker", "t2", "get", vec![]).await.unwrap();
    assert_eq!(reply_i64(&reply), 0, "fresh claim must not be re-fired before its TTL");
}
