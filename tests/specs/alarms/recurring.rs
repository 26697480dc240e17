//! A recurring alarm: the handler reschedules its own name each firing.

use crate::prelude::*;

#[tokio::test]
async fn ticker_accumulates_while_keeping_one_row() {
    let dir = tempfile::tempdir().unwrap();
    let rt = start_runtime(open_migrated(&dir.path().join("stead.db")).await).await;

    rt.schedule("ticker", "t1", "tick", Duration::ZERO).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    let reply = rt.invoke("ticker", "t1", "get", vec![]).await.unwrap();
    assert!(reply_i64(&reply) >= 4, "expected at least 4 ticks, saw {}", reply_i64(&reply));

    let alarms = rt.list_alarms("ticker", "t1").await.unwrap();
    assert_eq!(alarms.len(), 1, "rescheduling keeps exactly one row");
    assert_eq!(alarms[0].name.as_str(), "tick");
}

#[tokio::test]
async fn scheduling_twice_keeps_the_later_time() {
    let dir = tempfile::tempdir().unwrap();
    let rt = start_runtime(open_migrated(&dir.path().join("stead.db")).await).await;

    rt.schedule("ticker", "t2", "tick", Duration::from_secs(60)).await.unwrap();
    rt.schedule("ticker", "t2", "tick", Duration::from_secs(120)).await.unwrap();

    let alarms = rt.list_alarms("ticker", "t2").await.unwrap();
    assert_eq!(alarms.len(), 1);

    let delay = alarms[0].scheduled_at - chrono::Utc::now();
    assert!(delay > chrono::Duration::seconds(90), "second schedule wins: {delay}");
}
