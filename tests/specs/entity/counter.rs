//! Counter lifecycle: state survives a process restart.

use crate::prelude::*;

#[tokio::test]
async fn count_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stead.db");

    // First process: increment and shut down.
    {
        let rt = start_runtime(open_migrated(&path).await).await;
        let reply = rt.invoke("counter", "visits", "increment", vec![json!(5)]).await.unwrap();
        assert_eq!(reply_i64(&reply), 5);
        rt.shutdown().await;
    }

    // Second process over the same file: the state is still there.
    let rt = start_runtime(open_migrated(&path).await).await;
    let reply = rt.invoke("counter", "visits", "get", vec![]).await.unwrap();
    assert_eq!(reply_i64(&reply), 5);
}

#[tokio::test]
async fn increments_accumulate_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stead.db");

    for round in 1..=3 {
        let rt = start_runtime(open_migrated(&path).await).await;
        let reply = rt.invoke("counter", "visits", "increment", vec![json!(2)]).await.unwrap();
        assert_eq!(reply_i64(&reply), 2 * round);
        rt.shutdown().await;
    }
}

#[tokio::test]
async fn unknown_handler_reports_its_name() {
    let dir = tempfile::tempdir().unwrap();
    let rt = start_runtime(open_migrated(&dir.path().join("stead.db")).await).await;

    let err = rt.invoke("counter", "visits", "decrement", vec![json!(1)]).await.unwrap_err();
    assert_eq!(err, CallError::UnknownHandler("decrement".into()));
}
