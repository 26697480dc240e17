// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use std::time::Duration;

use stead_core::test_support::test_catalog;
use stead_store::test_support::memory_db;

fn fast_options() -> RuntimeOptions {
    RuntimeOptions::new()
        .polling_interval(Duration::from_millis(20))
        .claim_ttl(Duration::from_millis(500))
}

async fn two_nodes() -> (Node, Node, Cluster) {
    let cluster = Cluster::new();
    let db = memory_db().await;
    let a = NodeBuilder::new(test_catalog())
        .topology(Topology::distributed(cluster.clone()))
        .db(db.clone())
        .options(fast_options())
        .start()
        .await
        .unwrap();
    let b = NodeBuilder::new(test_catalog())
        .topology(Topology::distributed(cluster.clone()))
        .db(db)
        .options(fast_options())
        .start()
        .await
        .unwrap();
    // Let the spawned guard and migrator tasks take their first pass.
    tokio::time::sleep(Duration::from_millis(30)).await;
    (a, b, cluster)
}

#[tokio::test]
async fn local_topology_behaves_like_a_plain_runtime() {
    let node = NodeBuilder::new(test_catalog()).db(memory_db().await).start().await.unwrap();

    let reply = node.runtime().invoke("counter", "c1", "increment", vec![json!(2)]).await.unwrap();
    assert_eq!(reply.value(), Some(&json!(2)));
    assert!(node.node_id().is_none());
    node.shutdown().await;
}

#[tokio::test]
async fn placements_are_visible_from_every_node() {
    let (a, b, _cluster) = two_nodes().await;

    a.runtime().invoke("counter", "c1", "increment", vec![json!(5)]).await.unwrap();

    // The same incarnation serves both nodes.
    let from_a = a.runtime().locate("counter", "c1").unwrap();
    let from_b = b.runtime().locate("counter", "c1").unwrap();
    assert_eq!(from_a.epoch(), from_b.epoch());

    let reply = b.runtime().invoke("counter", "c1", "get", vec![]).await.unwrap();
    assert_eq!(reply.value(), Some(&json!(5)));

    a.shutdown().await;
    b.shutdown().await;
}

#[tokio::test]
async fn exactly_one_poller_runs_across_the_cluster() {
    let (a, b, _cluster) = two_nodes().await;

    let running =
        [a.runtime().poller_running(), b.runtime().poller_running()].iter().filter(|r| **r).count();
    assert_eq!(running, 1);

    a.shutdown().await;
    b.shutdown().await;
}

#[tokio::test]
async fn node_loss_migrates_state_to_a_survivor() {
    let (a, b, _cluster) = two_nodes().await;

    a.runtime().invoke("counter", "c1", "increment", vec![json!(5)]).await.unwrap();
    a.crash();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let reply = b.runtime().invoke("counter", "c1", "get", vec![]).await.unwrap();
    assert_eq!(reply.value(), Some(&json!(5)));
    b.shutdown().await;
}

#[tokio::test]
async fn poller_fails_over_after_holder_loss() {
    let (a, b, _cluster) = two_nodes().await;

    let (holder, survivor) =
        if a.runtime().poller_running() { (a, b) } else { (b, a) };
    holder.crash();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(survivor.runtime().poller_running());
    survivor.shutdown().await;
}

#[tokio::test]
async fn graceful_shutdown_hands_the_poller_over() {
    let (a, b, _cluster) = two_nodes().await;

    let (holder, survivor) =
        if a.runtime().poller_running() { (a, b) } else { (b, a) };
    holder.shutdown().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(survivor.runtime().poller_running());
    survivor.shutdown().await;
}

#[tokio::test]
async fn recurring_alarms_keep_firing_after_failover() {
    let (a, b, _cluster) = two_nodes().await;
    a.runtime().schedule("ticker", "t1", "tick", Duration::ZERO).await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    a.crash();
    // Long enough for a claim stranded by the crash to pass its TTL.
    tokio::time::sleep(Duration::from_millis(800)).await;

    let reply = b.runtime().invoke("ticker", "t1", "get", vec![]).await.unwrap();
    let ticks = reply.value().and_then(serde_json::Value::as_i64).unwrap();
    assert!(ticks >= 4, "ticker kept running after failover (saw {ticks})");
    b.shutdown().await;
}
