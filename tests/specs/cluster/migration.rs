//! Distributed migration: node loss moves entities to survivors.

use crate::prelude::*;
use serial_test::serial;

use stead_cluster::{Cluster, NodeBuilder, Topology};

async fn node(cluster: &Cluster, db: Db) -> stead_cluster::Node {
    NodeBuilder::new(test_catalog())
        .topology(Topology::distributed(cluster.clone()))
        .db(db)
        .options(fast_options())
        .start()
        .await
        .expect("node starts")
}

#[tokio::test]
#[serial]
async fn surviving_node_serves_the_last_persisted_state() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_migrated(&dir.path().join("stead.db")).await;
    let cluster = Cluster::new();

    let a = node(&cluster, db.clone()).await;
    let b = node(&cluster, db).await;

    let reply = a.runtime().invoke("counter", "c1", "increment", vec![json!(5)]).await.unwrap();
    assert_eq!(reply_i64(&reply), 5);

    a.crash();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let reply = b.runtime().invoke("counter", "c1", "get", vec![]).await.unwrap();
    assert_eq!(reply_i64(&reply), 5);
    b.shutdown().await;
}

#[tokio::test]
#[serial]
async fn both_nodes_address_the_same_instance() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_migrated(&dir.path().join("stead.db")).await;
    let cluster = Cluster::new();

    let a = node(&cluster, db.clone()).await;
    let b = node(&cluster, db).await;

    a.runtime().invoke("counter", "c1", "increment", vec![json!(1)]).await.unwrap();
    b.runtime().invoke("counter", "c1", "increment", vec![json!(1)]).await.unwrap();

    let reply = a.runtime().invoke("counter", "c1", "get", vec![]).await.unwrap();
    assert_eq!(reply_i64(&reply), 2);

    a.shutdown().await;
    b.shutdown().await;
}
