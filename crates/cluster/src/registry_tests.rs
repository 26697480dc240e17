// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::directory::Cluster;

fn key() -> EntityKey {
    EntityKey::new("counter", "a")
}

fn two_nodes() -> (DistributedRegistry, DistributedRegistry, Cluster) {
    let cluster = Cluster::new();
    let a = DistributedRegistry::new(cluster.clone(), cluster.join());
    let b = DistributedRegistry::new(cluster.clone(), cluster.join());
    (a, b, cluster)
}

#[test]
fn placement_race_has_one_winner_across_nodes() {
    let (a, b, _cluster) = two_nodes();

    assert!(matches!(a.begin(&key()), Begin::Claimed(_)));
    assert!(matches!(b.begin(&key()), Begin::Pending(_)));
}

#[tokio::test]
async fn abort_reopens_the_race_for_the_other_node() {
    let (a, b, _cluster) = two_nodes();

    let Begin::Claimed(claim) = a.begin(&key()) else {
        panic!("expected claim");
    };
    let Begin::Pending(waiter) = b.begin(&key()) else {
        panic!("expected pending");
    };

    a.abort(claim);
    assert!(waiter.await.is_err());
    assert!(matches!(b.begin(&key()), Begin::Claimed(_)));
}

#[test]
fn locate_is_empty_before_any_placement() {
    let (a, _b, _cluster) = two_nodes();
    assert!(a.locate(&key()).is_none());
    assert!(a.live_keys().is_empty());
}

#[tokio::test]
async fn marker_collision_fails_the_waiter() {
    let cluster = Cluster::new();
    let node = cluster.join();
    let registry = DistributedRegistry::new(cluster.clone(), node);
    cluster.acquire_marker(&entity_name(&key()), node).unwrap();

    let Begin::Pending(waiter) = registry.begin(&key()) else {
        panic!("expected pending");
    };
    assert!(waiter.await.is_err());
}
