// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use stead_core::EntityKey;

#[test]
fn join_and_leave_maintain_membership() {
    let cluster = Cluster::new();
    let a = cluster.join();
    let b = cluster.join();
    assert!(cluster.is_member(a));
    assert!(cluster.is_member(b));

    cluster.leave(a);
    assert!(!cluster.is_member(a));
    assert_eq!(cluster.members(), vec![b]);
}

#[tokio::test]
async fn down_event_carries_orphaned_names() {
    let cluster = Cluster::new();
    let node = cluster.join();
    let mut events = cluster.subscribe();

    assert!(matches!(cluster.claim_instance("entity:counter/a", node), NameClaim::Won));
    cluster.leave(node);

    loop {
        match events.recv().await.unwrap() {
            MembershipEvent::Down { node: lost, orphaned } => {
                assert_eq!(lost, node);
                assert_eq!(orphaned, vec!["entity:counter/a".to_string()]);
                break;
            }
            MembershipEvent::Up(_) => continue,
        }
    }
}

#[test]
fn second_claim_waits_on_the_first() {
    let cluster = Cluster::new();
    let a = cluster.join();
    let b = cluster.join();

    assert!(matches!(cluster.claim_instance("entity:counter/a", a), NameClaim::Won));
    assert!(matches!(cluster.claim_instance("entity:counter/a", b), NameClaim::Pending(_)));
}

#[test]
fn withdraw_reopens_the_name() {
    let cluster = Cluster::new();
    let a = cluster.join();
    let b = cluster.join();

    assert!(matches!(cluster.claim_instance("entity:counter/a", a), NameClaim::Won));
    cluster.withdraw("entity:counter/a", a);
    assert!(matches!(cluster.claim_instance("entity:counter/a", b), NameClaim::Won));
}

#[test]
fn marker_is_exclusive_while_holder_lives() {
    let cluster = Cluster::new();
    let a = cluster.join();
    let b = cluster.join();

    assert!(cluster.acquire_marker("singleton:poller", a).is_ok());
    assert_eq!(cluster.acquire_marker("singleton:poller", b), Err(a));
    assert_eq!(cluster.marker_holder("singleton:poller"), Some(a));

    // Re-acquiring one's own marker is fine.
    assert!(cluster.acquire_marker("singleton:poller", a).is_ok());
}

#[test]
fn marker_transfers_after_holder_leaves() {
    let cluster = Cluster::new();
    let a = cluster.join();
    let b = cluster.join();
    cluster.acquire_marker("singleton:poller", a).unwrap();

    cluster.leave(a);
    assert!(cluster.acquire_marker("singleton:poller", b).is_ok());
    assert_eq!(cluster.marker_holder("singleton:poller"), Some(b));
}

#[test]
fn marker_release_requires_the_holder() {
    let cluster = Cluster::new();
    let a = cluster.join();
    let b = cluster.join();
    cluster.acquire_marker("singleton:poller", a).unwrap();

    cluster.release_marker("singleton:poller", b);
    assert_eq!(cluster.marker_holder("singleton:poller"), Some(a));

    cluster.release_marker("singleton:poller", a);
    assert_eq!(cluster.marker_holder("singleton:poller"), None);
}

#[test]
fn instance_claims_cannot_take_marker_names() {
    let cluster = Cluster::new();
    let a = cluster.join();
    let b = cluster.join();
    cluster.acquire_marker("singleton:poller", a).unwrap();

    assert!(matches!(
        cluster.claim_instance("singleton:poller", b),
        NameClaim::MarkerHeld(holder) if holder == a
    ));
}

#[test]
fn names_owned_by_tracks_ownership() {
    let cluster = Cluster::new();
    let a = cluster.join();
    let b = cluster.join();
    let _ = cluster.claim_instance("entity:counter/a", a);
    let _ = cluster.claim_instance("entity:counter/b", b);
    let _ = cluster.acquire_marker("singleton:poller", a);

    let mut owned = cluster.names_owned_by(a);
    owned.sort();
    assert_eq!(owned, vec!["entity:counter/a".to_string(), "singleton:poller".to_string()]);
}

#[test]
fn entity_key_round_trips_through_directory_names() {
    let key = EntityKey::new("counter", "a/b");
    let name = crate::registry::entity_name(&key);
    assert_eq!(crate::registry::parse_entity_name(&name), Some(key));
}
