// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The cluster-wide directory: atomic name registration plus membership.
//!
//! Names fall in two spaces: instance registrations (carrying a live
//! handle once placement completes) and markers (bare ownership, used for
//! cluster singletons). Registration is atomic under one lock, which is
//! what serializes placement races across nodes. Node loss drops every
//! name the node owned and broadcasts the orphaned set so survivors can
//! migrate placements.

use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot};
use uuid::Uuid;

use stead_runtime::InstanceHandle;

/// Identity of one node in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(Uuid);

impl NodeId {
    fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = self.0.simple().to_string();
        f.write_str(&text[..8])
    }
}

/// Membership change, broadcast to every subscriber on the cluster.
#[derive(Debug, Clone)]
pub enum MembershipEvent {
    Up(NodeId),
    /// A node left; `orphaned` lists the directory names it owned.
    Down { node: NodeId, orphaned: Vec<String> },
}

enum SlotState {
    /// Placement in flight; waiters receive the handle once published.
    Pending { waiters: Vec<oneshot::Sender<InstanceHandle>> },
    Live(InstanceHandle),
    /// Bare ownership marker (cluster singletons).
    Marker,
}

struct Slot {
    node: NodeId,
    state: SlotState,
}

/// Outcome of an instance-name claim.
pub enum NameClaim {
    /// The caller owns placement for this name.
    Won,
    /// Placement is in flight on some node; await the published handle.
    Pending(oneshot::Receiver<InstanceHandle>),
    /// Already placed; adopt the handle.
    Live(InstanceHandle),
    /// The name is held as a marker and cannot carry an instance.
    MarkerHeld(NodeId),
}

struct Inner {
    slots: Mutex<HashMap<String, Slot>>,
    members: Mutex<HashSet<NodeId>>,
    events: broadcast::Sender<MembershipEvent>,
}

/// Shared handle to one cluster's directory.
#[derive(Clone)]
pub struct Cluster {
    inner: Arc<Inner>,
}

impl Default for Cluster {
    fn default() -> Self {
        Self::new()
    }
}

impl Cluster {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                slots: Mutex::new(HashMap::new()),
                members: Mutex::new(HashSet::new()),
                events,
            }),
        }
    }

    /// Add a node to the cluster.
    pub fn join(&self) -> NodeId {
        let node = NodeId::fresh();
        self.inner.members.lock().insert(node);
        let _ = self.inner.events.send(MembershipEvent::Up(node));
        tracing::debug!(%node, "node joined");
        node
    }

    /// Remove a node, dropping every name it owned. Survivors receive the
    /// orphaned names and race to re-place them.
    pub fn leave(&self, node: NodeId) {
        self.inner.members.lock().remove(&node);
        let orphaned: Vec<String> = {
            let mut slots = self.inner.slots.lock();
            let names: Vec<String> =
                slots.iter().filter(|(_, s)| s.node == node).map(|(n, _)| n.clone()).collect();
            for name in &names {
                slots.remove(name);
            }
            names
        };
        tracing::debug!(%node, orphans = orphaned.len(), "node left");
        let _ = self.inner.events.send(MembershipEvent::Down { node, orphaned });
    }

    pub fn is_member(&self, node: NodeId) -> bool {
        self.inner.members.lock().contains(&node)
    }

    pub fn members(&self) -> Vec<NodeId> {
        self.inner.members.lock().iter().copied().collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MembershipEvent> {
        self.inner.events.subscribe()
    }

    /// Atomically claim an instance name for placement by `node`.
    pub fn claim_instance(&self, name: &str, node: NodeId) -> NameClaim {
        let mut slots = self.inner.slots.lock();
        match slots.entry(name.to_string()) {
            Entry::Vacant(entry) => {
                entry.insert(Slot { node, state: SlotState::Pending { waiters: Vec::new() } });
                NameClaim::Won
            }
            Entry::Occupied(mut entry) => {
                let owner = entry.get().node;
                match &mut entry.get_mut().state {
                    SlotState::Live(handle) if handle.is_alive() => {
                        NameClaim::Live(handle.clone())
                    }
                    // A finished instance whose exit has not pruned the
                    // slot yet: placement is open again.
                    SlotState::Live(_) => {
                        entry.insert(Slot {
                            node,
                            state: SlotState::Pending { waiters: Vec::new() },
                        });
                        NameClaim::Won
                    }
                    SlotState::Pending { waiters } => {
                        let (tx, rx) = oneshot::channel();
                        waiters.push(tx);
                        NameClaim::Pending(rx)
                    }
                    SlotState::Marker => NameClaim::MarkerHeld(owner),
                }
            }
        }
    }

    /// Publish the placed instance and release waiters.
    pub fn publish_instance(&self, name: &str, node: NodeId, handle: InstanceHandle) {
        let mut slots = self.inner.slots.lock();
        match slots.get_mut(name) {
            Some(slot) if slot.node == node => {
                if let SlotState::Pending { waiters } = &mut slot.state {
                    for waiter in waiters.drain(..) {
                        let _ = waiter.send(handle.clone());
                    }
                }
                slot.state = SlotState::Live(handle);
            }
            _ => tracing::debug!(name, %node, "publish for a superseded placement"),
        }
    }

    /// Abandon an in-flight placement. Waiters observe the closed channel.
    pub fn withdraw(&self, name: &str, node: NodeId) {
        let mut slots = self.inner.slots.lock();
        if let Some(slot) = slots.get(name) {
            if slot.node == node && matches!(slot.state, SlotState::Pending { .. }) {
                slots.remove(name);
            }
        }
    }

    /// Drop a live registration, but only for the incarnation that owns it.
    pub fn release_instance(&self, name: &str, node: NodeId, epoch: Uuid) -> bool {
        let mut slots = self.inner.slots.lock();
        if let Some(slot) = slots.get(name) {
            if slot.node == node {
                if let SlotState::Live(handle) = &slot.state {
                    if handle.epoch() == epoch {
                        slots.remove(name);
                        return true;
                    }
                }
            }
        }
        false
    }

    pub fn lookup_instance(&self, name: &str) -> Option<InstanceHandle> {
        match self.inner.slots.lock().get(name) {
            Some(Slot { state: SlotState::Live(handle), .. }) if handle.is_alive() => {
                Some(handle.clone())
            }
            _ => None,
        }
    }

    /// Take (or keep) a marker name. Fails with the current holder while
    /// that holder is still a member.
    pub fn acquire_marker(&self, name: &str, node: NodeId) -> Result<(), NodeId> {
        let mut slots = self.inner.slots.lock();
        match slots.get(name) {
            Some(slot) if slot.node != node && self.is_member(slot.node) => Err(slot.node),
            _ => {
                slots.insert(name.to_string(), Slot { node, state: SlotState::Marker });
                Ok(())
            }
        }
    }

    pub fn marker_holder(&self, name: &str) -> Option<NodeId> {
        match self.inner.slots.lock().get(name) {
            Some(slot) if matches!(slot.state, SlotState::Marker) => Some(slot.node),
            _ => None,
        }
    }

    /// Release a marker held by `node`.
    pub fn release_marker(&self, name: &str, node: NodeId) {
        let mut slots = self.inner.slots.lock();
        if let Some(slot) = slots.get(name) {
            if slot.node == node && matches!(slot.state, SlotState::Marker) {
                slots.remove(name);
            }
        }
    }

    pub fn names_owned_by(&self, node: NodeId) -> Vec<String> {
        self.inner
            .slots
            .lock()
            .iter()
            .filter(|(_, slot)| slot.node == node)
            .map(|(name, _)| name.clone())
            .collect()
    }
}

impl std::fmt::Debug for Cluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cluster")
            .field("members", &self.inner.members.lock().len())
            .field("names", &self.inner.slots.lock().len())
            .finish()
    }
}

#[cfg(test)]
#[path = "directory_tests.rs"]
mod tests;
