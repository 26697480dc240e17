// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cluster-wide registry: placements visible from every node.

use tokio::sync::oneshot;
use uuid::Uuid;

use stead_core::EntityKey;
use stead_runtime::{ActivationClaim, Begin, InstanceHandle, Registry};

use crate::directory::{Cluster, NameClaim, NodeId};

pub(crate) const ENTITY_PREFIX: &str = "entity:";

pub(crate) fn entity_name(key: &EntityKey) -> String {
    format!("{ENTITY_PREFIX}{key}")
}

pub(crate) fn parse_entity_name(name: &str) -> Option<EntityKey> {
    EntityKey::parse(name.strip_prefix(ENTITY_PREFIX)?)
}

/// [`Registry`] over the cluster directory. Placement atomicity comes from
/// the directory's name registration; instances placed on any node are
/// locatable from every node.
pub struct DistributedRegistry {
    cluster: Cluster,
    node: NodeId,
}

impl DistributedRegistry {
    pub fn new(cluster: Cluster, node: NodeId) -> Self {
        Self { cluster, node }
    }
}

impl Registry for DistributedRegistry {
    fn locate(&self, key: &EntityKey) -> Option<InstanceHandle> {
        self.cluster.lookup_instance(&entity_name(key))
    }

    fn begin(&self, key: &EntityKey) -> Begin {
        match self.cluster.claim_instance(&entity_name(key), self.node) {
            NameClaim::Won => Begin::Claimed(ActivationClaim::new(key.clone(), Uuid::new_v4())),
            NameClaim::Live(handle) => Begin::Live(handle),
            NameClaim::Pending(waiter) => Begin::Pending(waiter),
            NameClaim::MarkerHeld(holder) => {
                // Entity names and marker names use disjoint prefixes, so
                // this indicates directory misuse. Fail the activation.
                tracing::error!(entity = %key, %holder, "entity name held as a marker");
                let (_, closed) = oneshot::channel();
                Begin::Pending(closed)
            }
        }
    }

    fn complete(&self, claim: ActivationClaim, handle: InstanceHandle) {
        self.cluster.publish_instance(&entity_name(claim.key()), self.node, handle);
    }

    fn abort(&self, claim: ActivationClaim) {
        self.cluster.withdraw(&entity_name(claim.key()), self.node);
    }

    fn remove(&self, key: &EntityKey, epoch: Uuid) -> bool {
        self.cluster.release_instance(&entity_name(key), self.node, epoch)
    }

    fn live_keys(&self) -> Vec<EntityKey> {
        self.cluster
            .names_owned_by(self.node)
            .iter()
            .filter_map(|name| parse_entity_name(name))
            .collect()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
