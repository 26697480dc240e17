// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Map `(type, id)` to a live instance handle with a unique-name guarantee.

use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tokio::sync::oneshot;
use uuid::Uuid;

use stead_core::EntityKey;

use crate::handle::InstanceHandle;

/// Exclusive right to place an instance for one key, held between `begin`
/// and `complete`/`abort`.
#[derive(Debug)]
pub struct ActivationClaim {
    key: EntityKey,
    token: Uuid,
}

impl ActivationClaim {
    pub fn new(key: EntityKey, token: Uuid) -> Self {
        Self { key, token }
    }

    pub fn key(&self) -> &EntityKey {
        &self.key
    }

    pub fn token(&self) -> Uuid {
        self.token
    }
}

/// Outcome of an activation attempt against the directory.
pub enum Begin {
    /// This caller won the right to place the instance.
    Claimed(ActivationClaim),
    /// An instance is already live; adopt it.
    Live(InstanceHandle),
    /// Another activator is placing the instance; await its handle. A closed
    /// receiver means the winner aborted and the race is open again.
    Pending(oneshot::Receiver<InstanceHandle>),
}

/// Atomic directory from entity keys to live instances.
///
/// Two concurrent activations for the same key resolve to exactly one
/// winning placement; losers adopt the winner's handle.
pub trait Registry: Send + Sync {
    fn locate(&self, key: &EntityKey) -> Option<InstanceHandle>;

    fn begin(&self, key: &EntityKey) -> Begin;

    /// Publish the placed instance and release waiters.
    fn complete(&self, claim: ActivationClaim, handle: InstanceHandle);

    /// Give up a claim (activation failed). Waiters observe the closed
    /// channel and race again.
    fn abort(&self, claim: ActivationClaim);

    /// Drop the entry for a finished instance. The epoch guard keeps a
    /// stale handle from evicting a successor. Returns whether it matched.
    fn remove(&self, key: &EntityKey, epoch: Uuid) -> bool;

    /// Keys with a live instance in this registry's scope.
    fn live_keys(&self) -> Vec<EntityKey>;
}

enum Slot {
    Pending { token: Uuid, waiters: Vec<oneshot::Sender<InstanceHandle>> },
    Live(InstanceHandle),
}

/// Keyed directory in the current process.
#[derive(Default)]
pub struct LocalRegistry {
    slots: Mutex<HashMap<EntityKey, Slot>>,
}

impl LocalRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Registry for LocalRegistry {
    fn locate(&self, key: &EntityKey) -> Option<InstanceHandle> {
        match self.slots.lock().get(key) {
            Some(Slot::Live(handle)) if handle.is_alive() => Some(handle.clone()),
            _ => None,
        }
    }

    fn begin(&self, key: &EntityKey) -> Begin {
        let mut slots = self.slots.lock();
        match slots.entry(key.clone()) {
            Entry::Vacant(entry) => {
                let token = Uuid::new_v4();
                entry.insert(Slot::Pending { token, waiters: Vec::new() });
                Begin::Claimed(ActivationClaim::new(key.clone(), token))
            }
            Entry::Occupied(mut entry) => match entry.get_mut() {
                Slot::Live(handle) if handle.is_alive() => Begin::Live(handle.clone()),
                Slot::Pending { waiters, .. } => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    Begin::Pending(rx)
                }
                // A finished instance whose entry has not been pruned yet:
                // placement is open again.
                Slot::Live(_) => {
                    let token = Uuid::new_v4();
                    entry.insert(Slot::Pending { token, waiters: Vec::new() });
                    Begin::Claimed(ActivationClaim::new(key.clone(), token))
                }
            },
        }
    }

    fn complete(&self, claim: ActivationClaim, handle: InstanceHandle) {
        let mut slots = self.slots.lock();
        let valid = matches!(
            slots.get(claim.key()),
            Some(Slot::Pending { token, .. }) if *token == claim.token()
        );
        if !valid {
            tracing::debug!(entity = %claim.key(), "completed a superseded activation claim");
            return;
        }
        if let Some(Slot::Pending { waiters, .. }) =
            slots.insert(claim.key().clone(), Slot::Live(handle.clone()))
        {
            for waiter in waiters {
                let _ = waiter.send(handle.clone());
            }
        }
    }

    fn abort(&self, claim: ActivationClaim) {
        let mut slots = self.slots.lock();
        if let Some(Slot::Pending { token, .. }) = slots.get(claim.key()) {
            if *token == claim.token() {
                slots.remove(claim.key());
            }
        }
    }

    fn remove(&self, key: &EntityKey, epoch: Uuid) -> bool {
        let mut slots = self.slots.lock();
        if let Some(Slot::Live(handle)) = slots.get(key) {
            if handle.epoch() == epoch {
                slots.remove(key);
                return true;
            }
        }
        false
    }

    fn live_keys(&self) -> Vec<EntityKey> {
        self.slots
            .lock()
            .iter()
            .filter_map(|(key, slot)| match slot {
                Slot::Live(handle) if handle.is_alive() => Some(key.clone()),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
