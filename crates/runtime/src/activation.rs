// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Placement: turn a name into a live instance.

use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use stead_core::{CallError, Clock, EntityKey};

use crate::handle::InstanceHandle;
use crate::instance::{self, InstanceConfig, InstanceSeed};
use crate::registry::{Begin, Registry};
use crate::runtime::RuntimeInner;

/// Bound on back-to-back lost races before giving up.
const MAX_ATTEMPTS: usize = 16;

/// The single entry point for activation: adopt the live instance, wait on
/// a placement in flight, or win the claim and place one.
pub(crate) async fn activate<C: Clock + 'static>(
    inner: &Arc<RuntimeInner<C>>,
    key: &EntityKey,
) -> Result<InstanceHandle, CallError> {
    let Some(def) = inner.catalog.get(&key.kind) else {
        return Err(CallError::Activation(format!("unknown entity type: {}", key.kind)));
    };

    for _ in 0..MAX_ATTEMPTS {
        match inner.registry.begin(key) {
            Begin::Live(handle) => return Ok(handle),
            Begin::Pending(waiter) => match waiter.await {
                Ok(handle) => return Ok(handle),
                // The winner aborted; the race is open again.
                Err(_) => continue,
            },
            Begin::Claimed(claim) => {
                let seed = InstanceSeed {
                    key: key.clone(),
                    config: InstanceConfig::resolve(&inner.options, def.options()),
                    def: def.clone(),
                    store: inner.store.clone(),
                    scheduler: inner.scheduler.clone(),
                    symbols: inner.symbols.clone(),
                    telemetry: inner.telemetry.clone(),
                    clock: inner.clock.clone(),
                    shutdown: inner.shutdown.clone(),
                };
                let (handle, ready, join) = instance::spawn(seed);
                return match ready.await {
                    Ok(Ok(())) => {
                        inner.registry.complete(claim, handle.clone());
                        supervise(inner.registry.clone(), key.clone(), handle.epoch(), join);
                        Ok(handle)
                    }
                    Ok(Err(e)) => {
                        inner.registry.abort(claim);
                        Err(e)
                    }
                    Err(_) => {
                        inner.registry.abort(claim);
                        Err(CallError::Activation("instance stopped during activation".to_string()))
                    }
                };
            }
        }
    }
    Err(CallError::Activation("activation raced repeatedly".to_string()))
}

/// Supervision is `temporary`: when the task finishes (or panics) its
/// registry entry is pruned, and the entity is re-created on the next call
/// rather than restarted in place.
fn supervise(
    registry: Arc<dyn Registry>,
    key: EntityKey,
    epoch: Uuid,
    join: JoinHandle<()>,
) {
    tokio::spawn(async move {
        if let Err(e) = join.await {
            if e.is_panic() {
                tracing::error!(entity = %key, "instance task panicked");
            }
        }
        registry.remove(&key, epoch);
    });
}
