// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-entity instance task.
//!
//! Each instance is a single tokio task owning one entity's state, fed by a
//! bounded mailbox. The lifetime is activation → load → accept-work loop →
//! terminate; handler calls for one entity are strictly serialized by the
//! mailbox. Hibernation compacts the live document to its serialized form;
//! the inactivity timer turns into a supervised stop.

mod dispatch;
mod load;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use stead_core::catalog::{EntityDef, EntityOptions};
use stead_core::{CallError, Clock, EntityKey, KeyPolicy, RuntimeOptions, StateDoc, SymbolTable, Telemetry};
use stead_scheduler::Scheduler;
use stead_store::ObjectStore;

use crate::handle::{InstanceHandle, InstanceMsg, StopReason};

const MAILBOX_CAPACITY: usize = 64;

/// Per-instance settings, resolved from runtime options and the entity
/// definition's overrides.
#[derive(Debug, Clone)]
pub(crate) struct InstanceConfig {
    pub hibernate_after: Duration,
    pub shutdown_after: Option<Duration>,
    pub key_policy: KeyPolicy,
    pub prefix: Option<String>,
}

impl InstanceConfig {
    pub(crate) fn resolve(options: &RuntimeOptions, overrides: &EntityOptions) -> Self {
        Self {
            hibernate_after: overrides.hibernate_after.unwrap_or(options.hibernate_after),
            shutdown_after: overrides.shutdown_after.or(options.shutdown_after),
            key_policy: overrides.key_policy.unwrap_or(options.key_policy),
            prefix: options.prefix.clone(),
        }
    }
}

/// Everything an instance task needs to run.
pub(crate) struct InstanceSeed<C: Clock> {
    pub key: EntityKey,
    pub def: Arc<EntityDef>,
    pub store: Option<Arc<dyn ObjectStore>>,
    pub scheduler: Arc<dyn Scheduler>,
    pub symbols: Arc<SymbolTable>,
    pub telemetry: Arc<Telemetry>,
    pub config: InstanceConfig,
    pub clock: C,
    /// Runtime-wide abrupt-stop signal.
    pub shutdown: CancellationToken,
}

/// Spawn the instance task. The handle is valid immediately; the ready
/// channel resolves once the initial load finished (or failed).
pub(crate) fn spawn<C: Clock + 'static>(
    seed: InstanceSeed<C>,
) -> (InstanceHandle, oneshot::Receiver<Result<(), CallError>>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
    let handle = InstanceHandle::new(seed.key.clone(), Uuid::new_v4(), tx);
    let (ready_tx, ready_rx) = oneshot::channel();
    let join = tokio::spawn(run(seed, rx, ready_tx));
    (handle, ready_rx, join)
}

enum Live {
    Active(StateDoc),
    /// Memory-compacted: the document in its serialized form.
    Hibernated(String),
}

fn hibernate(live: Live) -> Live {
    match live {
        Live::Active(doc) => match serde_json::to_string(&doc) {
            Ok(raw) => Live::Hibernated(raw),
            Err(e) => {
                tracing::error!(error = %e, "hibernation serialize failed; staying active");
                Live::Active(doc)
            }
        },
        hibernated => hibernated,
    }
}

fn wake(live: &mut Live) -> Result<&mut StateDoc, CallError> {
    if let Live::Hibernated(raw) = live {
        let doc: StateDoc = serde_json::from_str(raw)
            .map_err(|e| CallError::Load(format!("rehydrate failed: {e}")))?;
        *live = Live::Active(doc);
    }
    match live {
        Live::Active(doc) => Ok(doc),
        Live::Hibernated(_) => Err(CallError::Load("rehydrate failed".to_string())),
    }
}

async fn run<C: Clock>(
    seed: InstanceSeed<C>,
    mut rx: mpsc::Receiver<InstanceMsg>,
    ready: oneshot::Sender<Result<(), CallError>>,
) {
    let state = match load::initialize(&seed).await {
        Ok(state) => {
            let _ = ready.send(Ok(()));
            state
        }
        Err(e) => {
            tracing::warn!(entity = %seed.key, error = %e, "activation load failed");
            let _ = ready.send(Err(e));
            return;
        }
    };
    tracing::debug!(entity = %seed.key, "instance ready");

    let mut live = Live::Active(state);
    let mut last_activity = Instant::now();
    let far_future = Duration::from_secs(86_400 * 365);

    loop {
        let hibernating = matches!(live, Live::Hibernated(_));
        let hibernate_at = if hibernating {
            Instant::now() + far_future
        } else {
            last_activity + seed.config.hibernate_after
        };
        let shutdown_at = last_activity + seed.config.shutdown_after.unwrap_or(far_future);

        tokio::select! {
            _ = seed.shutdown.cancelled() => {
                tracing::debug!(entity = %seed.key, "instance aborted by runtime shutdown");
                return;
            }
            msg = rx.recv() => match msg {
                None => break,
                Some(InstanceMsg::Stop { reason }) => {
                    tracing::debug!(entity = %seed.key, %reason, "instance stopping");
                    break;
                }
                Some(InstanceMsg::Invoke { handler, args, reply }) => {
                    match wake(&mut live) {
                        Ok(state) => {
                            let result = dispatch::invoke(&seed, state, &handler, &args).await;
                            let _ = reply.send(result);
                        }
                        Err(e) => {
                            let _ = reply.send(Err(e));
                        }
                    }
                    last_activity = Instant::now();
                }
                Some(InstanceMsg::Fire { name, reply }) => {
                    match wake(&mut live) {
                        Ok(state) => {
                            let result = dispatch::fire(&seed, state, &name).await;
                            let _ = reply.send(result);
                        }
                        Err(e) => {
                            let _ = reply.send(Err(e));
                        }
                    }
                    last_activity = Instant::now();
                }
            },
            _ = tokio::time::sleep_until(hibernate_at), if !hibernating => {
                tracing::debug!(entity = %seed.key, "hibernating");
                live = hibernate(live);
            }
            _ = tokio::time::sleep_until(shutdown_at), if seed.config.shutdown_after.is_some() => {
                tracing::debug!(entity = %seed.key, reason = %StopReason::Inactive, "instance stopping");
                break;
            }
        }
    }
    tracing::debug!(entity = %seed.key, "instance stopped");
}
