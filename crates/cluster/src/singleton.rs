// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exactly one alarm poller across the cluster.
//!
//! The poller runs wherever a well-known marker name is held. On holder
//! loss any surviving node may claim the name and start a replacement;
//! brief overlap during failover is safe because claim atomicity on the
//! alarm rows serializes duplicate delivery.

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use stead_core::Clock;
use stead_runtime::Runtime;

use crate::directory::{Cluster, MembershipEvent, NodeId};

pub(crate) fn poller_marker(prefix: Option<&str>) -> String {
    match prefix {
        Some(p) => format!("singleton:alarm-poller:{p}"),
        None => "singleton:alarm-poller".to_string(),
    }
}

fn try_acquire<C: Clock + 'static>(
    runtime: &Runtime<C>,
    cluster: &Cluster,
    node: NodeId,
    name: &str,
) {
    match cluster.acquire_marker(name, node) {
        Ok(()) => {
            if runtime.poller_running() {
                return;
            }
            match runtime.spawn_poller() {
                Ok(()) => tracing::info!(%node, "alarm poller singleton acquired"),
                Err(e) => tracing::error!(%node, error = %e, "failed to start the singleton poller"),
            }
        }
        Err(holder) => tracing::debug!(%holder, "alarm poller held elsewhere"),
    }
}

pub(crate) fn spawn_singleton_guard<C: Clock + 'static>(
    runtime: Runtime<C>,
    cluster: Cluster,
    node: NodeId,
    name: String,
    token: CancellationToken,
) -> JoinHandle<()> {
    let mut events = cluster.subscribe();
    tokio::spawn(async move {
        try_acquire(&runtime, &cluster, node, &name);
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    if cluster.marker_holder(&name) == Some(node) {
                        runtime.stop_poller().await;
                        cluster.release_marker(&name, node);
                    }
                    break;
                }
                event = events.recv() => match event {
                    Ok(MembershipEvent::Down { .. }) => try_acquire(&runtime, &cluster, node, &name),
                    Ok(MembershipEvent::Up(_)) => {}
                    Err(RecvError::Lagged(_)) => try_acquire(&runtime, &cluster, node, &name),
                    Err(RecvError::Closed) => break,
                },
            }
        }
    })
}
