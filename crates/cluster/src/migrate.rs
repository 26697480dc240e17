// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Re-place entities orphaned by node loss.
//!
//! Every surviving node runs one migrator; the directory's placement race
//! decides a single winner per entity, and losers simply adopt. State is
//! whatever the lost node last persisted.

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use stead_core::Clock;
use stead_runtime::Runtime;

use crate::directory::{Cluster, MembershipEvent};
use crate::registry::parse_entity_name;

pub(crate) fn spawn_migrator<C: Clock + 'static>(
    runtime: Runtime<C>,
    cluster: Cluster,
    token: CancellationToken,
) -> JoinHandle<()> {
    let mut events = cluster.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                event = events.recv() => match event {
                    Ok(MembershipEvent::Down { node, orphaned }) => {
                        for name in orphaned {
                            let Some(key) = parse_entity_name(&name) else { continue };
                            tracing::info!(lost = %node, entity = %key, "re-activating after node loss");
                            if let Err(e) =
                                runtime.ensure_activated(key.kind.as_str(), key.id.as_str()).await
                            {
                                tracing::warn!(entity = %key, error = %e, "migration activation failed");
                            }
                        }
                    }
                    Ok(MembershipEvent::Up(_)) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "migrator lagged behind membership events");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
    })
}
