// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Topology adapter: one configuration value selects local or distributed
//! registry, supervision, and poller placement.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use stead_core::{Catalog, Clock, RegistryMode, RuntimeOptions, SchedulerKind, SystemClock, Telemetry};
use stead_runtime::{Runtime, RuntimeBuilder, StartError};
use stead_scheduler::JobSystem;
use stead_store::Db;

use crate::directory::{Cluster, NodeId};
use crate::migrate::spawn_migrator;
use crate::registry::DistributedRegistry;
use crate::singleton::{poller_marker, spawn_singleton_guard};

/// Peer discovery for distributed mode. The in-process directory needs no
/// discovery; an explicit peer list is recorded for transports that do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ClusterMembers {
    #[default]
    Auto,
    Peers(Vec<String>),
}

/// Which scope this node addresses.
pub enum Topology {
    Local,
    Distributed { cluster: Cluster, members: ClusterMembers },
}

impl Topology {
    pub fn distributed(cluster: Cluster) -> Self {
        Topology::Distributed { cluster, members: ClusterMembers::Auto }
    }
}

/// Builder for a runtime node under either topology.
pub struct NodeBuilder<C: Clock = SystemClock> {
    catalog: Catalog,
    options: RuntimeOptions,
    topology: Topology,
    db: Option<Db>,
    job_system: Option<Arc<dyn JobSystem>>,
    telemetry: Option<Arc<Telemetry>>,
    clock: C,
}

impl NodeBuilder<SystemClock> {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            options: RuntimeOptions::default(),
            topology: Topology::Local,
            db: None,
            job_system: None,
            telemetry: None,
            clock: SystemClock,
        }
    }
}

impl<C: Clock + 'static> NodeBuilder<C> {
    pub fn options(mut self, options: RuntimeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn topology(mut self, topology: Topology) -> Self {
        self.topology = topology;
        self
    }

    pub fn db(mut self, db: Db) -> Self {
        self.db = Some(db);
        self
    }

    pub fn job_system(mut self, system: Arc<dyn JobSystem>) -> Self {
        self.job_system = Some(system);
        self
    }

    pub fn telemetry(mut self, telemetry: Arc<Telemetry>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn clock<C2: Clock>(self, clock: C2) -> NodeBuilder<C2> {
        NodeBuilder {
            catalog: self.catalog,
            options: self.options,
            topology: self.topology,
            db: self.db,
            job_system: self.job_system,
            telemetry: self.telemetry,
            clock,
        }
    }

    pub async fn start(self) -> Result<Node<C>, StartError> {
        let has_db = self.db.is_some();
        let mut builder = RuntimeBuilder::new(self.catalog).clock(self.clock);
        if let Some(db) = self.db {
            builder = builder.db(db);
        }
        if let Some(system) = self.job_system {
            builder = builder.job_system(system);
        }
        if let Some(telemetry) = self.telemetry {
            builder = builder.telemetry(telemetry);
        }

        match self.topology {
            Topology::Local => {
                let options = self.options.registry_mode(RegistryMode::Local);
                let runtime = builder.options(options).start().await?;
                Ok(Node { runtime, cluster: None, node_id: None, token: CancellationToken::new(), tasks: Vec::new() })
            }
            Topology::Distributed { cluster, members } => {
                if let ClusterMembers::Peers(peers) = &members {
                    tracing::info!(?peers, "distributed node with a static peer set");
                }
                let node_id = cluster.join();
                let options = self.options.registry_mode(RegistryMode::Distributed);
                let scheduler_kind = options.scheduler;
                let marker = poller_marker(options.prefix.as_deref());
                let runtime = builder
                    .options(options)
                    .registry(Arc::new(DistributedRegistry::new(cluster.clone(), node_id)))
                    .start()
                    .await?;

                let token = CancellationToken::new();
                let mut tasks =
                    vec![spawn_migrator(runtime.clone(), cluster.clone(), token.child_token())];
                if scheduler_kind == SchedulerKind::Poll && has_db {
                    tasks.push(spawn_singleton_guard(
                        runtime.clone(),
                        cluster.clone(),
                        node_id,
                        marker,
                        token.child_token(),
                    ));
                }
                Ok(Node { runtime, cluster: Some(cluster), node_id: Some(node_id), token, tasks })
            }
        }
    }
}

/// One runtime node plus its cluster duties (migration, singleton guard).
pub struct Node<C: Clock = SystemClock> {
    runtime: Runtime<C>,
    cluster: Option<Cluster>,
    node_id: Option<NodeId>,
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl<C: Clock + 'static> Node<C> {
    pub fn runtime(&self) -> &Runtime<C> {
        &self.runtime
    }

    pub fn node_id(&self) -> Option<NodeId> {
        self.node_id
    }

    /// Graceful stop: release cluster duties, deactivate instances, leave.
    pub async fn shutdown(self) {
        self.token.cancel();
        for task in self.tasks {
            let _ = task.await;
        }
        self.runtime.shutdown().await;
        if let (Some(cluster), Some(node_id)) = (self.cluster, self.node_id) {
            cluster.leave(node_id);
        }
    }

    /// Abrupt stop modeling node loss: no draining, no handoff. Surviving
    /// nodes observe the membership event and migrate placements.
    pub fn crash(self) {
        self.token.cancel();
        self.runtime.abort();
        if let (Some(cluster), Some(node_id)) = (self.cluster, self.node_id) {
            cluster.leave(node_id);
        }
    }
}

#[cfg(test)]
#[path = "node_tests.rs"]
mod tests;
