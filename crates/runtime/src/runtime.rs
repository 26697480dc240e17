// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The runtime facade: wiring, RPC surface, and poller lifecycle.

use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use stead_core::{
    AlarmName, CallError, CallReply, Catalog, Clock, EntityKey, RegistryMode, RuntimeOptions,
    SchedulerKind, SymbolTable, SystemClock, Telemetry,
};
use stead_scheduler::{
    AlarmEntry, AlarmRouter, ExternalJobScheduler, JobSystem, NullScheduler, PollScheduler,
    Poller, PollerConfig, ScheduleError, Scheduler,
};
use stead_store::{migrate_to_latest, AlarmStore, Db, MigrationError, ObjectStore, SqlObjectStore};

use crate::activation;
use crate::handle::{InstanceHandle, StopReason};
use crate::registry::{LocalRegistry, Registry};
use crate::router::RuntimeRouter;

#[derive(Debug, Error)]
pub enum StartError {
    #[error("migration failed: {0}")]
    Migration(#[from] MigrationError),
    #[error("external-job scheduler requires a job system")]
    MissingJobSystem,
    #[error("the alarm poller requires a store")]
    PollerRequiresStore,
}

pub(crate) struct RuntimeInner<C: Clock> {
    pub(crate) catalog: Catalog,
    pub(crate) store: Option<Arc<dyn ObjectStore>>,
    pub(crate) scheduler: Arc<dyn Scheduler>,
    pub(crate) registry: Arc<dyn Registry>,
    pub(crate) symbols: Arc<SymbolTable>,
    pub(crate) telemetry: Arc<Telemetry>,
    pub(crate) options: RuntimeOptions,
    pub(crate) clock: C,
    pub(crate) db: Option<Db>,
    pub(crate) shutdown: CancellationToken,
}

struct PollerTask {
    token: CancellationToken,
    join: JoinHandle<()>,
}

/// Wires catalog, store, scheduler backend, and registry into a [`Runtime`].
pub struct RuntimeBuilder<C: Clock = SystemClock> {
    catalog: Catalog,
    options: RuntimeOptions,
    db: Option<Db>,
    store: Option<Arc<dyn ObjectStore>>,
    registry: Option<Arc<dyn Registry>>,
    job_system: Option<Arc<dyn JobSystem>>,
    telemetry: Option<Arc<Telemetry>>,
    clock: C,
}

impl RuntimeBuilder<SystemClock> {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            options: RuntimeOptions::default(),
            db: None,
            store: None,
            registry: None,
            job_system: None,
            telemetry: None,
            clock: SystemClock,
        }
    }
}

impl<C: Clock + 'static> RuntimeBuilder<C> {
    pub fn options(mut self, options: RuntimeOptions) -> Self {
        self.options = options;
        self
    }

    /// The persistence backend. Absent means in-memory only: state lives and
    /// dies with each instance, and alarms have no durable home.
    pub fn db(mut self, db: Db) -> Self {
        self.db = Some(db);
        self
    }

    /// Override the object-store implementation in front of the database
    /// (tests wrap it to inject failures).
    pub fn store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Override the registry implementation (the cluster adapter does).
    pub fn registry(mut self, registry: Arc<dyn Registry>) -> Self {
        self.registry = Some(registry);
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

    pub fn clock<C2: Clock>(self, clock: C2) -> RuntimeBuilder<C2> {
        RuntimeBuilder {
            catalog: self.catalog,
            options: self.options,
            db: self.db,
            store: self.store,
            registry: self.registry,
            job_system: self.job_system,
            telemetry: self.telemetry,
            clock,
        }
    }

    pub async fn start(self) -> Result<Runtime<C>, StartError> {
        let telemetry = self.telemetry.unwrap_or_else(|| Arc::new(Telemetry::new()));
        if let Some(db) = &self.db {
            migrate_to_latest(db, self.options.prefix.as_deref()).await?;
        }
        let store: Option<Arc<dyn ObjectStore>> = self.store.clone().or_else(|| {
            self.db
                .as_ref()
                .map(|db| Arc::new(SqlObjectStore::new(db.clone(), telemetry.clone())) as Arc<dyn ObjectStore>)
        });

        let scheduler: Arc<dyn Scheduler> = match self.options.scheduler {
            SchedulerKind::Poll => match &self.db {
                Some(db) => Arc::new(PollScheduler::new(
                    AlarmStore::new(db.clone(), self.options.prefix.clone()),
                    self.clock.clone(),
                )),
                None => Arc::new(NullScheduler),
            },
            SchedulerKind::ExternalJob => {
                let system = self.job_system.clone().ok_or(StartError::MissingJobSystem)?;
                Arc::new(ExternalJobScheduler::new(system, self.options.external_job_queue.clone()))
            }
        };

        let registry = self.registry.unwrap_or_else(|| Arc::new(LocalRegistry::new()));
        let inner = Arc::new(RuntimeInner {
            catalog: self.catalog,
            store,
            scheduler,
            registry,
            symbols: Arc::new(SymbolTable::new()),
            telemetry,
            options: self.options,
            clock: self.clock,
            db: self.db,
            shutdown: CancellationToken::new(),
        });
        let runtime = Runtime { inner, poller: Arc::new(Mutex::new(None)) };

        // A local-mode runtime owns its poller; in distributed mode the
        // cluster-singleton guard decides which node runs it.
        if runtime.inner.options.registry_mode == RegistryMode::Local
            && runtime.inner.options.scheduler == SchedulerKind::Poll
            && runtime.inner.db.is_some()
        {
            runtime.spawn_poller()?;
        }
        Ok(runtime)
    }
}

/// The durable entity runtime. Cloning shares the underlying node.
#[derive(Clone)]
pub struct Runtime<C: Clock = SystemClock> {
    inner: Arc<RuntimeInner<C>>,
    poller: Arc<Mutex<Option<PollerTask>>>,
}

impl<C: Clock> std::fmt::Debug for Runtime<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime").finish_non_exhaustive()
    }
}

impl Runtime<SystemClock> {
    pub fn builder(catalog: Catalog) -> RuntimeBuilder<SystemClock> {
        RuntimeBuilder::new(catalog)
    }
}

impl<C: Clock + 'static> Runtime<C> {
    /// Invoke a handler with the default deadline.
    pub async fn invoke(
        &self,
        kind: &str,
        id: &str,
        handler: &str,
        args: Vec<Value>,
    ) -> Result<CallReply, CallError> {
        self.invoke_with_deadline(kind, id, handler, args, self.inner.options.call_timeout).await
    }

    /// Invoke a handler, abandoning the wait after `deadline`. The instance
    /// may still complete and persist the mutation.
    pub async fn invoke_with_deadline(
        &self,
        kind: &str,
        id: &str,
        handler: &str,
        args: Vec<Value>,
        deadline: Duration,
    ) -> Result<CallReply, CallError> {
        let key = EntityKey::new(kind, id);
        let call = async {
            for attempt in 0..2 {
                let handle = activation::activate(&self.inner, &key).await?;
                match handle.invoke(handler, args.clone(), deadline).await {
                    Ok(result) => return result,
                    // Stopped between lookup and delivery (inactivity
                    // shutdown races the call): activate a fresh
                    // incarnation once.
                    Err(_closed) if attempt == 0 => continue,
                    Err(_closed) => break,
                }
            }
            Err(CallError::Activation("instance stopped".to_string()))
        };
        // The deadline covers activation (and its initial load) as well as
        // the handler itself.
        match tokio::time::timeout(deadline, call).await {
            Ok(result) => result,
            Err(_) => Err(CallError::Timeout(deadline)),
        }
    }

    /// Activate without invoking.
    pub async fn ensure_activated(&self, kind: &str, id: &str) -> Result<(), CallError> {
        activation::activate(&self.inner, &EntityKey::new(kind, id)).await.map(|_| ())
    }

    /// Gracefully stop the live instance, if any. State survives in the
    /// store; the next call re-activates.
    pub async fn deactivate(&self, kind: &str, id: &str, reason: &str) {
        let key = EntityKey::new(kind, id);
        if let Some(handle) = self.inner.registry.locate(&key) {
            handle.stop(StopReason::Requested(reason.to_string())).await;
        }
    }

    pub fn locate(&self, kind: &str, id: &str) -> Option<InstanceHandle> {
        self.inner.registry.locate(&EntityKey::new(kind, id))
    }

    pub async fn schedule(
        &self,
        kind: &str,
        id: &str,
        name: &str,
        delay: Duration,
    ) -> Result<(), ScheduleError> {
        let key = EntityKey::new(kind, id);
        self.bounded(self.inner.scheduler.schedule(&key, &AlarmName::new(name), delay)).await
    }

    pub async fn cancel_alarm(&self, kind: &str, id: &str, name: &str) -> Result<(), ScheduleError> {
        let key = EntityKey::new(kind, id);
        self.bounded(self.inner.scheduler.cancel(&key, &AlarmName::new(name))).await
    }

    pub async fn cancel_all_alarms(&self, kind: &str, id: &str) -> Result<(), ScheduleError> {
        self.bounded(self.inner.scheduler.cancel_all(&EntityKey::new(kind, id))).await
    }

    pub async fn list_alarms(&self, kind: &str, id: &str) -> Result<Vec<AlarmEntry>, ScheduleError> {
        self.bounded(self.inner.scheduler.list(&EntityKey::new(kind, id))).await
    }

    /// Scheduling calls share the invocation deadline semantics.
    async fn bounded<T>(
        &self,
        op: impl std::future::Future<Output = Result<T, ScheduleError>>,
    ) -> Result<T, ScheduleError> {
        match tokio::time::timeout(self.inner.options.call_timeout, op).await {
            Ok(result) => result,
            Err(_) => Err(ScheduleError::Timeout),
        }
    }

    /// The delivery seam, for external-job workers and cluster wiring.
    pub fn alarm_router(&self) -> Arc<dyn AlarmRouter> {
        Arc::new(RuntimeRouter(self.inner.clone()))
    }

    /// Start the claim-based poller on this node. Idempotent.
    pub fn spawn_poller(&self) -> Result<(), StartError> {
        let mut guard = self.poller.lock();
        if guard.is_some() {
            return Ok(());
        }
        let db = self.inner.db.clone().ok_or(StartError::PollerRequiresStore)?;
        let alarms = AlarmStore::new(db, self.inner.options.prefix.clone());
        let config = PollerConfig {
            interval: self.inner.options.polling_interval,
            claim_ttl: self.inner.options.claim_ttl,
            ..PollerConfig::default()
        };
        let router = Arc::new(RuntimeRouter(self.inner.clone()));
        let token = CancellationToken::new();
        let join = Poller::new(alarms, router, self.inner.clock.clone(), config).spawn(token.clone());
        *guard = Some(PollerTask { token, join });
        tracing::debug!("alarm poller started");
        Ok(())
    }

    pub async fn stop_poller(&self) {
        let task = self.poller.lock().take();
        if let Some(task) = task {
            task.token.cancel();
            let _ = task.join.await;
        }
    }

    pub fn poller_running(&self) -> bool {
        self.poller.lock().is_some()
    }

    /// Stop the poller and gracefully deactivate every live instance.
    pub async fn shutdown(&self) {
        self.stop_poller().await;
        for key in self.inner.registry.live_keys() {
            if let Some(handle) = self.inner.registry.locate(&key) {
                handle.stop(StopReason::Shutdown).await;
            }
        }
    }

    /// Abrupt stop: kill instance tasks without draining mailboxes. Models
    /// node loss for the distributed registry.
    pub fn abort(&self) {
        if let Some(task) = self.poller.lock().take() {
            task.token.cancel();
        }
        self.inner.shutdown.cancel();
    }

    pub fn telemetry(&self) -> Arc<Telemetry> {
        self.inner.telemetry.clone()
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.inner.options
    }
}

#[cfg(test)]
#[path = "runtime_tests/mod.rs"]
mod tests;
