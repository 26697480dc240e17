// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime configuration

use std::time::Duration;

use crate::state::KeyPolicy;

/// Which registry/placement scope the runtime addresses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RegistryMode {
    /// Keyed directory in the current process.
    #[default]
    Local,
    /// Cluster-wide directory; placements migrate on membership changes.
    Distributed,
}

crate::simple_display! {
    RegistryMode {
        Local => "local",
        Distributed => "distributed",
    }
}

/// Which alarm delivery backend is active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SchedulerKind {
    /// Durable alarm table scanned by a claim-based poller.
    #[default]
    Poll,
    /// Delegate durability and retry to an external job system.
    ExternalJob,
}

crate::simple_display! {
    SchedulerKind {
        Poll => "poll",
        ExternalJob => "external-job",
    }
}

/// Runtime-wide options. Per-entity overrides in
/// [`EntityOptions`](crate::catalog::EntityOptions) take precedence where set.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    pub registry_mode: RegistryMode,
    pub scheduler: SchedulerKind,
    /// How often the poll backend scans for due alarms.
    pub polling_interval: Duration,
    /// Claims older than this are considered abandoned and retried.
    pub claim_ttl: Duration,
    pub hibernate_after: Duration,
    /// Inactivity shutdown. Unset means instances live until deactivated.
    pub shutdown_after: Option<Duration>,
    pub key_policy: KeyPolicy,
    /// Opaque scoping identifier passed unchanged to store and scheduler.
    pub prefix: Option<String>,
    /// Default deadline for invocations and scheduling calls.
    pub call_timeout: Duration,
    /// Queue name used by the external-job backend.
    pub external_job_queue: String,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            registry_mode: RegistryMode::Local,
            scheduler: SchedulerKind::Poll,
            polling_interval: Duration::from_secs(30),
            claim_ttl: Duration::from_secs(60),
            hibernate_after: Duration::from_secs(300),
            shutdown_after: None,
            key_policy: KeyPolicy::Strings,
            prefix: None,
            call_timeout: Duration::from_secs(5),
            external_job_queue: "alarms".to_string(),
        }
    }
}

impl RuntimeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    crate::setters! {
        into { external_job_queue: String }
        set {
            registry_mode: RegistryMode,
            scheduler: SchedulerKind,
            polling_interval: Duration,
            claim_ttl: Duration,
            hibernate_after: Duration,
            key_policy: KeyPolicy,
            call_timeout: Duration,
        }
        option {
            shutdown_after: Duration,
            prefix: String,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
