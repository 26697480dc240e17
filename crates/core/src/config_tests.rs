// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn defaults_match_documented_values() {
    let opts = RuntimeOptions::default();
    assert_eq!(opts.registry_mode, RegistryMode::Local);
    assert_eq!(opts.scheduler, SchedulerKind::Poll);
    assert_eq!(opts.polling_interval, Duration::from_secs(30));
    assert_eq!(opts.claim_ttl, Duration::from_secs(60));
    assert_eq!(opts.hibernate_after, Duration::from_secs(300));
    assert_eq!(opts.shutdown_after, None);
    assert_eq!(opts.key_policy, KeyPolicy::Strings);
    assert_eq!(opts.prefix, None);
    assert_eq!(opts.call_timeout, Duration::from_secs(5));
}

#[test]
fn setters_chain() {
    let opts = RuntimeOptions::new()
        .registry_mode(RegistryMode::Distributed)
        .scheduler(SchedulerKind::ExternalJob)
        .polling_interval(Duration::from_millis(25))
        .shutdown_after(Duration::from_secs(1))
        .prefix("tenant_a")
        .external_job_queue("entity_alarms");

    assert_eq!(opts.registry_mode, RegistryMode::Distributed);
    assert_eq!(opts.scheduler, SchedulerKind::ExternalJob);
    assert_eq!(opts.polling_interval, Duration::from_millis(25));
    assert_eq!(opts.shutdown_after, Some(Duration::from_secs(1)));
    assert_eq!(opts.prefix.as_deref(), Some("tenant_a"));
    assert_eq!(opts.external_job_queue, "entity_alarms");
}

#[test]
fn mode_display() {
    assert_eq!(RegistryMode::Local.to_string(), "local");
    assert_eq!(RegistryMode::Distributed.to_string(), "distributed");
    assert_eq!(SchedulerKind::Poll.to_string(), "poll");
    assert_eq!(SchedulerKind::ExternalJob.to_string(), "external-job");
}
