// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The scheduler contract shared by both backends.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

use stead_core::{AlarmName, EntityKey};
use stead_store::StoreError;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("alarm store error: {0}")]
    Store(#[from] StoreError),
    #[error("job system error: {0}")]
    JobSystem(String),
    #[error("no scheduler configured (runtime has no store)")]
    NotConfigured,
    #[error("scheduler call timed out")]
    Timeout,
}

/// One pending alarm, as reported by `list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmEntry {
    pub name: AlarmName,
    pub scheduled_at: DateTime<Utc>,
}

/// Durable, at-least-once alarm scheduling.
///
/// `schedule` is an upsert: it replaces any pending alarm with the same
/// `(type, id, name)`. Handlers must tolerate duplicate delivery.
#[async_trait]
pub trait Scheduler: Send + Sync {
    async fn schedule(
        &self,
        key: &EntityKey,
        name: &AlarmName,
        delay: Duration,
    ) -> Result<(), ScheduleError>;

    /// Idempotent: Ok even when no such alarm is pending.
    async fn cancel(&self, key: &EntityKey, name: &AlarmName) -> Result<(), ScheduleError>;

    async fn cancel_all(&self, key: &EntityKey) -> Result<(), ScheduleError>;

    /// Pending alarms in ascending `scheduled_at` order.
    async fn list(&self, key: &EntityKey) -> Result<Vec<AlarmEntry>, ScheduleError>;
}

/// Outcome of delivering one alarm to its entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FireOutcome {
    /// Delivered (including the no-alarm-handler reply).
    Completed,
    /// The entity could not load or persist; retried after the claim TTL.
    PersistenceFailed(String),
    /// Handler or routing failure; retried after the claim TTL.
    Failed(String),
    /// The entity type is no longer registered; the row is an orphan.
    UnknownTarget,
}

/// Delivery seam between the scheduler and the actor runtime.
#[async_trait]
pub trait AlarmRouter: Send + Sync {
    async fn fire(&self, key: &EntityKey, name: &AlarmName) -> FireOutcome;
}

/// Placeholder backend for runtimes without a store: alarms have nowhere
/// durable to live, so every operation reports `NotConfigured`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullScheduler;

#[async_trait]
impl Scheduler for NullScheduler {
    async fn schedule(
        &self,
        _key: &EntityKey,
        _name: &AlarmName,
        _delay: Duration,
    ) -> Result<(), ScheduleError> {
        Err(ScheduleError::NotConfigured)
    }

    async fn cancel(&self, _key: &EntityKey, _name: &AlarmName) -> Result<(), ScheduleError> {
        Err(ScheduleError::NotConfigured)
    }

    async fn cancel_all(&self, _key: &EntityKey) -> Result<(), ScheduleError> {
        Err(ScheduleError::NotConfigured)
    }

    async fn list(&self, _key: &EntityKey) -> Result<Vec<AlarmEntry>, ScheduleError> {
        Err(ScheduleError::NotConfigured)
    }
}
