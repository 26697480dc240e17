// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! External-job backend: delegate durability and retry to a job system.
//!
//! Scheduling cancels any pending job for the same `(type, id, name)` and
//! enqueues a fresh one; the worker translates job payloads into alarm
//! fires. This backend adds nothing to the process tree.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use stead_core::{AlarmName, EntityKey};

use crate::contract::{AlarmEntry, AlarmRouter, FireOutcome, ScheduleError, Scheduler};

/// Payload of one scheduled alarm job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmJob {
    pub key: EntityKey,
    pub name: AlarmName,
}

/// Job states that count as pending for cancellation and listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Available,
    Scheduled,
    Retryable,
}

pub const PENDING_STATES: [JobState; 3] =
    [JobState::Available, JobState::Scheduled, JobState::Retryable];

#[derive(Debug, Error)]
pub enum JobSystemError {
    #[error("job system unavailable: {0}")]
    Unavailable(String),
}

/// Port to the external job-processing system.
///
/// `cancel_matching` and `pending` are scoped to this worker's queue and
/// filter on the [`PENDING_STATES`].
#[async_trait]
pub trait JobSystem: Send + Sync {
    async fn enqueue(
        &self,
        queue: &str,
        job: AlarmJob,
        delay: Duration,
    ) -> Result<(), JobSystemError>;

    /// Cancel pending jobs for the entity; `name = None` matches them all.
    /// Returns the number cancelled.
    async fn cancel_matching(
        &self,
        queue: &str,
        key: &EntityKey,
        name: Option<&AlarmName>,
    ) -> Result<u64, JobSystemError>;

    /// Pending jobs for the entity, ordered by their scheduled time.
    async fn pending(
        &self,
        queue: &str,
        key: &EntityKey,
    ) -> Result<Vec<(AlarmName, DateTime<Utc>)>, JobSystemError>;
}

/// Scheduler contract over a [`JobSystem`].
pub struct ExternalJobScheduler {
    system: Arc<dyn JobSystem>,
    queue: String,
}

impl ExternalJobScheduler {
    pub fn new(system: Arc<dyn JobSystem>, queue: impl Into<String>) -> Self {
        Self { system, queue: queue.into() }
    }
}

#[async_trait]
impl Scheduler for ExternalJobScheduler {
    async fn schedule(
        &self,
        key: &EntityKey,
        name: &AlarmName,
        delay: Duration,
    ) -> Result<(), ScheduleError> {
        self.system
            .cancel_matching(&self.queue, key, Some(name))
            .await
            .map_err(|e| ScheduleError::JobSystem(e.to_string()))?;
        // Floored to the job system's whole-second resolution.
        let delay = Duration::from_secs(delay.as_secs());
        self.system
            .enqueue(&self.queue, AlarmJob { key: key.clone(), name: name.clone() }, delay)
            .await
            .map_err(|e| ScheduleError::JobSystem(e.to_string()))
    }

    async fn cancel(&self, key: &EntityKey, name: &AlarmName) -> Result<(), ScheduleError> {
        self.system
            .cancel_matching(&self.queue, key, Some(name))
            .await
            .map_err(|e| ScheduleError::JobSystem(e.to_string()))?;
        Ok(())
    }

    async fn cancel_all(&self, key: &EntityKey) -> Result<(), ScheduleError> {
        self.system
            .cancel_matching(&self.queue, key, None)
            .await
            .map_err(|e| ScheduleError::JobSystem(e.to_string()))?;
        Ok(())
    }

    async fn list(&self, key: &EntityKey) -> Result<Vec<AlarmEntry>, ScheduleError> {
        let jobs = self
            .system
            .pending(&self.queue, key)
            .await
            .map_err(|e| ScheduleError::JobSystem(e.to_string()))?;
        Ok(jobs
            .into_iter()
            .map(|(name, scheduled_at)| AlarmEntry { name, scheduled_at })
            .collect())
    }
}

/// What the job system should do with a processed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobVerdict {
    /// Retire the job.
    Done,
    /// Surface the failure so the job system retries.
    Retry(String),
    /// Swallow without retry (entity type no longer exists).
    Discard,
}

/// The worker side: translate a job payload into an alarm fire.
pub struct JobWorker {
    router: Arc<dyn AlarmRouter>,
}

impl JobWorker {
    pub fn new(router: Arc<dyn AlarmRouter>) -> Self {
        Self { router }
    }

    pub async fn process(&self, job: &AlarmJob) -> JobVerdict {
        match self.router.fire(&job.key, &job.name).await {
            FireOutcome::Completed => JobVerdict::Done,
            FireOutcome::PersistenceFailed(cause) => JobVerdict::Retry(cause),
            FireOutcome::Failed(cause) => JobVerdict::Retry(cause),
            FireOutcome::UnknownTarget => {
                tracing::debug!(entity = %job.key, alarm = %job.name, "discarding job for unknown entity type");
                JobVerdict::Discard
            }
        }
    }
}

#[cfg(test)]
#[path = "external_tests.rs"]
mod tests;
