// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory job system for external-backend tests.

#![allow(clippy::unwrap_used)]

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use std::time::Duration;

use stead_core::{AlarmName, EntityKey};

use crate::contract::{AlarmRouter, FireOutcome};
use crate::external::{AlarmJob, JobState, JobSystem, JobSystemError, PENDING_STATES};

/// Router stub that replays scripted outcomes and records every fire.
#[derive(Default)]
pub struct ScriptedRouter {
    outcomes: Mutex<std::collections::VecDeque<FireOutcome>>,
    fired: Mutex<Vec<(EntityKey, AlarmName)>>,
}

impl ScriptedRouter {
    /// Every fire completes.
    pub fn completing() -> Self {
        Self::default()
    }

    /// Replay the given outcomes in order, then complete.
    pub fn scripted(outcomes: impl IntoIterator<Item = FireOutcome>) -> Self {
        Self { outcomes: Mutex::new(outcomes.into_iter().collect()), fired: Mutex::default() }
    }

    pub fn fired(&self) -> Vec<(EntityKey, AlarmName)> {
        self.fired.lock().clone()
    }

    pub fn fire_count(&self) -> usize {
        self.fired.lock().len()
    }
}

#[async_trait]
impl AlarmRouter for ScriptedRouter {
    async fn fire(&self, key: &EntityKey, name: &AlarmName) -> FireOutcome {
        self.fired.lock().push((key.clone(), name.clone()));
        self.outcomes.lock().pop_front().unwrap_or(FireOutcome::Completed)
    }
}

#[derive(Debug, Clone)]
struct PendingJob {
    queue: String,
    job: AlarmJob,
    run_at: DateTime<Utc>,
    state: JobState,
}

/// A job table with just enough behavior to exercise the delegate backend:
/// enqueue with delay, pending-state filtering, and manual draining.
#[derive(Default)]
pub struct InMemoryJobSystem {
    jobs: Mutex<Vec<PendingJob>>,
}

impl InMemoryJobSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs due at `now`, removed from the table. The caller runs them
    /// through a worker and may re-add retries via [`requeue`].
    ///
    /// [`requeue`]: InMemoryJobSystem::requeue
    pub fn take_due(&self, now: DateTime<Utc>) -> Vec<AlarmJob> {
        let mut jobs = self.jobs.lock();
        let (due, rest): (Vec<_>, Vec<_>) =
            jobs.drain(..).partition(|j| j.run_at <= now && PENDING_STATES.contains(&j.state));
        *jobs = rest;
        due.into_iter().map(|j| j.job).collect()
    }

    /// Put a failed job back as retryable, due immediately.
    pub fn requeue(&self, queue: &str, job: AlarmJob, now: DateTime<Utc>) {
        self.jobs.lock().push(PendingJob {
            queue: queue.to_string(),
            job,
            run_at: now,
            state: JobState::Retryable,
        });
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }
}

#[async_trait]
impl JobSystem for InMemoryJobSystem {
    async fn enqueue(
        &self,
        queue: &str,
        job: AlarmJob,
        delay: Duration,
    ) -> Result<(), JobSystemError> {
        let run_at = Utc::now() + ChronoDuration::milliseconds(delay.as_millis() as i64);
        self.jobs.lock().push(PendingJob {
            queue: queue.to_string(),
            job,
            run_at,
            state: JobState::Scheduled,
        });
        Ok(())
    }

    async fn cancel_matching(
        &self,
        queue: &str,
        key: &EntityKey,
        name: Option<&AlarmName>,
    ) -> Result<u64, JobSystemError> {
        let mut jobs = self.jobs.lock();
        let before = jobs.len();
        jobs.retain(|j| {
            let matches = j.queue == queue
                && j.job.key == *key
                && name.map_or(true, |n| j.job.name == *n)
                && PENDING_STATES.contains(&j.state);
            !matches
        });
        Ok((before - jobs.len()) as u64)
    }

    async fn pending(
        &self,
        queue: &str,
        key: &EntityKey,
    ) -> Result<Vec<(AlarmName, DateTime<Utc>)>, JobSystemError> {
        let jobs = self.jobs.lock();
        let mut pending: Vec<_> = jobs
            .iter()
            .filter(|j| j.queue == queue && j.job.key == *key && PENDING_STATES.contains(&j.state))
            .map(|j| (j.job.name.clone(), j.run_at))
            .collect();
        pending.sort_by_key(|(_, at)| *at);
        Ok(pending)
    }
}
