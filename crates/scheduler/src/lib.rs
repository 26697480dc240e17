// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! stead-scheduler: durable alarm scheduling and delivery
//!
//! Two backends share one contract: the poll backend owns the alarm table
//! and drives claim-based delivery; the external-job backend delegates
//! durability and retry to a job-processing system.

mod contract;
mod external;
mod poll;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use contract::{
    AlarmEntry, AlarmRouter, FireOutcome, NullScheduler, ScheduleError, Scheduler,
};
pub use external::{AlarmJob, ExternalJobScheduler, JobState, JobSystem, JobSystemError, JobVerdict, JobWorker, PENDING_STATES};
pub use poll::{PollScheduler, Poller, PollerConfig, PollStats};
