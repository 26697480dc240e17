// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Poll backend: the alarm table plus a claim-based poller.
//!
//! Once per interval the poller scans for due rows (unclaimed, or claimed
//! longer ago than the TTL), claims each with an atomic conditional update,
//! fires it against the entity, and retires the row with a conditional
//! delete that only matches its own claim. A handler that reschedules the
//! same name upserts the row, clearing the claim, so the conditional delete
//! misses and the new schedule survives. A worker that dies between claim
//! and retire leaves the row claimed until the TTL elapses; re-firing after
//! that is the sole source of duplicate delivery.

use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use stead_core::{AlarmName, Clock, EntityKey};
use stead_store::AlarmStore;

use crate::contract::{AlarmEntry, AlarmRouter, FireOutcome, ScheduleError, Scheduler};

/// Scheduler contract over the alarm table.
#[derive(Clone)]
pub struct PollScheduler<C: Clock> {
    alarms: AlarmStore,
    clock: C,
}

impl<C: Clock> PollScheduler<C> {
    pub fn new(alarms: AlarmStore, clock: C) -> Self {
        Self { alarms, clock }
    }
}

#[async_trait]
impl<C: Clock + 'static> Scheduler for PollScheduler<C> {
    async fn schedule(
        &self,
        key: &EntityKey,
        name: &AlarmName,
        delay: Duration,
    ) -> Result<(), ScheduleError> {
        let now = self.clock.utc_now();
        let due = now + ChronoDuration::milliseconds(delay.as_millis() as i64);
        self.alarms.upsert(key, name, due, now).await?;
        Ok(())
    }

    async fn cancel(&self, key: &EntityKey, name: &AlarmName) -> Result<(), ScheduleError> {
        self.alarms.remove(key, name).await?;
        Ok(())
    }

    async fn cancel_all(&self, key: &EntityKey) -> Result<(), ScheduleError> {
        self.alarms.remove_all(key).await?;
        Ok(())
    }

    async fn list(&self, key: &EntityKey) -> Result<Vec<AlarmEntry>, ScheduleError> {
        let rows = self.alarms.list(key).await?;
        Ok(rows
            .into_iter()
            .map(|r| AlarmEntry { name: r.name, scheduled_at: r.scheduled_at })
            .collect())
    }
}

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub interval: Duration,
    pub claim_ttl: Duration,
    /// Upper bound on rows handled per pass.
    pub batch_limit: i64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self { interval: Duration::from_secs(30), claim_ttl: Duration::from_secs(60), batch_limit: 100 }
    }
}

/// Counters from one poll pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PollStats {
    pub scanned: usize,
    pub claimed: usize,
    /// Claim lost to a concurrent poller.
    pub contested: usize,
    pub completed: usize,
    /// Fired and retired, but the handler had already rescheduled the name.
    pub rescheduled: usize,
    pub failed: usize,
    pub orphaned: usize,
}

/// The claim-based alarm poller.
pub struct Poller<C: Clock> {
    alarms: AlarmStore,
    router: Arc<dyn AlarmRouter>,
    clock: C,
    config: PollerConfig,
}

impl<C: Clock + 'static> Poller<C> {
    pub fn new(
        alarms: AlarmStore,
        router: Arc<dyn AlarmRouter>,
        clock: C,
        config: PollerConfig,
    ) -> Self {
        Self { alarms, router, clock, config }
    }

    /// One scan-claim-fire-retire pass.
    pub async fn tick(&self) -> PollStats {
        let mut stats = PollStats::default();
        let now = self.clock.utc_now();
        let ttl = ChronoDuration::milliseconds(self.config.claim_ttl.as_millis() as i64);
        let stale_before = now - ttl;

        let rows = match self.alarms.due(now, stale_before, self.config.batch_limit).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!(error = %e, "alarm scan failed");
                return stats;
            }
        };
        stats.scanned = rows.len();

        for row in rows {
            let claim_ts = self.clock.utc_now();
            match self.alarms.claim(&row.key, &row.name, claim_ts, stale_before).await {
                Ok(true) => stats.claimed += 1,
                Ok(false) => {
                    stats.contested += 1;
                    continue;
                }
                Err(e) => {
                    tracing::error!(entity = %row.key, alarm = %row.name, error = %e, "claim failed");
                    stats.failed += 1;
                    continue;
                }
            }

            match self.router.fire(&row.key, &row.name).await {
                FireOutcome::Completed => {
                    match self.alarms.retire(&row.key, &row.name, claim_ts).await {
                        Ok(1) => stats.completed += 1,
                        Ok(_) => stats.rescheduled += 1,
                        Err(e) => {
                            tracing::warn!(entity = %row.key, alarm = %row.name, error = %e, "retire failed");
                            stats.failed += 1;
                        }
                    }
                }
                FireOutcome::PersistenceFailed(cause) => {
                    // Row stays claimed; eligible again once the TTL elapses.
                    tracing::debug!(entity = %row.key, alarm = %row.name, %cause, "alarm target could not persist");
                    stats.failed += 1;
                }
                FireOutcome::Failed(cause) => {
                    tracing::warn!(entity = %row.key, alarm = %row.name, %cause, "alarm delivery failed");
                    stats.failed += 1;
                }
                FireOutcome::UnknownTarget => {
                    if let Err(e) = self.alarms.remove(&row.key, &row.name).await {
                        tracing::warn!(entity = %row.key, alarm = %row.name, error = %e, "orphan removal failed");
                    }
                    stats.orphaned += 1;
                }
            }
        }
        if stats.scanned > 0 {
            tracing::debug!(?stats, "poll pass");
        }
        stats
    }

    /// Run until the token is cancelled.
    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        self.tick().await;
                    }
                }
            }
            tracing::debug!("alarm poller stopped");
        })
    }
}

#[cfg(test)]
#[path = "poll_tests.rs"]
mod tests;
