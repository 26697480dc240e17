// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Span events around store and handler operations.
//!
//! Every operation emits `start`, then `stop` or `exception`, on a
//! path-addressed bus ( `["runtime", "store", "save"]`,
//! `["runtime", "instance", "handle"]`, … ). Consumers attach handlers keyed
//! on a path prefix; emissions are mirrored to `tracing`.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Span phase within one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Start,
    Stop,
    Exception,
}

crate::simple_display! {
    Phase {
        Start => "start",
        Stop => "stop",
        Exception => "exception",
    }
}

/// Measurements carried by a span event.
///
/// `start` carries the system time; `stop` the duration; `exception` the
/// duration plus failure kind and cause.
#[derive(Debug, Clone, Default)]
pub struct Measurements {
    pub system_time_ms: Option<u64>,
    pub duration: Option<Duration>,
    pub kind: Option<&'static str>,
    pub cause: Option<String>,
}

/// Event metadata identifying the operation target.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub store: Option<&'static str>,
}

impl Metadata {
    pub fn entity(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self { entity_type: Some(entity_type.into()), entity_id: Some(entity_id.into()), store: None }
    }

    pub fn store(mut self, name: &'static str) -> Self {
        self.store = Some(name);
        self
    }
}

#[derive(Debug, Clone)]
pub struct SpanEvent {
    pub path: &'static [&'static str],
    pub phase: Phase,
    pub measurements: Measurements,
    pub metadata: Metadata,
}

/// Token returned by [`Telemetry::attach`], used to detach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerId(u64);

type SpanHandler = Arc<dyn Fn(&SpanEvent) + Send + Sync>;

struct Attached {
    id: HandlerId,
    prefix: Vec<&'static str>,
    handler: SpanHandler,
}

/// Registry of span-event handlers keyed on event-path prefixes.
#[derive(Default)]
pub struct Telemetry {
    handlers: RwLock<Vec<Attached>>,
    next_id: AtomicU64,
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a handler for every event whose path starts with `prefix`.
    /// An empty prefix matches everything.
    pub fn attach(
        &self,
        prefix: &[&'static str],
        handler: impl Fn(&SpanEvent) + Send + Sync + 'static,
    ) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers.write().push(Attached {
            id,
            prefix: prefix.to_vec(),
            handler: Arc::new(handler),
        });
        id
    }

    pub fn detach(&self, id: HandlerId) {
        self.handlers.write().retain(|a| a.id != id);
    }

    pub fn emit(&self, event: SpanEvent) {
        tracing::trace!(
            path = %event.path.join("."),
            phase = %event.phase,
            entity_type = event.metadata.entity_type.as_deref(),
            entity_id = event.metadata.entity_id.as_deref(),
            "span event"
        );
        let handlers = self.handlers.read();
        for attached in handlers.iter() {
            if event.path.starts_with(&attached.prefix) {
                (attached.handler)(&event);
            }
        }
    }

    /// Run an operation inside a start/stop/exception span.
    ///
    /// `system_time_ms` stamps the start event; the duration is measured
    /// around the future. The result passes through untouched.
    pub async fn observe<T, E, F>(
        &self,
        path: &'static [&'static str],
        metadata: Metadata,
        system_time_ms: u64,
        op: F,
    ) -> Result<T, E>
    where
        E: std::fmt::Display,
        F: std::future::Future<Output = Result<T, E>>,
    {
        self.emit(SpanEvent {
            path,
            phase: Phase::Start,
            measurements: Measurements { system_time_ms: Some(system_time_ms), ..Default::default() },
            metadata: metadata.clone(),
        });
        let started = Instant::now();
        let result = op.await;
        let duration = started.elapsed();
        match &result {
            Ok(_) => self.emit(SpanEvent {
                path,
                phase: Phase::Stop,
                measurements: Measurements { duration: Some(duration), ..Default::default() },
                metadata,
            }),
            Err(e) => self.emit(SpanEvent {
                path,
                phase: Phase::Exception,
                measurements: Measurements {
                    duration: Some(duration),
                    kind: Some("error"),
                    cause: Some(e.to_string()),
                    ..Default::default()
                },
                metadata,
            }),
        }
        result
    }
}

impl std::fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Telemetry").field("handlers", &self.handlers.read().len()).finish()
    }
}

/// Event paths emitted by the runtime.
pub mod paths {
    pub const STORE_LOAD: &[&str] = &["runtime", "store", "load"];
    pub const STORE_SAVE: &[&str] = &["runtime", "store", "save"];
    pub const STORE_DELETE: &[&str] = &["runtime", "store", "delete"];
    pub const INSTANCE_HANDLE: &[&str] = &["runtime", "instance", "handle"];
    pub const INSTANCE_FIRE: &[&str] = &["runtime", "instance", "fire"];
}

#[cfg(test)]
#[path = "observe_tests.rs"]
mod tests;
