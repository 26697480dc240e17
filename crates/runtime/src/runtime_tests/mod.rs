// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime behavior tests: invocation semantics, transactional persistence,
//! alarm delivery, and instance lifecycle.

use super::*;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use stead_core::catalog::{EntityDef, Return};
use stead_core::observe::{paths, Phase};
use stead_core::test_support::test_catalog;
use stead_core::{Catalog, KeyPolicy};
use stead_store::test_support::{memory_db, FlakyStore};
use stead_store::Loaded;

mod alarms;
mod invoke;
mod lifecycle;
mod persistence;

/// Route runtime tracing through the test harness when RUST_LOG is set.
#[allow(dead_code)]
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Options tuned for tests: fast polling, short claim TTL.
fn fast_options() -> RuntimeOptions {
    RuntimeOptions::new()
        .polling_interval(Duration::from_millis(20))
        .claim_ttl(Duration::from_secs(2))
}

async fn counter_runtime() -> Runtime {
    let db = memory_db().await;
    RuntimeBuilder::new(test_catalog()).db(db).options(fast_options()).start().await.unwrap()
}

/// Count stop-phase span events on a path.
fn span_counter(telemetry: &Telemetry, path: &'static [&'static str]) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let sink = count.clone();
    telemetry.attach(path, move |event| {
        if event.phase == Phase::Stop {
            sink.fetch_add(1, Ordering::SeqCst);
        }
    });
    count
}
