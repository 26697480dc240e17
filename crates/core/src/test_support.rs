// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Entity definitions shared by tests across the workspace.

#![allow(clippy::unwrap_used)]

use serde_json::Value;
use std::time::Duration;

use crate::catalog::{AlarmReturn, Catalog, EntityDef, Return};

/// `counter` entity: `count: int = 0`, handlers `increment(n)` and `get()`.
pub fn counter_def() -> EntityDef {
    EntityDef::builder("counter")
        .field("count", 0)
        .handler("increment", 1, |args, state| {
            let n = args.first().and_then(Value::as_i64).unwrap_or(0);
            let next = state.integer("count").unwrap_or(0) + n;
            Return::reply_update(next, state.clone().with("count", next))
        })
        .handler("get", 0, |_, state| Return::reply(state.integer("count").unwrap_or(0)))
        .build()
        .unwrap()
}

/// `ticker` entity: `ticks: int = 0`, whose alarm handler increments and
/// reschedules itself under the same name.
pub fn ticker_def(period: Duration) -> EntityDef {
    EntityDef::builder("ticker")
        .field("ticks", 0)
        .handler("get", 0, |_, state| Return::reply(state.integer("ticks").unwrap_or(0)))
        .on_alarm(move |name, state| {
            let ticks = state.integer("ticks").unwrap_or(0) + 1;
            AlarmReturn::noreply(state.clone().with("ticks", ticks))
                .with_alarm(name.clone(), period)
        })
        .build()
        .unwrap()
}

/// Catalog with both test entities registered.
pub fn test_catalog() -> Catalog {
    let mut catalog = Catalog::new();
    catalog.register(counter_def()).unwrap();
    catalog.register(ticker_def(Duration::from_millis(50))).unwrap();
    catalog
}
