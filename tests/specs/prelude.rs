//! Shared fixtures for the spec suites.

#![allow(dead_code)]

pub use serde_json::{json, Value};
pub use std::time::Duration;

pub use stead_core::test_support::test_catalog;
pub use stead_core::{CallError, CallReply, RuntimeOptions};
pub use stead_runtime::{Runtime, RuntimeBuilder};
pub use stead_store::test_support::open_migrated;
pub use stead_store::Db;

/// Poll fast and retry stranded claims quickly.
pub fn fast_options() -> RuntimeOptions {
    RuntimeOptions::new()
        .polling_interval(Duration::from_millis(20))
        .claim_ttl(Duration::from_millis(500))
}

/// Start a runtime over the given database, tuned for specs.
pub async fn start_runtime(db: Db) -> Runtime {
    RuntimeBuilder::new(test_catalog())
        .db(db)
        .options(fast_options())
        .start()
        .await
        .expect("runtime starts")
}

pub fn reply_i64(reply: &CallReply) -> i64 {
    reply.value().and_then(Value::as_i64).expect("integer reply")
}
