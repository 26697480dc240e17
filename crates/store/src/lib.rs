// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! stead-store: relational persistence for entity and alarm records
//!
//! Entity state lives in the `objects` table, alarms in the `alarms` table,
//! both scoped by an optional opaque prefix. The claim update on alarms is
//! the one strictly-atomic mutation in the system.

mod alarms;
mod db;
mod migrations;
mod objects;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use alarms::{AlarmRecord, AlarmStore};
pub use db::{Db, StoreError};
pub use migrations::{current_version, migrate, migrate_to_latest, MigrationError, LATEST_VERSION};
pub use objects::{Loaded, ObjectRecord, ObjectStore, SqlObjectStore};
