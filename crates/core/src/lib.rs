// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! stead-core: core types for the Stead durable entity runtime
//!
//! Identity keys, the clock abstraction, JSON state documents, the entity
//! catalog (definitions, handler tables, return shapes), runtime
//! configuration, the error taxonomy, and the span-event bus.

pub mod macros;

pub mod catalog;
pub mod clock;
pub mod config;
pub mod error;
pub mod key;
pub mod observe;
pub mod state;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use catalog::{
    AfterLoad, AlarmReq, AlarmReturn, Catalog, DefError, EntityDef, EntityDefBuilder,
    EntityOptions, HandlerDef, Return,
};
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{RegistryMode, RuntimeOptions, SchedulerKind};
pub use error::{CallError, CallReply};
pub use key::{AlarmName, EntityId, EntityKey, EntityType};
pub use observe::{HandlerId, Measurements, Metadata, Phase, SpanEvent, Telemetry};
pub use state::{KeyPolicy, KeyPolicyError, StateDoc, SymbolTable, ID_FIELD};
