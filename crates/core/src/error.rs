// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy for the calling path.
//!
//! Every failure surfaces as a value on the caller's side; instance tasks
//! never take the application down.

use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// The ok side of an invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum CallReply {
    /// Handler produced a result for the caller.
    Value(Value),
    /// Handler completed without a caller-visible result.
    NoReply,
    /// Alarm fired against an entity type with no alarm handler.
    NoHandler,
}

impl CallReply {
    /// The result value, if the handler replied with one.
    pub fn value(&self) -> Option<&Value> {
        match self {
            CallReply::Value(v) => Some(v),
            _ => None,
        }
    }
}

/// The error side of an invocation.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CallError {
    #[error("unknown handler: {0}")]
    UnknownHandler(String),
    /// The handler chose to fail; the cause is returned verbatim.
    #[error("handler failed: {0}")]
    Handler(Value),
    #[error("persistence failed: {0}")]
    Persistence(String),
    #[error("load failed: {0}")]
    Load(String),
    #[error("schedule failed: {0}")]
    Schedule(String),
    #[error("activation failed: {0}")]
    Activation(String),
    #[error("call timed out after {0:?}")]
    Timeout(Duration),
}

impl CallError {
    /// Stable machine-readable kind, for logs and telemetry metadata.
    pub fn kind(&self) -> &'static str {
        match self {
            CallError::UnknownHandler(_) => "unknown_handler",
            CallError::Handler(_) => "handler_failure",
            CallError::Persistence(_) => "persistence_failed",
            CallError::Load(_) => "load_failed",
            CallError::Schedule(_) => "schedule_failed",
            CallError::Activation(_) => "activation_failed",
            CallError::Timeout(_) => "timeout",
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
