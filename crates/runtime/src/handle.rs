// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cheap, cloneable reference to a live instance's mailbox.

use serde_json::Value;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use stead_core::{AlarmName, CallError, CallReply, EntityKey};

/// Why an instance is being asked to stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Explicit deactivation request, with the caller's reason.
    Requested(String),
    /// Inactivity timer expired.
    Inactive,
    /// Runtime shutdown.
    Shutdown,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::Requested(reason) => write!(f, "requested: {reason}"),
            StopReason::Inactive => f.write_str("inactive"),
            StopReason::Shutdown => f.write_str("shutdown"),
        }
    }
}

pub(crate) enum InstanceMsg {
    Invoke {
        handler: String,
        args: Vec<Value>,
        reply: oneshot::Sender<Result<CallReply, CallError>>,
    },
    Fire {
        name: AlarmName,
        reply: oneshot::Sender<Result<CallReply, CallError>>,
    },
    Stop {
        reason: StopReason,
    },
}

/// The instance's mailbox closed before a reply: it terminated. The caller
/// may re-activate and retry.
pub(crate) struct HandleClosed;

/// Handle to one live instance. Cloning shares the mailbox.
#[derive(Clone)]
pub struct InstanceHandle {
    key: EntityKey,
    epoch: Uuid,
    tx: mpsc::Sender<InstanceMsg>,
}

impl InstanceHandle {
    pub(crate) fn new(key: EntityKey, epoch: Uuid, tx: mpsc::Sender<InstanceMsg>) -> Self {
        Self { key, epoch, tx }
    }

    pub fn key(&self) -> &EntityKey {
        &self.key
    }

    /// Distinguishes successive incarnations of the same entity, so a stale
    /// handle cannot evict its successor from the registry.
    pub fn epoch(&self) -> Uuid {
        self.epoch
    }

    pub fn is_alive(&self) -> bool {
        !self.tx.is_closed()
    }

    pub(crate) async fn invoke(
        &self,
        handler: &str,
        args: Vec<Value>,
        deadline: Duration,
    ) -> Result<Result<CallReply, CallError>, HandleClosed> {
        let (reply, rx) = oneshot::channel();
        let msg = InstanceMsg::Invoke { handler: handler.to_string(), args, reply };
        self.call(msg, rx, deadline).await
    }

    pub(crate) async fn fire(
        &self,
        name: &AlarmName,
        deadline: Duration,
    ) -> Result<Result<CallReply, CallError>, HandleClosed> {
        let (reply, rx) = oneshot::channel();
        let msg = InstanceMsg::Fire { name: name.clone(), reply };
        self.call(msg, rx, deadline).await
    }

    async fn call(
        &self,
        msg: InstanceMsg,
        rx: oneshot::Receiver<Result<CallReply, CallError>>,
        deadline: Duration,
    ) -> Result<Result<CallReply, CallError>, HandleClosed> {
        let exchange = async {
            if self.tx.send(msg).await.is_err() {
                return Err(HandleClosed);
            }
            rx.await.map_err(|_| HandleClosed)
        };
        match tokio::time::timeout(deadline, exchange).await {
            // The deadline bounds the caller's wait, not the instance: the
            // handler may still complete and persist after this returns.
            Err(_) => Ok(Err(CallError::Timeout(deadline))),
            Ok(Err(HandleClosed)) => Err(HandleClosed),
            Ok(Ok(result)) => Ok(result),
        }
    }

    /// Ask the instance to stop once queued work drains. Best-effort.
    pub(crate) async fn stop(&self, reason: StopReason) {
        let _ = self.tx.send(InstanceMsg::Stop { reason }).await;
    }
}

impl std::fmt::Debug for InstanceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceHandle")
            .field("key", &self.key)
            .field("epoch", &self.epoch)
            .field("alive", &self.is_alive())
            .finish()
    }
}
