// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Alarm delivery into the runtime.

use async_trait::async_trait;
use std::sync::Arc;

use stead_core::{AlarmName, CallError, Clock, EntityKey};
use stead_scheduler::{AlarmRouter, FireOutcome};

use crate::activation;
use crate::runtime::RuntimeInner;

/// Routes `__fire__` deliveries through the normal activation path.
pub(crate) struct RuntimeRouter<C: Clock>(pub(crate) Arc<RuntimeInner<C>>);

#[async_trait]
impl<C: Clock + 'static> AlarmRouter for RuntimeRouter<C> {
    async fn fire(&self, key: &EntityKey, name: &AlarmName) -> FireOutcome {
        if !self.0.catalog.contains(&key.kind) {
            return FireOutcome::UnknownTarget;
        }
        let deadline = self.0.options.call_timeout;
        for attempt in 0..2 {
            let handle = match activation::activate(&self.0, key).await {
                Ok(handle) => handle,
                Err(e @ (CallError::Load(_) | CallError::Persistence(_))) => {
                    return FireOutcome::PersistenceFailed(e.to_string())
                }
                Err(e) => return FireOutcome::Failed(e.to_string()),
            };
            match handle.fire(name, deadline).await {
                Ok(Ok(_)) => return FireOutcome::Completed,
                Ok(Err(CallError::Persistence(cause))) => {
                    return FireOutcome::PersistenceFailed(cause)
                }
                Ok(Err(e)) => return FireOutcome::Failed(e.to_string()),
                // The instance stopped between activation and delivery;
                // one re-activation covers the inactivity-shutdown race.
                Err(_closed) if attempt == 0 => continue,
                Err(_closed) => return FireOutcome::Failed("instance stopped".to_string()),
            }
        }
        FireOutcome::Failed("instance unavailable".to_string())
    }
}
