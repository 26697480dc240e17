// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The loading phase of an instance's lifetime.

use stead_core::catalog::AfterLoad;
use stead_core::state::apply_key_policy;
use stead_core::{CallError, Clock, StateDoc};
use stead_store::Loaded;

use super::InstanceSeed;

/// Produce the instance's initial state.
///
/// Merges the stored record onto declared defaults (dropping unknown keys),
/// seeds the default record on first sight, applies the key policy, injects
/// the read-only id field, and runs the post-load hook with its state change
/// persisted before the instance accepts work.
pub(super) async fn initialize<C: Clock>(seed: &InstanceSeed<C>) -> Result<StateDoc, CallError> {
    let defaults = seed.def.defaults().clone();
    let prefix = seed.config.prefix.as_deref();

    let mut state = match &seed.store {
        None => defaults,
        Some(store) => match store.load(&seed.key, prefix).await {
            Err(e) => return Err(CallError::Load(e.to_string())),
            Ok(Loaded::Found(record)) => {
                let doc = StateDoc::merge_defaults(&defaults, &record.state);
                apply_key_policy(&doc, seed.config.key_policy, &seed.symbols)
                    .map_err(|e| CallError::Load(e.to_string()))?;
                doc
            }
            Ok(Loaded::Missing) => {
                store
                    .save(&seed.key, &defaults.to_value(), prefix, seed.clock.utc_now())
                    .await
                    .map_err(|e| CallError::Persistence(e.to_string()))?;
                defaults
            }
        },
    };
    state.inject_id(&seed.key.id);

    if let Some(hook) = seed.def.after_load() {
        let AfterLoad { state: mut next, alarm } = (hook.as_ref())(state.clone());
        next.inject_id(&seed.key.id);
        if next != state {
            if let Some(store) = &seed.store {
                store
                    .save(&seed.key, &next.strip_id().to_value(), prefix, seed.clock.utc_now())
                    .await
                    .map_err(|e| CallError::Persistence(e.to_string()))?;
            }
            state = next;
        }
        if let Some(req) = alarm {
            if let Err(e) = seed.scheduler.schedule(&seed.key, &req.name, req.delay).await {
                tracing::warn!(
                    entity = %seed.key,
                    alarm = %req.name,
                    error = %e,
                    "post-load alarm directive failed"
                );
            }
        }
    }

    Ok(state)
}
