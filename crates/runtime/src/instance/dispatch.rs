// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handler dispatch and transactional state mutation.

use serde_json::Value;

use stead_core::catalog::{AlarmReq, AlarmReturn, Return};
use stead_core::observe::{paths, Metadata};
use stead_core::{AlarmName, CallError, CallReply, Clock, StateDoc};

use super::InstanceSeed;

/// Dispatch one invocation through the handler table.
///
/// A name that does not resolve to a callable of the right arity replies
/// `unknown_handler`.
pub(super) async fn invoke<C: Clock>(
    seed: &InstanceSeed<C>,
    state: &mut StateDoc,
    handler: &str,
    args: &[Value],
) -> Result<CallReply, CallError> {
    let Some(def) = seed.def.handler(handler).filter(|h| h.arity() == args.len()) else {
        return Err(CallError::UnknownHandler(handler.to_string()));
    };
    let metadata = Metadata::entity(seed.key.kind.as_str(), seed.key.id.as_str());
    seed.telemetry
        .observe(paths::INSTANCE_HANDLE, metadata, seed.clock.epoch_ms(), async {
            match def.call(args, state) {
                Return::Fail { cause } => Err(CallError::Handler(cause)),
                Return::Reply { result, update, alarm } => {
                    commit(seed, state, update, alarm).await?;
                    Ok(CallReply::Value(result))
                }
                Return::NoReply { update, alarm } => {
                    commit(seed, state, Some(update), alarm).await?;
                    Ok(CallReply::NoReply)
                }
            }
        })
        .await
}

/// The alarm entry point: resolve `on_alarm` and apply the same state and
/// alarm rules. Without an alarm handler the reply is ok/no-handler and
/// state is untouched.
pub(super) async fn fire<C: Clock>(
    seed: &InstanceSeed<C>,
    state: &mut StateDoc,
    name: &AlarmName,
) -> Result<CallReply, CallError> {
    let Some(hook) = seed.def.on_alarm() else {
        return Ok(CallReply::NoHandler);
    };
    let metadata = Metadata::entity(seed.key.kind.as_str(), seed.key.id.as_str());
    seed.telemetry
        .observe(paths::INSTANCE_FIRE, metadata, seed.clock.epoch_ms(), async {
            match (hook.as_ref())(name, state) {
                AlarmReturn::Fail { cause } => Err(CallError::Handler(cause)),
                AlarmReturn::NoReply { update, alarm } => {
                    commit(seed, state, Some(update), alarm).await?;
                    Ok(CallReply::NoReply)
                }
            }
        })
        .await
}

/// Commit a handler's declared effects, in order:
/// 1. A structurally-unchanged state skips persistence entirely.
/// 2. A changed state is saved first; on failure the update is discarded,
///    the caller sees `persistence_failed`, and the alarm directive is
///    dropped with it.
/// 3. The alarm directive commits after the persisted mutation; a schedule
///    failure is logged but does not roll the mutation back.
async fn commit<C: Clock>(
    seed: &InstanceSeed<C>,
    state: &mut StateDoc,
    update: Option<StateDoc>,
    alarm: Option<AlarmReq>,
) -> Result<(), CallError> {
    if let Some(mut next) = update {
        next.inject_id(&seed.key.id);
        if next != *state {
            if let Some(store) = &seed.store {
                store
                    .save(
                        &seed.key,
                        &next.strip_id().to_value(),
                        seed.config.prefix.as_deref(),
                        seed.clock.utc_now(),
                    )
                    .await
                    .map_err(|e| CallError::Persistence(e.to_string()))?;
            }
            *state = next;
        }
    }
    if let Some(req) = alarm {
        if let Err(e) = seed.scheduler.schedule(&seed.key, &req.name, req.delay).await {
            tracing::warn!(
                entity = %seed.key,
                alarm = %req.name,
                error = %e,
                "alarm directive failed"
            );
        }
    }
    Ok(())
}
