// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Entity definitions and the process-wide catalog.
//!
//! Applications describe each entity type once: declared fields with
//! defaults, a handler table, and the optional alarm and post-load hooks.
//! Activation resolves the target type through the [`Catalog`] and dispatches
//! handlers by table lookup.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::key::{AlarmName, EntityType};
use crate::state::{KeyPolicy, StateDoc, ID_FIELD};

/// A handler-requested alarm: fire `name` after `delay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmReq {
    pub name: AlarmName,
    pub delay: Duration,
}

impl AlarmReq {
    pub fn new(name: impl Into<AlarmName>, delay: Duration) -> Self {
        Self { name: name.into(), delay }
    }
}

/// What a handler returns.
///
/// `update` replaces the entity state (persisted before the reply), `alarm`
/// schedules a named alarm after the state change commits.
#[derive(Debug, Clone)]
pub enum Return {
    Reply { result: Value, update: Option<StateDoc>, alarm: Option<AlarmReq> },
    NoReply { update: StateDoc, alarm: Option<AlarmReq> },
    Fail { cause: Value },
}

impl Return {
    pub fn reply(result: impl Into<Value>) -> Self {
        Return::Reply { result: result.into(), update: None, alarm: None }
    }

    pub fn reply_update(result: impl Into<Value>, update: StateDoc) -> Self {
        Return::Reply { result: result.into(), update: Some(update), alarm: None }
    }

    pub fn noreply(update: StateDoc) -> Self {
        Return::NoReply { update, alarm: None }
    }

    pub fn fail(cause: impl Into<Value>) -> Self {
        Return::Fail { cause: cause.into() }
    }

    /// Attach an alarm directive. No effect on `Fail`.
    pub fn with_alarm(mut self, name: impl Into<AlarmName>, delay: Duration) -> Self {
        let req = AlarmReq::new(name, delay);
        match &mut self {
            Return::Reply { alarm, .. } | Return::NoReply { alarm, .. } => *alarm = Some(req),
            Return::Fail { .. } => {}
        }
        self
    }
}

/// What an alarm entry returns. Alarms never produce a caller-visible
/// result, so the reply shape is restricted by construction.
#[derive(Debug, Clone)]
pub enum AlarmReturn {
    NoReply { update: StateDoc, alarm: Option<AlarmReq> },
    Fail { cause: Value },
}

impl AlarmReturn {
    pub fn noreply(update: StateDoc) -> Self {
        AlarmReturn::NoReply { update, alarm: None }
    }

    pub fn fail(cause: impl Into<Value>) -> Self {
        AlarmReturn::Fail { cause: cause.into() }
    }

    pub fn with_alarm(mut self, name: impl Into<AlarmName>, delay: Duration) -> Self {
        let req = AlarmReq::new(name, delay);
        if let AlarmReturn::NoReply { alarm, .. } = &mut self {
            *alarm = Some(req);
        }
        self
    }
}

/// Result of the optional post-load hook: possibly-rewritten state plus an
/// optional alarm to schedule before the instance starts accepting work.
#[derive(Debug, Clone)]
pub struct AfterLoad {
    pub state: StateDoc,
    pub alarm: Option<AlarmReq>,
}

impl AfterLoad {
    pub fn state(state: StateDoc) -> Self {
        Self { state, alarm: None }
    }

    pub fn with_alarm(mut self, name: impl Into<AlarmName>, delay: Duration) -> Self {
        self.alarm = Some(AlarmReq::new(name, delay));
        self
    }
}

type HandlerFn = Arc<dyn Fn(&[Value], &StateDoc) -> Return + Send + Sync>;
type AlarmFn = Arc<dyn Fn(&AlarmName, &StateDoc) -> AlarmReturn + Send + Sync>;
type AfterLoadFn = Arc<dyn Fn(StateDoc) -> AfterLoad + Send + Sync>;

/// One entry in an entity's handler table.
#[derive(Clone)]
pub struct HandlerDef {
    arity: usize,
    func: HandlerFn,
}

impl HandlerDef {
    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn call(&self, args: &[Value], state: &StateDoc) -> Return {
        (self.func.as_ref())(args, state)
    }
}

impl std::fmt::Debug for HandlerDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerDef").field("arity", &self.arity).finish_non_exhaustive()
    }
}

/// Per-entity-type option overrides. Unset values fall through to the
/// runtime-wide configuration.
#[derive(Debug, Clone, Default)]
pub struct EntityOptions {
    pub hibernate_after: Option<Duration>,
    pub shutdown_after: Option<Duration>,
    pub key_policy: Option<KeyPolicy>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DefError {
    #[error("field name '{ID_FIELD}' is reserved for the injected entity id")]
    ReservedField,
    #[error("duplicate field: {0}")]
    DuplicateField(String),
    #[error("duplicate handler: {0}")]
    DuplicateHandler(String),
    #[error("entity type already registered: {0}")]
    DuplicateType(String),
}

/// The registered description of one entity type.
#[derive(Clone)]
pub struct EntityDef {
    kind: EntityType,
    defaults: StateDoc,
    handlers: HashMap<String, HandlerDef>,
    on_alarm: Option<AlarmFn>,
    after_load: Option<AfterLoadFn>,
    options: EntityOptions,
}

impl EntityDef {
    pub fn builder(kind: impl Into<EntityType>) -> EntityDefBuilder {
        EntityDefBuilder {
            kind: kind.into(),
            defaults: StateDoc::new(),
            handlers: HashMap::new(),
            on_alarm: None,
            after_load: None,
            options: EntityOptions::default(),
            error: None,
        }
    }

    pub fn kind(&self) -> &EntityType {
        &self.kind
    }

    pub fn defaults(&self) -> &StateDoc {
        &self.defaults
    }

    pub fn handler(&self, name: &str) -> Option<&HandlerDef> {
        self.handlers.get(name)
    }

    pub fn on_alarm(&self) -> Option<&AlarmFn> {
        self.on_alarm.as_ref()
    }

    pub fn after_load(&self) -> Option<&AfterLoadFn> {
        self.after_load.as_ref()
    }

    pub fn options(&self) -> &EntityOptions {
        &self.options
    }
}

impl std::fmt::Debug for EntityDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityDef")
            .field("kind", &self.kind)
            .field("defaults", &self.defaults)
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .field("on_alarm", &self.on_alarm.is_some())
            .field("after_load", &self.after_load.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder with definition-time validation. The first violation is kept and
/// reported by `build`, so declaration sites can chain freely.
pub struct EntityDefBuilder {
    kind: EntityType,
    defaults: StateDoc,
    handlers: HashMap<String, HandlerDef>,
    on_alarm: Option<AlarmFn>,
    after_load: Option<AfterLoadFn>,
    options: EntityOptions,
    error: Option<DefError>,
}

impl EntityDefBuilder {
    /// Declare a field with its default value.
    pub fn field(mut self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        let name = name.into();
        if name == ID_FIELD {
            self.error.get_or_insert(DefError::ReservedField);
            return self;
        }
        if self.defaults.contains(&name) {
            self.error.get_or_insert(DefError::DuplicateField(name));
            return self;
        }
        self.defaults.set(name, default.into());
        self
    }

    /// Declare a handler with its argument count.
    pub fn handler(
        mut self,
        name: impl Into<String>,
        arity: usize,
        func: impl Fn(&[Value], &StateDoc) -> Return + Send + Sync + 'static,
    ) -> Self {
        let name = name.into();
        if self.handlers.contains_key(&name) {
            self.error.get_or_insert(DefError::DuplicateHandler(name));
            return self;
        }
        self.handlers.insert(name, HandlerDef { arity, func: Arc::new(func) });
        self
    }

    pub fn on_alarm(
        mut self,
        func: impl Fn(&AlarmName, &StateDoc) -> AlarmReturn + Send + Sync + 'static,
    ) -> Self {
        self.on_alarm = Some(Arc::new(func));
        self
    }

    pub fn after_load(
        mut self,
        func: impl Fn(StateDoc) -> AfterLoad + Send + Sync + 'static,
    ) -> Self {
        self.after_load = Some(Arc::new(func));
        self
    }

    pub fn hibernate_after(mut self, d: Duration) -> Self {
        self.options.hibernate_after = Some(d);
        self
    }

    pub fn shutdown_after(mut self, d: Duration) -> Self {
        self.options.shutdown_after = Some(d);
        self
    }

    pub fn key_policy(mut self, policy: KeyPolicy) -> Self {
        self.options.key_policy = Some(policy);
        self
    }

    pub fn build(self) -> Result<EntityDef, DefError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        Ok(EntityDef {
            kind: self.kind,
            defaults: self.defaults,
            handlers: self.handlers,
            on_alarm: self.on_alarm,
            after_load: self.after_load,
            options: self.options,
        })
    }
}

/// Catalog of registered entity types, consulted at activation.
#[derive(Debug, Default)]
pub struct Catalog {
    types: HashMap<String, Arc<EntityDef>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, def: EntityDef) -> Result<(), DefError> {
        let name = def.kind().as_str().to_string();
        if self.types.contains_key(&name) {
            return Err(DefError::DuplicateType(name));
        }
        self.types.insert(name, Arc::new(def));
        Ok(())
    }

    pub fn get(&self, kind: &EntityType) -> Option<Arc<EntityDef>> {
        self.types.get(kind.as_str()).cloned()
    }

    pub fn contains(&self, kind: &EntityType) -> bool {
        self.types.contains_key(kind.as_str())
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }
}

#[cfg(test)]
#[path = "catalog_tests.rs"]
mod tests;
