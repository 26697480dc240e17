// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON state documents and key-conversion policies.
//!
//! Entity state is a string-keyed document of declared fields. Loading merges
//! the stored document onto the declared defaults: declared fields missing
//! from the document adopt their default, unknown top-level keys are silently
//! dropped. The reserved `id` field is injected after load and stripped
//! before save.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

use crate::key::EntityId;

/// Reserved handler-visible field carrying the entity id. Never persisted.
pub const ID_FIELD: &str = "id";

/// A string-keyed document of entity fields.
///
/// Structural equality (`==`) is what decides the no-op persistence skip, so
/// field order is normalized by the underlying ordered map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateDoc {
    fields: BTreeMap<String, Value>,
}

impl StateDoc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, used for declaring defaults.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Convenience accessor for integer fields.
    pub fn integer(&self, name: &str) -> Option<i64> {
        self.fields.get(name).and_then(Value::as_i64)
    }

    /// Convenience accessor for string fields.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// The serialized (persisted) form: a JSON object of the fields.
    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    /// Merge a stored document onto declared defaults.
    ///
    /// The result contains exactly the declared fields: stored values win,
    /// missing fields adopt their default, undeclared keys are dropped.
    pub fn merge_defaults(defaults: &StateDoc, stored: &Map<String, Value>) -> StateDoc {
        let fields = defaults
            .fields
            .iter()
            .map(|(name, default)| {
                let value = stored.get(name).cloned().unwrap_or_else(|| default.clone());
                (name.clone(), value)
            })
            .collect();
        StateDoc { fields }
    }

    /// Inject the read-only handler-visible id field.
    pub fn inject_id(&mut self, id: &EntityId) {
        self.fields.insert(ID_FIELD.to_string(), Value::String(id.as_str().to_string()));
    }

    /// The document without the injected id field, for persistence.
    pub fn strip_id(&self) -> StateDoc {
        let mut doc = self.clone();
        doc.fields.remove(ID_FIELD);
        doc
    }
}

impl FromIterator<(String, Value)> for StateDoc {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self { fields: iter.into_iter().collect() }
    }
}

/// How string keys nested inside field values are treated on load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyPolicy {
    /// Nested keys remain plain strings.
    #[default]
    Strings,
    /// Nested keys must already be interned; loading fails otherwise.
    ExistingSymbols,
    /// Nested keys are interned, creating entries as needed.
    CreateSymbols,
}

crate::simple_display! {
    KeyPolicy {
        Strings => "strings",
        ExistingSymbols => "existing-symbols",
        CreateSymbols => "create-symbols",
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyPolicyError {
    #[error("no symbolic identifier registered for key: {0}")]
    UnknownSymbol(String),
}

/// Process-wide registry of symbolic identifiers.
///
/// The runtime owns one table; entity definitions register the nested keys
/// they use at definition time, and the `existing-symbols` policy checks
/// loaded documents against it.
#[derive(Debug, Default)]
pub struct SymbolTable {
    names: RwLock<HashSet<String>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: &str) {
        self.names.write().insert(name.to_string());
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.names.read().contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.read().is_empty()
    }
}

/// Apply a key policy to every object key nested inside the document's
/// field values. Top-level field names are declared and therefore exempt.
pub fn apply_key_policy(
    doc: &StateDoc,
    policy: KeyPolicy,
    symbols: &SymbolTable,
) -> Result<(), KeyPolicyError> {
    if policy == KeyPolicy::Strings {
        return Ok(());
    }
    for value in doc.fields.values() {
        visit_keys(value, policy, symbols)?;
    }
    Ok(())
}

fn visit_keys(
    value: &Value,
    policy: KeyPolicy,
    symbols: &SymbolTable,
) -> Result<(), KeyPolicyError> {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                match policy {
                    KeyPolicy::Strings => {}
                    KeyPolicy::ExistingSymbols => {
                        if !symbols.is_registered(key) {
                            return Err(KeyPolicyError::UnknownSymbol(key.clone()));
                        }
                    }
                    KeyPolicy::CreateSymbols => symbols.register(key),
                }
                visit_keys(nested, policy, symbols)?;
            }
            Ok(())
        }
        Value::Array(items) => {
            for item in items {
                visit_keys(item, policy, symbols)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
