// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

fn stored(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

#[test]
fn merge_keeps_stored_values_for_declared_fields() {
    let defaults = StateDoc::new().with("count", 0).with("label", "fresh");
    let doc = StateDoc::merge_defaults(&defaults, &stored(json!({"count": 7})));

    assert_eq!(doc.integer("count"), Some(7));
    assert_eq!(doc.text("label"), Some("fresh"));
}

#[test]
fn merge_drops_unknown_top_level_keys() {
    let defaults = StateDoc::new().with("count", 0);
    let doc = StateDoc::merge_defaults(&defaults, &stored(json!({"count": 3, "legacy_field": 7})));

    assert_eq!(doc.len(), 1);
    assert!(!doc.contains("legacy_field"));
}

#[test]
fn merge_adopts_defaults_for_missing_fields() {
    let defaults = StateDoc::new().with("count", 0).with("ticks", 0);
    let doc = StateDoc::merge_defaults(&defaults, &stored(json!({"count": 3})));

    assert_eq!(doc.integer("ticks"), Some(0));
}

#[test]
fn inject_and_strip_id_round_trip() {
    let mut doc = StateDoc::new().with("count", 1);
    doc.inject_id(&EntityId::new("visits"));

    assert_eq!(doc.text(ID_FIELD), Some("visits"));
    let persisted = doc.strip_id();
    assert!(!persisted.contains(ID_FIELD));
    assert_eq!(persisted.integer("count"), Some(1));
}

#[test]
fn structural_equality_ignores_insertion_order() {
    let a = StateDoc::new().with("a", 1).with("b", 2);
    let b = StateDoc::new().with("b", 2).with("a", 1);
    assert_eq!(a, b);
}

#[test]
fn strings_policy_accepts_any_nested_keys() {
    let symbols = SymbolTable::new();
    let doc = StateDoc::new().with("meta", json!({"anything": {"goes": 1}}));
    assert!(apply_key_policy(&doc, KeyPolicy::Strings, &symbols).is_ok());
    assert!(symbols.is_empty());
}

#[test]
fn existing_symbols_rejects_unregistered_nested_key() {
    let symbols = SymbolTable::new();
    symbols.register("known");
    let doc = StateDoc::new().with("meta", json!({"known": 1, "mystery": 2}));

    let err = apply_key_policy(&doc, KeyPolicy::ExistingSymbols, &symbols).unwrap_err();
    assert_eq!(err, KeyPolicyError::UnknownSymbol("mystery".into()));
}

#[test]
fn existing_symbols_checks_keys_inside_arrays() {
    let symbols = SymbolTable::new();
    let doc = StateDoc::new().with("entries", json!([{"unseen": true}]));
    assert!(apply_key_policy(&doc, KeyPolicy::ExistingSymbols, &symbols).is_err());
}

#[test]
fn create_symbols_interns_new_keys() {
    let symbols = SymbolTable::new();
    let doc = StateDoc::new().with("meta", json!({"fresh": {"nested": 1}}));

    apply_key_policy(&doc, KeyPolicy::CreateSymbols, &symbols).unwrap();
    assert!(symbols.is_registered("fresh"));
    assert!(symbols.is_registered("nested"));
}

#[test]
fn top_level_field_names_are_exempt_from_policy() {
    let symbols = SymbolTable::new();
    let doc = StateDoc::new().with("count", 1);
    assert!(apply_key_policy(&doc, KeyPolicy::ExistingSymbols, &symbols).is_ok());
}

#[test]
fn key_policy_serializes_kebab_case() {
    assert_eq!(serde_json::to_string(&KeyPolicy::ExistingSymbols).unwrap(), "\"existing-symbols\"");
    assert_eq!(KeyPolicy::CreateSymbols.to_string(), "create-symbols");
}
