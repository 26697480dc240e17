// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn key_display_round_trips_through_parse() {
    let key = EntityKey::new("counter", "visits");
    let parsed = EntityKey::parse(&key.to_string()).unwrap();
    assert_eq!(parsed, key);
}

#[test]
fn parse_splits_on_first_separator_only() {
    let parsed = EntityKey::parse("doc/2024/q1").unwrap();
    assert_eq!(parsed.kind.as_str(), "doc");
    assert_eq!(parsed.id.as_str(), "2024/q1");
}

#[parameterized(
    empty = { "" },
    no_separator = { "counter" },
    empty_kind = { "/visits" },
    empty_id = { "counter/" },
)]
fn parse_rejects_malformed(input: &str) {
    assert!(EntityKey::parse(input).is_none());
}

#[test]
fn keys_hash_and_compare_by_value() {
    use std::collections::HashMap;
    let mut map = HashMap::new();
    map.insert(EntityKey::new("counter", "a"), 1);
    assert_eq!(map.get(&EntityKey::new("counter", "a")), Some(&1));
    assert_eq!(map.get(&EntityKey::new("counter", "b")), None);
}

#[test]
fn alarm_name_serializes_transparently() {
    let name = AlarmName::new("tick");
    assert_eq!(serde_json::to_string(&name).unwrap(), "\"tick\"");
}
