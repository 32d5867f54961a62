//! Schemaless records, identities and driver-shaped results.
//!
//! A record is an ordered JSON object. Both backends speak this shape at
//! the ports boundary; identity comparison always happens on the string
//! form so the primary's native ids and the fallback's plain strings
//! deduplicate against each other.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One document in a collection.
pub type Record = Map<String, Value>;

/// Conjunctive equality filter (field name → expected value).
pub type Filter = Map<String, Value>;

/// Primary identity field.
pub const ID_FIELD: &str = "_id";

/// Synonym accepted for the identity field.
pub const ALT_ID_FIELD: &str = "id";

static ID_SEQ: AtomicU64 = AtomicU64::new(0);

/// Returns true for either identity key.
pub fn is_identity_key(key: &str) -> bool {
    key == ID_FIELD || key == ALT_ID_FIELD
}

/// String form of a value used for equality matching.
///
/// Strings compare unquoted; everything else compares by its JSON text.
/// Whole floats render as integers, so `100.0`, `100` and `"100"` agree.
/// Extended-JSON object ids (`{"$oid": "..."}`) collapse to their hex.
pub fn filter_value_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract().abs() < f64::EPSILON && f.abs() < 9.0e15 => {
                format!("{f:.0}")
            }
            _ => n.to_string(),
        },
        Value::Object(map) => match map.get("$oid") {
            Some(Value::String(hex)) if map.len() == 1 => hex.clone(),
            _ => value.to_string(),
        },
        other => other.to_string(),
    }
}

/// Identity of a record as a string, `_id` first, then `id`.
pub fn identity_of(record: &Record) -> Option<String> {
    record
        .get(ID_FIELD)
        .filter(|v| !v.is_null())
        .or_else(|| record.get(ALT_ID_FIELD).filter(|v| !v.is_null()))
        .map(filter_value_string)
}

/// Whether `record` satisfies every key/value pair of `filter`.
///
/// `_id` and `id` are synonyms: either filter key matches against
/// either identity field on the record.
pub fn matches(record: &Record, filter: &Filter) -> bool {
    filter.iter().all(|(key, expected)| {
        let expected = filter_value_string(expected);
        if is_identity_key(key) {
            [ID_FIELD, ALT_ID_FIELD]
                .iter()
                .filter_map(|k| record.get(*k))
                .any(|v| filter_value_string(v) == expected)
        } else {
            record
                .get(key)
                .is_some_and(|v| filter_value_string(v) == expected)
        }
    })
}

/// Field-level merge of `updates` into `record`.
///
/// Identity fields are never overwritten. Returns true if any field
/// actually changed value.
pub fn shallow_merge(record: &mut Record, updates: &Record) -> bool {
    let mut changed = false;
    for (key, value) in updates {
        if is_identity_key(key) {
            continue;
        }
        if record.get(key) != Some(value) {
            record.insert(key.clone(), value.clone());
            changed = true;
        }
    }
    changed
}

/// Timestamp-derived identity, unique within one process.
pub fn generate_identity() -> String {
    let seq = ID_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{}-{seq}", Utc::now().timestamp_millis())
}

/// Result of an insert, in driver shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertOneResult {
    /// Identity assigned to (or carried by) the stored record.
    pub inserted_id: String,
    /// The record as stored.
    pub record: Record,
}

/// Result of an update, in driver shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    pub matched_count: u64,
    pub modified_count: u64,
}

impl UpdateResult {
    /// Zero-effect result.
    pub const fn none() -> Self {
        Self {
            matched_count: 0,
            modified_count: 0,
        }
    }
}

/// Result of a delete, in driver shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    pub deleted_count: u64,
}

impl DeleteResult {
    /// Zero-effect result.
    pub const fn none() -> Self {
        Self { deleted_count: 0 }
    }
}

/// Build a filter from a JSON object literal.
///
/// Non-object values yield an empty (match-all) filter.
pub fn filter_from(value: Value) -> Filter {
    match value {
        Value::Object(map) => map,
        _ => Filter::new(),
    }
}

/// Filter selecting a single identity.
pub fn id_filter(id: &str) -> Filter {
    let mut filter = Filter::new();
    filter.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    filter
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(value: Value) -> Record {
        filter_from(value)
    }

    #[test]
    fn test_identity_prefers_underscore_id() {
        let r = rec(json!({"_id": "a", "id": "b"}));
        assert_eq!(identity_of(&r).as_deref(), Some("a"));

        let r = rec(json!({"id": 42}));
        assert_eq!(identity_of(&r).as_deref(), Some("42"));

        let r = rec(json!({"_id": {"$oid": "65f0c0ffee"}}));
        assert_eq!(identity_of(&r).as_deref(), Some("65f0c0ffee"));

        assert!(identity_of(&rec(json!({"name": "x"}))).is_none());
    }

    #[test]
    fn test_null_underscore_id_falls_through_to_id() {
        let r = rec(json!({"_id": null, "id": "x"}));
        assert_eq!(identity_of(&r).as_deref(), Some("x"));
        assert!(identity_of(&rec(json!({"_id": null, "id": null}))).is_none());
    }

    #[test]
    fn test_whole_float_matches_integer_and_string() {
        let r = rec(json!({"balance": 100.0, "rate": 0.5}));
        assert!(matches(&r, &rec(json!({"balance": 100}))));
        assert!(matches(&r, &rec(json!({"balance": "100"}))));
        assert!(matches(&r, &rec(json!({"balance": 100.0}))));
        assert!(matches(&r, &rec(json!({"rate": "0.5"}))));
        assert!(!matches(&r, &rec(json!({"balance": 100.5}))));
        assert_eq!(filter_value_string(&json!(-3.0)), "-3");
    }

    #[test]
    fn test_matches_string_coerced() {
        let r = rec(json!({"_id": "7", "age": 30, "active": true}));
        assert!(matches(&r, &rec(json!({"age": "30"}))));
        assert!(matches(&r, &rec(json!({"active": "true", "age": 30}))));
        assert!(!matches(&r, &rec(json!({"age": 31}))));
        assert!(!matches(&r, &rec(json!({"missing": "x"}))));
        assert!(matches(&r, &Filter::new()));
    }

    #[test]
    fn test_matches_identity_synonyms() {
        let r = rec(json!({"_id": "abc", "email": "a@x.com"}));
        assert!(matches(&r, &rec(json!({"id": "abc"}))));
        assert!(matches(&r, &rec(json!({"_id": "abc"}))));

        let r = rec(json!({"id": 9}));
        assert!(matches(&r, &rec(json!({"_id": "9"}))));
    }

    #[test]
    fn test_shallow_merge_reports_change() {
        let mut r = rec(json!({"role": "trader", "email": "a@x.com"}));
        assert!(!shallow_merge(&mut r, &rec(json!({"role": "trader"}))));
        assert!(shallow_merge(&mut r, &rec(json!({"role": "admin"}))));
        assert_eq!(r["role"], "admin");
        assert_eq!(r["email"], "a@x.com");
    }

    #[test]
    fn test_shallow_merge_keeps_identity() {
        let mut r = rec(json!({"_id": "1", "role": "trader"}));
        assert!(!shallow_merge(&mut r, &rec(json!({"_id": "2", "id": "3"}))));
        assert_eq!(identity_of(&r).as_deref(), Some("1"));
        assert!(r.get("id").is_none());
    }

    #[test]
    fn test_generated_identities_are_unique() {
        let a = generate_identity();
        let b = generate_identity();
        assert_ne!(a, b);
    }

    #[test]
    fn test_results_serialize_in_driver_shape() {
        let json = serde_json::to_value(UpdateResult::none()).unwrap();
        assert_eq!(json, json!({"matchedCount": 0, "modifiedCount": 0}));
        let json = serde_json::to_value(DeleteResult { deleted_count: 1 }).unwrap();
        assert_eq!(json, json!({"deletedCount": 1}));
    }
}
