//! Record ↔ BSON conversion for the primary store.
//!
//! Identities travel as plain strings at the ports boundary. Going in,
//! a string `_id` that parses as an `ObjectId` is coerced to one; if it
//! does not parse, the literal string is used. Coming out, `ObjectId`
//! identities are rendered as their hex string.

use mongodb::bson::oid::ObjectId;
use mongodb::bson::{self, Bson, Document};
use serde_json::Value;
use tracing::debug;

use crate::domain::record::{filter_value_string, Filter, Record, ALT_ID_FIELD, ID_FIELD};
use crate::ports::store::StoreError;

/// Coerce an identity value to the driver's native type, failing soft.
pub fn coerce_identity(value: &Value) -> Bson {
    match value {
        Value::String(s) => match ObjectId::parse_str(s) {
            Ok(oid) => Bson::ObjectId(oid),
            Err(e) => {
                debug!(id = %s, error = %e, "Identity is not an ObjectId, using literal");
                Bson::String(s.clone())
            }
        },
        other => bson::to_bson(other).unwrap_or_else(|_| Bson::String(filter_value_string(other))),
    }
}

/// String form of a driver-assigned identity.
pub fn identity_string(id: &Bson) -> String {
    match id {
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::String(s) => s.clone(),
        Bson::Int32(n) => n.to_string(),
        Bson::Int64(n) => n.to_string(),
        other => filter_value_string(&other.clone().into_relaxed_extjson()),
    }
}

fn to_bson(what: &'static str, value: &Value) -> Result<Bson, StoreError> {
    bson::to_bson(value).map_err(|e| StoreError::Conversion {
        what,
        reason: e.to_string(),
    })
}

/// Translate an equality filter into a query document.
///
/// `_id` values are identity-coerced. An `id` key without an `_id` key
/// matches either field, so the synonyms hold on this backend too.
pub fn filter_to_document(filter: &Filter) -> Result<Document, StoreError> {
    let mut query = Document::new();
    for (key, value) in filter {
        if key == ID_FIELD {
            query.insert(ID_FIELD, coerce_identity(value));
        } else if key == ALT_ID_FIELD && !filter.contains_key(ID_FIELD) {
            let mut by_id = Document::new();
            by_id.insert(ID_FIELD, coerce_identity(value));
            let mut by_alt = Document::new();
            by_alt.insert(ALT_ID_FIELD, to_bson("filter", value)?);
            query.insert(
                "$or",
                Bson::Array(vec![Bson::Document(by_id), Bson::Document(by_alt)]),
            );
        } else {
            query.insert(key.as_str(), to_bson("filter", value)?);
        }
    }
    Ok(query)
}

/// Translate a record for insertion, coercing its `_id` if present.
pub fn record_to_document(record: &Record) -> Result<Document, StoreError> {
    let mut doc = bson::to_document(record).map_err(|e| StoreError::Conversion {
        what: "record",
        reason: e.to_string(),
    })?;
    if let Some(id) = record.get(ID_FIELD).filter(|v| !v.is_null()) {
        doc.insert(ID_FIELD, coerce_identity(id));
    }
    Ok(doc)
}

/// Build the `$set` body for a field-level merge, dropping identity keys.
pub fn updates_to_document(updates: &Record) -> Result<Document, StoreError> {
    let mut set = Document::new();
    for (key, value) in updates {
        if key == ID_FIELD || key == ALT_ID_FIELD {
            continue;
        }
        set.insert(key.as_str(), to_bson("update", value)?);
    }
    Ok(set)
}

/// Translate a stored document back into a record.
pub fn document_to_record(doc: Document) -> Record {
    doc.into_iter()
        .map(|(key, value)| {
            let value = if key == ID_FIELD {
                Value::String(identity_string(&value))
            } else {
                value.into_relaxed_extjson()
            };
            (key, value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::filter_from;
    use serde_json::json;

    const HEX: &str = "65f1a2b3c4d5e6f708192a3b";

    #[test]
    fn test_coerce_valid_object_id() {
        let coerced = coerce_identity(&json!(HEX));
        assert_eq!(coerced, Bson::ObjectId(ObjectId::parse_str(HEX).unwrap()));
    }

    #[test]
    fn test_coerce_falls_back_to_literal() {
        let coerced = coerce_identity(&json!("user-42"));
        assert_eq!(coerced, Bson::String("user-42".to_string()));
    }

    #[test]
    fn test_filter_widens_alt_identity() {
        let query = filter_to_document(&filter_from(json!({"id": HEX, "role": "admin"}))).unwrap();
        let or = query.get_array("$or").unwrap();
        assert_eq!(or.len(), 2);
        assert_eq!(query.get_str("role").unwrap(), "admin");
    }

    #[test]
    fn test_document_identity_renders_as_hex() {
        let mut doc = Document::new();
        doc.insert("_id", ObjectId::parse_str(HEX).unwrap());
        doc.insert("email", "a@x.com");
        let record = document_to_record(doc);
        assert_eq!(record["_id"], HEX);
        assert_eq!(record["email"], "a@x.com");
    }

    #[test]
    fn test_updates_skip_identity() {
        let set = updates_to_document(&filter_from(json!({"_id": "x", "role": "admin"}))).unwrap();
        assert!(!set.contains_key("_id"));
        assert_eq!(set.get_str("role").unwrap(), "admin");
    }
}
