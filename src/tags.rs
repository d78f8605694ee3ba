//! Tag normalization.
//!
//! The provider returns tags as a list of `{"Key": .., "Value": ..}` pairs.
//! Column paths and tag lookups want `Tags.<key>` to work directly, so the
//! list is replaced with a map before records leave the aggregator.

use serde_json::{Map, Value};

use crate::record::{InstanceRecord, TAGS_FIELD};

/// Replace the record's tag list with a key → value map.
///
/// A missing or non-list `Tags` field becomes an empty map. Later pairs win
/// over earlier ones with the same key. Pairs without a string `Key` are
/// skipped. Tag values are text: a missing `Value` is stored as the empty
/// string, and numbers or booleans are stored as their text.
pub fn normalize_tags(record: &mut InstanceRecord) {
    let tags = match record.remove(TAGS_FIELD) {
        Some(Value::Array(pairs)) => tags_from_pairs(pairs),
        _ => Map::new(),
    };
    record.insert(TAGS_FIELD, Value::Object(tags));
}

fn tags_from_pairs(pairs: Vec<Value>) -> Map<String, Value> {
    let mut tags = Map::new();
    for pair in pairs {
        let Value::Object(mut pair) = pair else {
            continue;
        };
        let Some(Value::String(key)) = pair.remove("Key") else {
            continue;
        };
        let value = match pair.remove("Value") {
            None | Some(Value::Null) => Value::String(String::new()),
            Some(Value::Number(n)) => Value::String(n.to_string()),
            Some(Value::Bool(b)) => Value::String(b.to_string()),
            Some(value) => value,
        };
        // Map::insert keeps the first position of a duplicate key; value is last-wins.
        tags.insert(key, value);
    }
    tags
}
