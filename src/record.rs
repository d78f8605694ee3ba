//! Instance records as returned by the provider.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::path::{self, ColumnPath};

/// Field holding the tags of an instance.
pub const TAGS_FIELD: &str = "Tags";

/// Field injected with the region a record was fetched from.
pub const REGION_FIELD: &str = "Region";

/// Field injected with the credential profile a record was fetched with.
pub const PROFILE_FIELD: &str = "SourceProfile";

/// One compute instance, kept as an untyped nested object.
///
/// The shape follows the provider response: any field may hold objects,
/// arrays or scalars. All lookups go through [`InstanceRecord::resolve`] and
/// [`InstanceRecord::display`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct InstanceRecord(Value);

impl Default for InstanceRecord {
    fn default() -> Self {
        Self::new(Map::new())
    }
}

impl InstanceRecord {
    /// Wrap an object map.
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(Value::Object(fields))
    }

    /// Wrap a JSON value, which must be an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self::new(fields)),
            _ => None,
        }
    }

    /// Top-level field lookup.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Set a top-level field, replacing any existing value.
    pub fn insert(&mut self, field: &str, value: Value) {
        if let Value::Object(fields) = &mut self.0 {
            fields.insert(field.to_string(), value);
        }
    }

    /// Remove a top-level field.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        match &mut self.0 {
            Value::Object(fields) => fields.remove(field),
            _ => None,
        }
    }

    /// Nested lookup; `None` if any segment misses.
    pub fn resolve(&self, path: &ColumnPath) -> Option<&Value> {
        path::resolve(&self.0, path)
    }

    /// Nested lookup for rendering; misses become `unknown`.
    pub fn display(&self, path: &ColumnPath) -> Value {
        path::display(&self.0, path)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}
