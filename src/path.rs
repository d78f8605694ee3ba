//! Nested path parsing and lookup.
//!
//! Every field access into an instance record goes through this module. A
//! [`ColumnPath`] is an ordered list of segments; each segment indexes one
//! level deeper, by field name for objects or by position for arrays.
//!
//! Two lookups are provided:
//!
//! - [`resolve`] returns `None` as soon as any segment fails to index.
//! - [`display`] returns the string `unknown` in that case, and for a resolved
//!   `null`, so rendered tables always have a printable cell.

use std::fmt;

use serde_json::Value;

use crate::error::InventoryError;

/// Placeholder rendered for values that could not be resolved.
pub const UNKNOWN: &str = "unknown";

/// One step of a nested path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Field name in an object.
    Key(String),
    /// Position in an array.
    Index(usize),
}

impl PathSegment {
    /// Index into `value` by this segment.
    fn step<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        match (self, value) {
            (PathSegment::Key(key), Value::Object(map)) => map.get(key),
            (PathSegment::Index(index), Value::Array(items)) => items.get(*index),
            _ => None,
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => write!(f, "{}", key),
            PathSegment::Index(index) => write!(f, "{}", index),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

/// An ordered sequence of path segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ColumnPath(Vec<PathSegment>);

impl ColumnPath {
    /// Build a path from explicit segments. No digit interpretation happens here.
    pub fn new(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }

    /// Parse a dot-delimited path such as `NetworkInterfaces.0.Association.PublicIp`.
    ///
    /// Pure-digit segments become array indices; everything else is a field name.
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::MalformedColumnSpec` for an empty path, an empty
    /// segment (`a..b`, `.a`, `a.`) or an index that does not fit in `usize`.
    pub fn parse(spec: &str) -> Result<Self, InventoryError> {
        if spec.is_empty() {
            return Err(InventoryError::MalformedColumnSpec(spec.to_string()));
        }

        spec.split('.')
            .map(|part| {
                if part.is_empty() {
                    Err(InventoryError::MalformedColumnSpec(spec.to_string()))
                } else if part.bytes().all(|b| b.is_ascii_digit()) {
                    part.parse::<usize>()
                        .map(PathSegment::Index)
                        .map_err(|_| InventoryError::MalformedColumnSpec(spec.to_string()))
                } else {
                    Ok(PathSegment::Key(part.to_string()))
                }
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    /// The path segments, in order.
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// The final segment, if any.
    pub fn last(&self) -> Option<&PathSegment> {
        self.0.last()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ColumnPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

impl<S: Into<PathSegment>> FromIterator<S> for ColumnPath {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Look up `path` in `value`.
///
/// Returns `None` if any segment cannot be resolved, regardless of what the
/// remaining segments are. A present `null` is returned as `Some(Value::Null)`.
pub fn resolve<'a>(value: &'a Value, path: &ColumnPath) -> Option<&'a Value> {
    path.segments()
        .iter()
        .try_fold(value, |current, segment| segment.step(current))
}

/// Look up `path` in `value` for rendering.
///
/// Unresolvable paths and `null` values both become the string `unknown`.
pub fn display(value: &Value, path: &ColumnPath) -> Value {
    match resolve(value, path) {
        Some(Value::Null) | None => Value::String(UNKNOWN.to_string()),
        Some(found) => found.clone(),
    }
}
