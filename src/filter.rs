//! Tag filters for instance queries.

use std::fmt;

/// Narrows a provider query to instances carrying a tag.
///
/// Built once from the optional tag key and tag value; empty strings count
/// as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FetchFilter {
    /// Match every instance.
    #[default]
    None,
    /// Instances having a tag with this key, whatever its value.
    ByKey(String),
    /// Instances having any tag with this value.
    ByValue(String),
    /// Instances whose tag `key` equals `value`.
    ByKeyAndValue(String, String),
}

impl FetchFilter {
    /// Choose the filter mode from an optional tag key and value.
    pub fn from_parts(key: Option<&str>, value: Option<&str>) -> Self {
        let key = key.filter(|k| !k.is_empty());
        let value = value.filter(|v| !v.is_empty());
        match (key, value) {
            (Some(k), Some(v)) => FetchFilter::ByKeyAndValue(k.to_string(), v.to_string()),
            (Some(k), None) => FetchFilter::ByKey(k.to_string()),
            (None, Some(v)) => FetchFilter::ByValue(v.to_string()),
            (None, None) => FetchFilter::None,
        }
    }

    /// The provider filter as a `(name, values)` pair, if any.
    pub fn to_provider_filter(&self) -> Option<(String, Vec<String>)> {
        match self {
            FetchFilter::None => None,
            FetchFilter::ByKey(key) => Some(("tag-key".to_string(), vec![key.clone()])),
            FetchFilter::ByValue(value) => Some(("tag-value".to_string(), vec![value.clone()])),
            FetchFilter::ByKeyAndValue(key, value) => {
                Some((format!("tag:{}", key), vec![value.clone()]))
            }
        }
    }

    /// Query-protocol parameters (`Filter.1.Name`, `Filter.1.Value.N`).
    pub fn query_params(&self) -> Vec<(String, String)> {
        let Some((name, values)) = self.to_provider_filter() else {
            return Vec::new();
        };
        let mut params = vec![("Filter.1.Name".to_string(), name)];
        for (i, value) in values.into_iter().enumerate() {
            params.push((format!("Filter.1.Value.{}", i + 1), value));
        }
        params
    }

    pub fn is_none(&self) -> bool {
        matches!(self, FetchFilter::None)
    }
}

impl fmt::Display for FetchFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFilter::None => write!(f, "none"),
            FetchFilter::ByKey(key) => write!(f, "tag key {}", key),
            FetchFilter::ByValue(value) => write!(f, "tag value {}", value),
            FetchFilter::ByKeyAndValue(key, value) => write!(f, "tag {}={}", key, value),
        }
    }
}
