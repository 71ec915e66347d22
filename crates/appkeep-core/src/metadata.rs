//! Loosely-structured metadata values.
//!
//! Entitlements and manifest snapshots are open-ended key/value trees. They
//! are kept as [`Metadata`] maps of [`MetadataValue`] so callers can inspect
//! arbitrary keys without giving up type information.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A string-keyed metadata map with deterministic (sorted) iteration.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// A single metadata value.
///
/// Serialized untagged, so a TOML or JSON document maps onto it directly.
/// Variant order matters for deserialization: booleans and integers are
/// tried before floats and strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// Floating point number.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Ordered list of values.
    Array(Vec<MetadataValue>),
    /// Nested mapping.
    Dictionary(Metadata),
}

impl MetadataValue {
    /// Borrow the value as a string slice, if it is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The value as a boolean, if it is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The value as an integer, if it is one.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Borrow the value as an array, if it is one.
    #[must_use]
    pub fn as_array(&self) -> Option<&[MetadataValue]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Borrow the value as a nested mapping, if it is one.
    #[must_use]
    pub fn as_dictionary(&self) -> Option<&Metadata> {
        match self {
            Self::Dictionary(map) => Some(map),
            _ => None,
        }
    }

    /// Look up a key in a nested mapping. Returns `None` for non-mappings.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.as_dictionary().and_then(|map| map.get(key))
    }

    /// Whether the value counts as "granted" for an entitlement check.
    ///
    /// `true`, non-zero integers, non-empty strings and non-empty
    /// collections are truthy.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Integer(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::String(s) => !s.is_empty(),
            Self::Array(items) => !items.is_empty(),
            Self::Dictionary(map) => !map.is_empty(),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<toml::Value> for MetadataValue {
    fn from(value: toml::Value) -> Self {
        match value {
            toml::Value::String(s) => Self::String(s),
            toml::Value::Integer(i) => Self::Integer(i),
            toml::Value::Float(f) => Self::Float(f),
            toml::Value::Boolean(b) => Self::Bool(b),
            toml::Value::Datetime(dt) => Self::String(dt.to_string()),
            toml::Value::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            toml::Value::Table(table) => Self::Dictionary(metadata_from_toml(table)),
        }
    }
}

/// Convert a TOML table into a [`Metadata`] map.
#[must_use]
pub fn metadata_from_toml(table: toml::Table) -> Metadata {
    table
        .into_iter()
        .map(|(k, v)| (k, MetadataValue::from(v)))
        .collect()
}

impl MetadataValue {
    /// Convert a JSON value. JSON `null` has no metadata counterpart and
    /// yields `None`; nulls nested in arrays or objects are dropped.
    #[must_use]
    pub fn from_json(value: serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => None,
            serde_json::Value::Bool(b) => Some(Self::Bool(b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Integer)
                .or_else(|| n.as_f64().map(Self::Float)),
            serde_json::Value::String(s) => Some(Self::String(s)),
            serde_json::Value::Array(items) => Some(Self::Array(
                items.into_iter().filter_map(Self::from_json).collect(),
            )),
            serde_json::Value::Object(map) => Some(Self::Dictionary(
                map.into_iter()
                    .filter_map(|(k, v)| Self::from_json(v).map(|v| (k, v)))
                    .collect(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_table_converts_recursively() {
        let table: toml::Table = toml::from_str(
            r#"
            name = "Example"
            build = 42
            ratio = 1.5
            enabled = true
            tags = ["a", "b"]
            [nested]
            key = "value"
            "#,
        )
        .unwrap();

        let meta = metadata_from_toml(table);
        assert_eq!(meta["name"].as_str(), Some("Example"));
        assert_eq!(meta["build"].as_i64(), Some(42));
        assert_eq!(meta["ratio"], MetadataValue::Float(1.5));
        assert_eq!(meta["enabled"].as_bool(), Some(true));
        assert_eq!(meta["tags"].as_array().map(<[_]>::len), Some(2));
        assert_eq!(
            meta["nested"].get("key").and_then(MetadataValue::as_str),
            Some("value")
        );
    }

    #[test]
    fn json_nulls_are_dropped() {
        let json = serde_json::json!({
            "keep": "yes",
            "drop": null,
            "list": [1, null, 2]
        });
        let value = MetadataValue::from_json(json).unwrap();
        let map = value.as_dictionary().unwrap();
        assert!(map.contains_key("keep"));
        assert!(!map.contains_key("drop"));
        assert_eq!(map["list"].as_array().map(<[_]>::len), Some(2));
        assert!(MetadataValue::from_json(serde_json::Value::Null).is_none());
    }

    #[test]
    fn untagged_deserialize_prefers_integer_over_float() {
        let v: MetadataValue = serde_json::from_str("7").unwrap();
        assert_eq!(v, MetadataValue::Integer(7));
        let v: MetadataValue = serde_json::from_str("7.25").unwrap();
        assert_eq!(v, MetadataValue::Float(7.25));
    }

    #[test]
    fn truthiness() {
        assert!(MetadataValue::Bool(true).is_truthy());
        assert!(!MetadataValue::Bool(false).is_truthy());
        assert!(!MetadataValue::String(String::new()).is_truthy());
        assert!(MetadataValue::Integer(1).is_truthy());
        assert!(!MetadataValue::Array(vec![]).is_truthy());
    }
}
