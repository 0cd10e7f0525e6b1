//! Single records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::ModelMeta;

/// One row of a model, stored as a JSON object keyed by field name.
///
/// Relation fields hold the target's primary key (or a list of keys for
/// many-to-many fields).
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use xadmin_rs_db::{ModelMeta, Record};
///
/// let meta = ModelMeta::new("blog", "Article").display_field("title");
/// let record = Record::from_value(json!({"id": 3, "title": "Hello"})).unwrap();
/// assert_eq!(record.pk_string(&meta).as_deref(), Some("3"));
/// assert_eq!(record.display(&meta), "Hello");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a JSON object. Returns `None` for any other JSON value.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Returns a field value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Sets a field value.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    /// Builder-style [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Returns the primary key value.
    pub fn pk<'a>(&'a self, meta: &ModelMeta) -> Option<&'a Value> {
        self.0.get(&meta.pk_name).filter(|v| !v.is_null())
    }

    /// Returns the primary key rendered as a URL path segment.
    pub fn pk_string(&self, meta: &ModelMeta) -> Option<String> {
        self.pk(meta).map(value_to_string)
    }

    /// The record's string representation.
    pub fn display(&self, meta: &ModelMeta) -> String {
        if let Some(v) = meta.display_field.as_deref().and_then(|f| self.0.get(f)) {
            if !v.is_null() {
                return value_to_string(v);
            }
        }
        match self.pk_string(meta) {
            Some(pk) => format!("{} object ({pk})", meta.object_name),
            None => format!("{} object (None)", meta.object_name),
        }
    }

    /// The underlying map.
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consumes the record, returning the underlying map.
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Converts the record into a JSON value.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Copies every field of `other` into this record.
    pub fn merge(&mut self, other: &Self) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Renders a JSON value the way it appears in text and URLs: strings without
/// quotes, `null` as the empty string, lists comma-separated.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => if *b { "True" } else { "False" }.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(value_to_string)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_rejects_non_objects() {
        assert!(Record::from_value(json!([1, 2])).is_none());
        assert!(Record::from_value(json!({})).is_some());
    }

    #[test]
    fn test_display_falls_back_to_object_pk() {
        let meta = ModelMeta::new("blog", "Article");
        let record = Record::new().with("id", 7);
        assert_eq!(record.display(&meta), "Article object (7)");
        assert_eq!(Record::new().display(&meta), "Article object (None)");
    }

    #[test]
    fn test_null_pk_is_absent() {
        let meta = ModelMeta::new("blog", "Article");
        let record = Record::new().with("id", Value::Null);
        assert!(record.pk(&meta).is_none());
    }

    #[test]
    fn test_value_to_string() {
        assert_eq!(value_to_string(&json!("x")), "x");
        assert_eq!(value_to_string(&json!(null)), "");
        assert_eq!(value_to_string(&json!(true)), "True");
        assert_eq!(value_to_string(&json!([1, "a"])), "1,a");
        assert_eq!(value_to_string(&json!(2.5)), "2.5");
    }

    #[test]
    fn test_merge_overwrites() {
        let mut a = Record::new().with("x", 1).with("y", 2);
        a.merge(&Record::new().with("y", 3));
        assert_eq!(a.get("x"), Some(&json!(1)));
        assert_eq!(a.get("y"), Some(&json!(3)));
    }
}
