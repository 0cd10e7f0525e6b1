//! Template context.
//!
//! A [`Context`] is an ordered JSON object. Hooks receive it by value, add or
//! replace keys, and return it; the renderer converts it to a Tera context at
//! the very end.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Variables handed to a template.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use xadmin_rs_template::Context;
///
/// let mut ctx = Context::new();
/// ctx.insert("title", "Articles");
/// ctx.insert("count", 3);
///
/// assert_eq!(ctx.get_str("title"), Some("Articles"));
/// assert_eq!(ctx.get("count"), Some(&json!(3)));
/// assert!(!ctx.contains_key("missing"));
/// ```
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context(Map<String, Value>);

impl Context {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a variable.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Returns a variable.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns a string variable.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Returns a mutable reference to a variable.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.0.get_mut(key)
    }

    /// Returns `true` if the variable is set.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Removes a variable.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Copies every variable of `other` over this context.
    pub fn update(&mut self, other: Self) {
        self.0.extend(other.0);
    }

    /// Variable names in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Number of variables.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no variable is set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The underlying JSON object.
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consumes the context into a JSON object value.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Context {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_update_overrides() {
        let mut base = Context::new().with("a", 1).with("b", 2);
        base.update(Context::new().with("b", 3).with("c", 4));
        assert_eq!(base.get("b"), Some(&json!(3)));
        assert_eq!(base.len(), 3);
    }

    #[test]
    fn test_into_value() {
        let ctx = Context::new().with("x", "y");
        assert_eq!(ctx.into_value(), json!({"x": "y"}));
    }

    #[test]
    fn test_get_mut_and_remove() {
        let mut ctx = Context::new().with("list", json!([1]));
        if let Some(Value::Array(items)) = ctx.get_mut("list") {
            items.push(json!(2));
        }
        assert_eq!(ctx.remove("list"), Some(json!([1, 2])));
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_serializes_as_object() {
        let ctx = Context::new().with("k", true);
        assert_eq!(serde_json::to_string(&ctx).unwrap(), r#"{"k":true}"#);
    }
}
