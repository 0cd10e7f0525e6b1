//! Query string dictionary for request parameters.
//!
//! [`QueryDict`] is immutable by default, like the parameters it is parsed
//! from. [`copy`](QueryDict::copy) returns a mutable clone; views use that to
//! build "same page, different filter" links.

use std::collections::BTreeMap;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};
use xadmin_rs_core::{AdminError, AdminResult};

/// Characters left unescaped in query components.
const QUERY_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'*')
    .remove(b'/')
    .remove(b' ');

/// An immutable-by-default multi-valued parameter map with sorted keys.
///
/// # Examples
///
/// ```
/// use xadmin_rs_http::QueryDict;
///
/// let qd = QueryDict::parse("color=red&color=blue&size=large");
/// assert_eq!(qd.get("color"), Some("blue"));
/// assert_eq!(qd.get_list("color"), ["red", "blue"]);
///
/// let mut mutable = qd.copy();
/// mutable.set("color", "green").unwrap();
/// assert_eq!(mutable.urlencode(), "color=green&size=large");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryDict {
    data: BTreeMap<String, Vec<String>>,
    mutable: bool,
}

impl QueryDict {
    /// Creates a new, empty, immutable `QueryDict`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new, empty, mutable `QueryDict`.
    pub fn new_mutable() -> Self {
        Self {
            data: BTreeMap::new(),
            mutable: true,
        }
    }

    /// Parses a query string such as `"a=1&b=2"`. Empty pairs are skipped
    /// and `+` decodes to a space.
    pub fn parse(query_string: &str) -> Self {
        let mut data: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for pair in query_string.trim_start_matches('?').split('&') {
            if pair.is_empty() {
                continue;
            }
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            data.entry(percent_decode(key))
                .or_default()
                .push(percent_decode(value));
        }
        Self {
            data,
            mutable: false,
        }
    }

    /// Builds an immutable `QueryDict` from single-valued pairs.
    pub fn from_pairs<K: Into<String>, V: Into<String>>(
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        let mut data: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (k, v) in pairs {
            data.entry(k.into()).or_default().push(v.into());
        }
        Self {
            data,
            mutable: false,
        }
    }

    /// Returns the last value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.data
            .get(key)
            .and_then(|values| values.last())
            .map(String::as_str)
    }

    /// Returns every value for `key`, empty when absent.
    pub fn get_list(&self, key: &str) -> &[String] {
        self.data.get(key).map_or(&[][..], Vec::as_slice)
    }

    /// Replaces the values for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`AdminError::SuspiciousOperation`] if this `QueryDict` is immutable.
    pub fn set(&mut self, key: &str, value: &str) -> AdminResult<()> {
        self.check_mutable()?;
        self.data.insert(key.to_string(), vec![value.to_string()]);
        Ok(())
    }

    /// Appends a value for `key`.
    pub fn append(&mut self, key: &str, value: &str) -> AdminResult<()> {
        self.check_mutable()?;
        self.data
            .entry(key.to_string())
            .or_default()
            .push(value.to_string());
        Ok(())
    }

    /// Removes `key`, returning its values.
    pub fn remove(&mut self, key: &str) -> AdminResult<Option<Vec<String>>> {
        self.check_mutable()?;
        Ok(self.data.remove(key))
    }

    /// Removes every key for which `drop` returns `true`.
    pub fn remove_where(&mut self, drop: impl Fn(&str) -> bool) -> AdminResult<()> {
        self.check_mutable()?;
        self.data.retain(|k, _| !drop(k));
        Ok(())
    }

    /// Returns a mutable copy.
    #[must_use]
    pub fn copy(&self) -> Self {
        Self {
            data: self.data.clone(),
            mutable: true,
        }
    }

    /// Encodes the parameters as a query string, keys in sorted order and
    /// values in insertion order. Spaces become `+`.
    pub fn urlencode(&self) -> String {
        let mut parts = Vec::new();
        for (key, values) in &self.data {
            for value in values {
                parts.push(format!("{}={}", percent_encode(key), percent_encode(value)));
            }
        }
        parts.join("&")
    }

    /// Returns `true` if this `QueryDict` accepts changes.
    pub const fn is_mutable(&self) -> bool {
        self.mutable
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if there are no keys.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    /// `(key, last value)` pairs in key order.
    pub fn items(&self) -> impl Iterator<Item = (&str, &str)> {
        self.data
            .iter()
            .filter_map(|(k, v)| v.last().map(|last| (k.as_str(), last.as_str())))
    }

    /// `(key, values)` pairs in key order.
    pub fn lists(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.data.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    fn check_mutable(&self) -> AdminResult<()> {
        if self.mutable {
            Ok(())
        } else {
            Err(AdminError::SuspiciousOperation(
                "This QueryDict instance is immutable".to_string(),
            ))
        }
    }
}

fn percent_decode(input: &str) -> String {
    let plus_decoded = input.replace('+', " ");
    percent_encoding::percent_decode_str(&plus_decoded)
        .decode_utf8_lossy()
        .into_owned()
}

fn percent_encode(input: &str) -> String {
    percent_encoding::utf8_percent_encode(input, QUERY_SAFE)
        .to_string()
        .replace(' ', "+")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_multiple_values() {
        let qd = QueryDict::parse("c=1&c=2&c=3");
        assert_eq!(qd.get("c"), Some("3"));
        assert_eq!(qd.get_list("c").len(), 3);
    }

    #[test]
    fn test_parse_no_value_and_empty_pairs() {
        let qd = QueryDict::parse("?key&&a=");
        assert_eq!(qd.get("key"), Some(""));
        assert_eq!(qd.get("a"), Some(""));
        assert_eq!(qd.len(), 2);
    }

    #[test]
    fn test_parse_decodes() {
        let qd = QueryDict::parse("name=hello+world&city=New%20York&_p_title__contains=a%26b");
        assert_eq!(qd.get("name"), Some("hello world"));
        assert_eq!(qd.get("city"), Some("New York"));
        assert_eq!(qd.get("_p_title__contains"), Some("a&b"));
    }

    #[test]
    fn test_immutable_rejects_changes() {
        let mut qd = QueryDict::parse("k=v");
        assert!(matches!(qd.set("k", "x"), Err(AdminError::SuspiciousOperation(_))));
        assert!(qd.append("k", "x").is_err());
        assert!(qd.remove("k").is_err());
    }

    #[test]
    fn test_copy_is_independent() {
        let qd = QueryDict::parse("k=v");
        let mut copy = qd.copy();
        copy.set("k", "new").unwrap();
        assert_eq!(qd.get("k"), Some("v"));
        assert_eq!(copy.get("k"), Some("new"));
    }

    #[test]
    fn test_remove_where() {
        let mut qd = QueryDict::parse("_p_a=1&_p_b=2&o=title").copy();
        qd.remove_where(|k| k.starts_with("_p_")).unwrap();
        assert_eq!(qd.urlencode(), "o=title");
    }

    #[test]
    fn test_urlencode_escapes() {
        let mut qd = QueryDict::new_mutable();
        qd.set("q", "a b&c").unwrap();
        qd.set("path", "/x/y").unwrap();
        assert_eq!(qd.urlencode(), "path=/x/y&q=a+b%26c");
    }

    #[test]
    fn test_items_and_lists() {
        let qd = QueryDict::from_pairs([("b", "2"), ("a", "1"), ("a", "3")]);
        let items: Vec<_> = qd.items().collect();
        assert_eq!(items, vec![("a", "3"), ("b", "2")]);
        assert_eq!(qd.lists().next().unwrap().1.len(), 2);
    }
}
