//! Field lookups and `Q` filter trees.
//!
//! A [`Lookup`] is one comparison against one field; a [`Q`] combines them
//! with AND, OR and NOT. Both render to a SQL-equivalent predicate through
//! [`Display`](std::fmt::Display), and both can be evaluated in memory
//! against a [`Record`].
//!
//! # Examples
//!
//! ```
//! use serde_json::json;
//! use xadmin_rs_db::lookups::{parse_lookup, Lookup, Q};
//!
//! let q = Q::filter("status", Lookup::Exact(json!("published")))
//!     & Q::filter("title", Lookup::IContains("rust".into()));
//! assert_eq!(
//!     q.to_string(),
//!     "(status = 'published' AND UPPER(title) LIKE UPPER('%rust%'))"
//! );
//!
//! let q = parse_lookup("author__id__in", json!("1,2")).unwrap();
//! assert_eq!(q.to_string(), "author.id IN ('1', '2')");
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::ops;

use serde_json::Value;
use xadmin_rs_core::{AdminError, AdminResult};

use crate::record::{value_to_string, Record};

/// Separator between path segments in lookup keys.
pub const LOOKUP_SEP: &str = "__";

static NULL: Value = Value::Null;

/// A field-level lookup operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// `field = value`
    Exact(Value),
    /// Case-insensitive equality.
    IExact(String),
    /// Substring match.
    Contains(String),
    /// Case-insensitive substring match.
    IContains(String),
    /// Membership test.
    In(Vec<Value>),
    /// `field > value`
    Gt(Value),
    /// `field >= value`
    Gte(Value),
    /// `field < value`
    Lt(Value),
    /// `field <= value`
    Lte(Value),
    /// Prefix match.
    StartsWith(String),
    /// Case-insensitive prefix match.
    IStartsWith(String),
    /// Suffix match.
    EndsWith(String),
    /// Case-insensitive suffix match.
    IEndsWith(String),
    /// `field BETWEEN low AND high`
    Range(Value, Value),
    /// `field IS NULL` / `IS NOT NULL`
    IsNull(bool),
    /// Full-text search. Evaluated as a case-insensitive substring in memory.
    Search(String),
}

impl Lookup {
    /// The operator names accepted after the last `__` of a lookup key.
    pub const OPERATORS: &'static [&'static str] = &[
        "exact",
        "iexact",
        "contains",
        "icontains",
        "in",
        "gt",
        "gte",
        "lt",
        "lte",
        "startswith",
        "istartswith",
        "endswith",
        "iendswith",
        "range",
        "isnull",
        "search",
    ];

    /// Builds a lookup from an operator name and a raw value.
    ///
    /// Query-string values arrive as strings: `in` and `range` accept a
    /// comma-separated list, `isnull` accepts `True`/`False`/`1`/`0`.
    pub fn from_operator(op: &str, value: Value) -> AdminResult<Self> {
        let text = value_to_string(&value);
        let lookup = match op {
            "exact" => Self::Exact(value),
            "iexact" => Self::IExact(text),
            "contains" => Self::Contains(text),
            "icontains" => Self::IContains(text),
            "in" => Self::In(split_list(value)),
            "gt" => Self::Gt(value),
            "gte" => Self::Gte(value),
            "lt" => Self::Lt(value),
            "lte" => Self::Lte(value),
            "startswith" => Self::StartsWith(text),
            "istartswith" => Self::IStartsWith(text),
            "endswith" => Self::EndsWith(text),
            "iendswith" => Self::IEndsWith(text),
            "range" => {
                let mut bounds = split_list(value).into_iter();
                match (bounds.next(), bounds.next(), bounds.next()) {
                    (Some(low), Some(high), None) => Self::Range(low, high),
                    _ => {
                        return Err(AdminError::IncorrectLookupParameters(
                            "range lookup needs exactly two values".into(),
                        ))
                    }
                }
            }
            "isnull" => Self::IsNull(parse_bool(&value).ok_or_else(|| {
                AdminError::IncorrectLookupParameters(format!(
                    "'{}' is not a valid isnull value",
                    text
                ))
            })?),
            "search" => Self::Search(text),
            other => {
                return Err(AdminError::IncorrectLookupParameters(format!(
                    "Unsupported lookup '{other}'"
                )))
            }
        };
        Ok(lookup)
    }

    /// Evaluates this lookup against a field value. A missing field counts as `null`.
    pub fn matches(&self, actual: Option<&Value>) -> bool {
        let actual = actual.unwrap_or(&NULL);
        if let (Value::Array(items), false) = (actual, matches!(self, Self::IsNull(_))) {
            return items.iter().any(|item| self.matches(Some(item)));
        }
        match self {
            Self::Exact(expected) => loose_eq(actual, expected),
            Self::IExact(s) => value_to_string(actual).to_lowercase() == s.to_lowercase(),
            Self::Contains(s) => !actual.is_null() && value_to_string(actual).contains(s.as_str()),
            Self::IContains(s) | Self::Search(s) => {
                !actual.is_null()
                    && value_to_string(actual)
                        .to_lowercase()
                        .contains(&s.to_lowercase())
            }
            Self::In(values) => values.iter().any(|v| loose_eq(actual, v)),
            Self::Gt(v) => loose_cmp(actual, v) == Some(Ordering::Greater),
            Self::Gte(v) => matches!(
                loose_cmp(actual, v),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Self::Lt(v) => loose_cmp(actual, v) == Some(Ordering::Less),
            Self::Lte(v) => matches!(loose_cmp(actual, v), Some(Ordering::Less | Ordering::Equal)),
            Self::StartsWith(s) => !actual.is_null() && value_to_string(actual).starts_with(s.as_str()),
            Self::IStartsWith(s) => {
                !actual.is_null()
                    && value_to_string(actual)
                        .to_lowercase()
                        .starts_with(&s.to_lowercase())
            }
            Self::EndsWith(s) => !actual.is_null() && value_to_string(actual).ends_with(s.as_str()),
            Self::IEndsWith(s) => {
                !actual.is_null()
                    && value_to_string(actual)
                        .to_lowercase()
                        .ends_with(&s.to_lowercase())
            }
            Self::Range(low, high) => {
                matches!(
                    loose_cmp(actual, low),
                    Some(Ordering::Greater | Ordering::Equal)
                ) && matches!(
                    loose_cmp(actual, high),
                    Some(Ordering::Less | Ordering::Equal)
                )
            }
            Self::IsNull(expected) => {
                let is_null = match actual {
                    Value::Null => true,
                    Value::Array(items) => items.is_empty(),
                    _ => false,
                };
                is_null == *expected
            }
        }
    }

    fn write_sql(&self, f: &mut fmt::Formatter<'_>, column: &str) -> fmt::Result {
        match self {
            Self::Exact(Value::Null) => write!(f, "{column} IS NULL"),
            Self::Exact(v) => write!(f, "{column} = {}", SqlLiteral(v)),
            Self::IExact(s) => write!(f, "UPPER({column}) = UPPER({})", quote(s)),
            Self::Contains(s) => write!(f, "{column} LIKE {}", quote(&format!("%{s}%"))),
            Self::IContains(s) => {
                write!(f, "UPPER({column}) LIKE UPPER({})", quote(&format!("%{s}%")))
            }
            Self::In(values) => {
                write!(f, "{column} IN (")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", SqlLiteral(v))?;
                }
                write!(f, ")")
            }
            Self::Gt(v) => write!(f, "{column} > {}", SqlLiteral(v)),
            Self::Gte(v) => write!(f, "{column} >= {}", SqlLiteral(v)),
            Self::Lt(v) => write!(f, "{column} < {}", SqlLiteral(v)),
            Self::Lte(v) => write!(f, "{column} <= {}", SqlLiteral(v)),
            Self::StartsWith(s) => write!(f, "{column} LIKE {}", quote(&format!("{s}%"))),
            Self::IStartsWith(s) => {
                write!(f, "UPPER({column}) LIKE UPPER({})", quote(&format!("{s}%")))
            }
            Self::EndsWith(s) => write!(f, "{column} LIKE {}", quote(&format!("%{s}"))),
            Self::IEndsWith(s) => {
                write!(f, "UPPER({column}) LIKE UPPER({})", quote(&format!("%{s}")))
            }
            Self::Range(low, high) => write!(
                f,
                "{column} BETWEEN {} AND {}",
                SqlLiteral(low),
                SqlLiteral(high)
            ),
            Self::IsNull(true) => write!(f, "{column} IS NULL"),
            Self::IsNull(false) => write!(f, "{column} IS NOT NULL"),
            Self::Search(s) => write!(f, "MATCH ({column}) AGAINST ({})", quote(s)),
        }
    }
}

/// A composable query filter.
///
/// `Q` objects can be combined using `&` (AND), `|` (OR), and `!` (NOT).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Q {
    /// A single field lookup.
    Filter {
        /// The field path, `__`-separated for related fields.
        field: String,
        /// The lookup operation.
        lookup: Lookup,
    },
    /// Logical AND of multiple conditions. Empty is always true.
    And(Vec<Q>),
    /// Logical OR of multiple conditions. Empty is always false.
    Or(Vec<Q>),
    /// Logical negation of a condition.
    Not(Box<Q>),
}

impl Q {
    /// Creates a new filter Q object.
    pub fn filter(field: impl Into<String>, lookup: Lookup) -> Self {
        Self::Filter {
            field: field.into(),
            lookup,
        }
    }

    /// Returns `true` if this is an empty AND or OR.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::And(children) | Self::Or(children) => children.is_empty(),
            _ => false,
        }
    }

    /// Evaluates the tree against a record.
    ///
    /// A path like `author__id` descends into nested objects; on a scalar
    /// foreign-key value, a trailing `id`/`pk` segment refers to the value
    /// itself.
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Self::Filter { field, lookup } => lookup.matches(resolve_path(record, field)),
            Self::And(children) => children.iter().all(|q| q.matches(record)),
            Self::Or(children) => children.iter().any(|q| q.matches(record)),
            Self::Not(inner) => !inner.matches(record),
        }
    }
}

impl fmt::Display for Q {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Filter { field, lookup } => lookup.write_sql(f, &field.replace(LOOKUP_SEP, ".")),
            Self::And(children) if children.is_empty() => write!(f, "TRUE"),
            Self::Or(children) if children.is_empty() => write!(f, "FALSE"),
            Self::And(children) | Self::Or(children) => {
                let joiner = if matches!(self, Self::And(_)) { " AND " } else { " OR " };
                write!(f, "(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(joiner)?;
                    }
                    write!(f, "{child}")?;
                }
                write!(f, ")")
            }
            Self::Not(inner) => write!(f, "NOT ({inner})"),
        }
    }
}

impl ops::BitAnd for Q {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Self::And(mut left), Self::And(right)) => {
                left.extend(right);
                Self::And(left)
            }
            (Self::And(mut left), other) => {
                left.push(other);
                Self::And(left)
            }
            (other, Self::And(mut right)) => {
                right.insert(0, other);
                Self::And(right)
            }
            (left, right) => Self::And(vec![left, right]),
        }
    }
}

impl ops::BitOr for Q {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Self::Or(mut left), Self::Or(right)) => {
                left.extend(right);
                Self::Or(left)
            }
            (Self::Or(mut left), other) => {
                left.push(other);
                Self::Or(left)
            }
            (other, Self::Or(mut right)) => {
                right.insert(0, other);
                Self::Or(right)
            }
            (left, right) => Self::Or(vec![left, right]),
        }
    }
}

impl ops::Not for Q {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            Self::Not(inner) => *inner,
            other => Self::Not(Box::new(other)),
        }
    }
}

/// Parses a lookup key such as `author__name__icontains` into a [`Q`].
///
/// The last segment is taken as the operator when it names one; otherwise
/// the whole key is a field path and the operator is `exact`.
pub fn parse_lookup(key: &str, value: Value) -> AdminResult<Q> {
    let (path, op) = split_lookup(key);
    if path.is_empty() {
        return Err(AdminError::IncorrectLookupParameters(format!(
            "Empty field path in lookup '{key}'"
        )));
    }
    Ok(Q::filter(path, Lookup::from_operator(op, value)?))
}

/// Splits a lookup key into its field path and operator.
///
/// ```
/// use xadmin_rs_db::lookups::split_lookup;
///
/// assert_eq!(split_lookup("status__exact"), ("status", "exact"));
/// assert_eq!(split_lookup("author__id"), ("author__id", "exact"));
/// ```
pub fn split_lookup(key: &str) -> (&str, &str) {
    match key.rsplit_once(LOOKUP_SEP) {
        Some((path, op)) if Lookup::OPERATORS.contains(&op) => (path, op),
        _ => (key, "exact"),
    }
}

fn resolve_path<'a>(record: &'a Record, path: &str) -> Option<&'a Value> {
    let mut parts = path.split(LOOKUP_SEP);
    let mut current = record.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Value::Object(map) => map.get(part)?,
            other if part == "id" || part == "pk" => other,
            _ => return None,
        };
    }
    Some(current)
}

fn split_list(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::String(s) => s
            .split(',')
            .map(|p| Value::String(p.trim().to_string()))
            .collect(),
        other => vec![other],
    }
}

fn parse_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) => match s.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Equality across JSON types the way query-string values compare against
/// stored values: `"3"` equals `3`, `"False"` equals `false`.
pub(crate) fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Bool(x), other) | (other, Value::Bool(x)) => parse_bool(other) == Some(*x),
        (Value::Number(_), _) | (_, Value::Number(_)) => match (as_number(a), as_number(b)) {
            (Some(x), Some(y)) => (x - y).abs() < f64::EPSILON,
            _ => false,
        },
        _ => value_to_string(a) == value_to_string(b),
    }
}

/// Ordering across JSON types; `None` when the values are incomparable.
pub(crate) fn loose_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    if a.is_null() || b.is_null() {
        return None;
    }
    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        if a.is_number() || b.is_number() {
            return x.partial_cmp(&y);
        }
    }
    Some(value_to_string(a).cmp(&value_to_string(b)))
}

struct SqlLiteral<'a>(&'a Value);

impl fmt::Display for SqlLiteral<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Value::Null => write!(f, "NULL"),
            Value::Bool(true) => write!(f, "TRUE"),
            Value::Bool(false) => write!(f, "FALSE"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{}", quote(s)),
            other => write!(f, "{}", quote(&value_to_string(other))),
        }
    }
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn article() -> Record {
        Record::from_value(json!({
            "id": 1,
            "title": "Rust in Action",
            "status": "published",
            "author": 3,
            "tags": [1, 2],
            "published": true,
            "rating": 4.5,
            "editor": null,
        }))
        .unwrap()
    }

    #[test]
    fn test_split_lookup() {
        assert_eq!(split_lookup("title__icontains"), ("title", "icontains"));
        assert_eq!(split_lookup("title"), ("title", "exact"));
        assert_eq!(split_lookup("author__name__in"), ("author__name", "in"));
    }

    #[test]
    fn test_parse_lookup_unknown_operator_is_path() {
        let q = parse_lookup("author__name", json!("x")).unwrap();
        assert_eq!(q, Q::filter("author__name", Lookup::Exact(json!("x"))));
    }

    #[test]
    fn test_parse_lookup_empty_path() {
        assert!(parse_lookup("__exact", json!("x")).is_err());
    }

    #[test]
    fn test_parse_isnull_values() {
        assert_eq!(
            parse_lookup("editor__isnull", json!("True")).unwrap(),
            Q::filter("editor", Lookup::IsNull(true))
        );
        assert!(parse_lookup("editor__isnull", json!("maybe")).is_err());
    }

    #[test]
    fn test_parse_range_requires_two() {
        assert!(parse_lookup("rating__range", json!("1")).is_err());
        assert_eq!(
            parse_lookup("rating__range", json!("1,5")).unwrap(),
            Q::filter("rating", Lookup::Range(json!("1"), json!("5")))
        );
    }

    #[test]
    fn test_matches_string_against_number() {
        let r = article();
        assert!(parse_lookup("author__id__exact", json!("3")).unwrap().matches(&r));
        assert!(parse_lookup("author", json!(3)).unwrap().matches(&r));
        assert!(!parse_lookup("author", json!("4")).unwrap().matches(&r));
    }

    #[test]
    fn test_matches_bool_from_query_string() {
        let r = article();
        assert!(parse_lookup("published", json!("True")).unwrap().matches(&r));
        assert!(!parse_lookup("published", json!(false)).unwrap().matches(&r));
    }

    #[test]
    fn test_matches_text_lookups() {
        let r = article();
        assert!(parse_lookup("title__icontains", json!("RUST")).unwrap().matches(&r));
        assert!(!parse_lookup("title__contains", json!("RUST")).unwrap().matches(&r));
        assert!(parse_lookup("title__istartswith", json!("rust")).unwrap().matches(&r));
        assert!(parse_lookup("title__iendswith", json!("ACTION")).unwrap().matches(&r));
        assert!(parse_lookup("status__iexact", json!("Published")).unwrap().matches(&r));
    }

    #[test]
    fn test_matches_comparisons() {
        let r = article();
        assert!(parse_lookup("rating__gt", json!("4")).unwrap().matches(&r));
        assert!(parse_lookup("rating__lte", json!(4.5)).unwrap().matches(&r));
        assert!(!parse_lookup("rating__lt", json!(4.5)).unwrap().matches(&r));
        assert!(parse_lookup("rating__range", json!([4, 5])).unwrap().matches(&r));
    }

    #[test]
    fn test_matches_many_to_many_any() {
        let r = article();
        assert!(parse_lookup("tags", json!("2")).unwrap().matches(&r));
        assert!(parse_lookup("tags__in", json!("5,1")).unwrap().matches(&r));
        assert!(!parse_lookup("tags__isnull", json!(true)).unwrap().matches(&r));
    }

    #[test]
    fn test_matches_null_and_missing() {
        let r = article();
        assert!(parse_lookup("editor__isnull", json!(true)).unwrap().matches(&r));
        assert!(parse_lookup("missing__isnull", json!(true)).unwrap().matches(&r));
        assert!(!parse_lookup("editor__icontains", json!("")).unwrap().matches(&r));
    }

    #[test]
    fn test_q_combinators_evaluate() {
        let r = article();
        let yes = Q::filter("status", Lookup::Exact(json!("published")));
        let no = Q::filter("status", Lookup::Exact(json!("draft")));
        assert!((yes.clone() | no.clone()).matches(&r));
        assert!(!(yes.clone() & no.clone()).matches(&r));
        assert!((!no).matches(&r));
        assert!(Q::And(vec![]).matches(&r));
        assert!(!Q::Or(vec![]).matches(&r));
        assert!(yes.matches(&r));
    }

    #[test]
    fn test_q_flattening() {
        let a = Q::filter("a", Lookup::Exact(json!(1)));
        let b = Q::filter("b", Lookup::Exact(json!(2)));
        let c = Q::filter("c", Lookup::Exact(json!(3)));
        match (a & b) & c {
            Q::And(children) => assert_eq!(children.len(), 3),
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn test_double_negation() {
        let a = Q::filter("a", Lookup::IsNull(true));
        assert_eq!(!!a.clone(), a);
    }

    #[test]
    fn test_sql_rendering() {
        let q = Q::filter("title", Lookup::IStartsWith("it's".into()));
        assert_eq!(q.to_string(), "UPPER(title) LIKE UPPER('it''s%')");
        let q = Q::filter("rating", Lookup::Range(json!(1), json!(5)));
        assert_eq!(q.to_string(), "rating BETWEEN 1 AND 5");
        let q = !Q::filter("editor", Lookup::IsNull(false));
        assert_eq!(q.to_string(), "NOT (editor IS NOT NULL)");
        let q = Q::filter("published", Lookup::Exact(json!(false)))
            | Q::filter("body", Lookup::Search("tokio".into()));
        assert_eq!(
            q.to_string(),
            "(published = FALSE OR MATCH (body) AGAINST ('tokio'))"
        );
        assert_eq!(Q::filter("x", Lookup::Exact(Value::Null)).to_string(), "x IS NULL");
    }
}
