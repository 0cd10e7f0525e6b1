//! Lazy query descriptions.
//!
//! A [`QuerySet`] records what should be fetched (filters, ordering,
//! distinctness, slicing) without touching storage. Hooks pass it along and
//! narrow it; a [`ModelStore`](crate::store::ModelStore) evaluates it at the
//! end. Every builder method returns a new value, so a queryset handed to a
//! hook is never mutated behind the caller's back.

use std::fmt;

use crate::lookups::Q;
use crate::record::Record;

/// An unevaluated query over one model.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use xadmin_rs_db::{Lookup, Q, QuerySet};
///
/// let qs = QuerySet::new("blog.article")
///     .filter(Q::filter("status", Lookup::Exact(json!("published"))))
///     .exclude(Q::filter("title", Lookup::IsNull(true)))
///     .order_by(["-id"]);
///
/// assert_eq!(
///     qs.predicates(),
///     vec!["status = 'published'", "NOT (title IS NULL)"]
/// );
/// assert_eq!(
///     qs.to_string(),
///     "SELECT * FROM blog.article WHERE status = 'published' AND NOT (title IS NULL) ORDER BY id DESC"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySet {
    model: String,
    filters: Vec<Q>,
    ordering: Vec<String>,
    distinct: bool,
    offset: usize,
    limit: Option<usize>,
}

impl QuerySet {
    /// Creates a queryset selecting every record of `model` (`app.model`).
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            filters: Vec::new(),
            ordering: Vec::new(),
            distinct: false,
            offset: 0,
            limit: None,
        }
    }

    /// Adds a predicate. Predicates are ANDed in call order.
    #[must_use]
    pub fn filter(mut self, q: Q) -> Self {
        if !matches!(&q, Q::And(children) if children.is_empty()) {
            self.filters.push(q);
        }
        self
    }

    /// Adds a negated predicate.
    #[must_use]
    pub fn exclude(self, q: Q) -> Self {
        self.filter(!q)
    }

    /// A queryset that matches nothing.
    #[must_use]
    pub fn none(self) -> Self {
        self.filter(Q::Or(Vec::new()))
    }

    /// Replaces the ordering. `-` prefixes sort descending.
    #[must_use]
    pub fn order_by<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.ordering = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Removes duplicate rows from the result.
    #[must_use]
    pub const fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Restricts the result to `limit` rows starting at `offset`.
    #[must_use]
    pub const fn slice(mut self, offset: usize, limit: Option<usize>) -> Self {
        self.offset = offset;
        self.limit = limit;
        self
    }

    /// Drops slicing, keeping filters and ordering. Used for counting.
    #[must_use]
    pub const fn unsliced(mut self) -> Self {
        self.offset = 0;
        self.limit = None;
        self
    }

    /// The `app.model` label.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The predicates in the order they were added.
    pub fn filters(&self) -> &[Q] {
        &self.filters
    }

    /// The requested ordering.
    pub fn ordering(&self) -> &[String] {
        &self.ordering
    }

    /// Whether duplicates are removed.
    pub const fn is_distinct(&self) -> bool {
        self.distinct
    }

    /// The slice offset.
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// The slice limit.
    pub const fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Each predicate rendered as SQL, in call order.
    pub fn predicates(&self) -> Vec<String> {
        self.filters.iter().map(ToString::to_string).collect()
    }

    /// The `WHERE` clause body, or `None` when unfiltered.
    pub fn where_clause(&self) -> Option<String> {
        if self.filters.is_empty() {
            None
        } else {
            Some(self.predicates().join(" AND "))
        }
    }

    /// Returns `true` if `record` passes every predicate.
    pub fn matches(&self, record: &Record) -> bool {
        self.filters.iter().all(|q| q.matches(record))
    }
}

impl fmt::Display for QuerySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT ")?;
        if self.distinct {
            write!(f, "DISTINCT ")?;
        }
        write!(f, "* FROM {}", self.model)?;
        if let Some(clause) = self.where_clause() {
            write!(f, " WHERE {clause}")?;
        }
        if !self.ordering.is_empty() {
            let parts: Vec<String> = self
                .ordering
                .iter()
                .map(|o| {
                    o.strip_prefix('-')
                        .map_or_else(|| format!("{o} ASC"), |field| format!("{field} DESC"))
                })
                .collect();
            write!(f, " ORDER BY {}", parts.join(", "))?;
        }
        if let Some(limit) = self.limit {
            write!(f, " LIMIT {limit}")?;
        }
        if self.offset > 0 {
            write!(f, " OFFSET {}", self.offset)?;
        }
        Ok(())
    }
}
