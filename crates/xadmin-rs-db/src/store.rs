//! Record storage.
//!
//! [`ModelStore`] is the seam between the admin site and whatever persists
//! records. The site only ever hands it [`QuerySet`]s and [`Record`]s.
//! [`InMemoryStore`] is a complete implementation backed by a map of tables,
//! used by tests and demos.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;
use xadmin_rs_core::{AdminError, AdminResult};

use crate::lookups::loose_cmp;
use crate::model::ModelMeta;
use crate::queryset::QuerySet;
use crate::record::{value_to_string, Record};

/// Synchronous access to records of any registered model.
///
/// Implementations must be shareable across request threads.
pub trait ModelStore: Send + Sync {
    /// Evaluates a queryset, honoring filters, ordering, distinct and slicing.
    fn fetch(&self, meta: &ModelMeta, qs: &QuerySet) -> AdminResult<Vec<Record>>;

    /// Counts the records a queryset matches, ignoring its slice.
    fn count(&self, meta: &ModelMeta, qs: &QuerySet) -> AdminResult<usize>;

    /// Fetches one record by primary key.
    fn get(&self, meta: &ModelMeta, pk: &str) -> AdminResult<Option<Record>>;

    /// Inserts a record, assigning a primary key if it has none.
    fn insert(&self, meta: &ModelMeta, record: Record) -> AdminResult<Record>;

    /// Replaces the fields present in `record` on the record with key `pk`.
    fn update(&self, meta: &ModelMeta, pk: &str, record: Record) -> AdminResult<Record>;

    /// Deletes a record. Returns `false` if it did not exist.
    fn delete(&self, meta: &ModelMeta, pk: &str) -> AdminResult<bool>;
}

/// A table of rows plus the next auto-increment key.
#[derive(Debug, Default)]
struct ModelTable {
    rows: Vec<Record>,
    next_id: i64,
}

impl ModelTable {
    fn find(&self, meta: &ModelMeta, pk: &str) -> Option<usize> {
        self.rows
            .iter()
            .position(|r| r.pk(meta).is_some_and(|v| value_matches_pk(v, pk)))
    }
}

/// An in-memory [`ModelStore`].
///
/// Cloning shares the same underlying tables.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use xadmin_rs_db::{InMemoryStore, ModelMeta, ModelStore, QuerySet, Record};
///
/// let meta = ModelMeta::new("blog", "Article");
/// let store = InMemoryStore::new();
/// let saved = store
///     .insert(&meta, Record::new().with("title", "Hello"))
///     .unwrap();
/// assert_eq!(saved.get("id"), Some(&json!(1)));
/// assert_eq!(store.count(&meta, &QuerySet::new(meta.label())).unwrap(), 1);
/// ```
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<HashMap<String, ModelTable>>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts several records, returning them with keys assigned.
    pub fn seed(
        &self,
        meta: &ModelMeta,
        records: impl IntoIterator<Item = Record>,
    ) -> AdminResult<Vec<Record>> {
        records
            .into_iter()
            .map(|record| self.insert(meta, record))
            .collect()
    }

    /// Returns every row of a model, in insertion order.
    pub fn all(&self, meta: &ModelMeta) -> Vec<Record> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        tables
            .get(&meta.label())
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Removes every row of every model.
    pub fn clear(&self) {
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn select(&self, meta: &ModelMeta, qs: &QuerySet) -> Vec<Record> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        let Some(table) = tables.get(qs.model()) else {
            return Vec::new();
        };
        let mut rows: Vec<Record> = table.rows.iter().filter(|r| qs.matches(r)).cloned().collect();
        drop(tables);

        if qs.is_distinct() {
            let mut seen: Vec<Record> = Vec::with_capacity(rows.len());
            rows.retain(|r| {
                if seen.contains(r) {
                    false
                } else {
                    seen.push(r.clone());
                    true
                }
            });
        }
        apply_ordering(&mut rows, meta, qs.ordering());
        rows
    }
}

impl fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<&String> = tables.keys().collect();
        names.sort();
        f.debug_struct("InMemoryStore")
            .field("tables", &names)
            .finish()
    }
}

impl ModelStore for InMemoryStore {
    fn fetch(&self, meta: &ModelMeta, qs: &QuerySet) -> AdminResult<Vec<Record>> {
        let rows = self.select(meta, qs);
        let rows = rows.into_iter().skip(qs.offset());
        Ok(match qs.limit() {
            Some(limit) => rows.take(limit).collect(),
            None => rows.collect(),
        })
    }

    fn count(&self, meta: &ModelMeta, qs: &QuerySet) -> AdminResult<usize> {
        Ok(self.select(meta, qs).len())
    }

    fn get(&self, meta: &ModelMeta, pk: &str) -> AdminResult<Option<Record>> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        Ok(tables
            .get(&meta.label())
            .and_then(|t| t.find(meta, pk).map(|i| t.rows[i].clone())))
    }

    fn insert(&self, meta: &ModelMeta, mut record: Record) -> AdminResult<Record> {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let table = tables.entry(meta.label()).or_default();

        match record.pk(meta).cloned() {
            None => {
                table.next_id += 1;
                record.set(meta.pk_name.clone(), table.next_id);
            }
            Some(pk) => {
                let key = value_to_string(&pk);
                if table.find(meta, &key).is_some() {
                    return Err(AdminError::DatabaseError(format!(
                        "Duplicate primary key '{key}' for {}",
                        meta.label()
                    )));
                }
                if let Some(n) = pk.as_i64() {
                    table.next_id = table.next_id.max(n);
                }
            }
        }
        for field in &meta.fields {
            if record.get(&field.name).is_none() {
                let default = field.default.clone().unwrap_or(Value::Null);
                record.set(field.name.clone(), default);
            }
        }
        table.rows.push(record.clone());
        tracing::trace!(model = %meta.label(), "inserted record");
        Ok(record)
    }

    fn update(&self, meta: &ModelMeta, pk: &str, record: Record) -> AdminResult<Record> {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let table = tables
            .get_mut(&meta.label())
            .ok_or_else(|| AdminError::NotFound(format!("{} with pk '{pk}'", meta.label())))?;
        let index = table
            .find(meta, pk)
            .ok_or_else(|| AdminError::NotFound(format!("{} with pk '{pk}'", meta.label())))?;
        let row = &mut table.rows[index];
        row.merge(&record);
        Ok(row.clone())
    }

    fn delete(&self, meta: &ModelMeta, pk: &str) -> AdminResult<bool> {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let Some(table) = tables.get_mut(&meta.label()) else {
            return Ok(false);
        };
        Ok(table.find(meta, pk).map(|i| table.rows.remove(i)).is_some())
    }
}

fn apply_ordering(rows: &mut [Record], meta: &ModelMeta, ordering: &[String]) {
    if ordering.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        for key in ordering {
            let (field, descending) = key
                .strip_prefix('-')
                .map_or((key.as_str(), false), |stripped| (stripped, true));
            let field = if field == "pk" { meta.pk_name.as_str() } else { field };
            let cmp = compare_values(a.get(field), b.get(field));
            let cmp = if descending { cmp.reverse() } else { cmp };
            if cmp != Ordering::Equal {
                return cmp;
            }
        }
        Ordering::Equal
    });
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => loose_cmp(a, b).unwrap_or(Ordering::Equal),
    }
}

fn value_matches_pk(value: &Value, pk: &str) -> bool {
    match value {
        Value::Number(n) => n.to_string() == pk,
        Value::String(s) => s == pk,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookups::{Lookup, Q};
    use crate::model::{FieldDef, FieldType};
    use serde_json::json;

    fn meta() -> ModelMeta {
        ModelMeta::new("blog", "Article")
            .field(FieldDef::new("title", FieldType::Char))
            .field(FieldDef::new("views", FieldType::Integer).default_value(0))
    }

    fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        let m = meta();
        store
            .seed(
                &m,
                [
                    Record::new().with("title", "b").with("views", 10),
                    Record::new().with("title", "a").with("views", 30),
                    Record::new().with("title", "c").with("views", 20),
                ],
            )
            .unwrap();
        store
    }

    #[test]
    fn test_insert_assigns_increasing_ids() {
        let store = seeded();
        let ids: Vec<Value> = store
            .all(&meta())
            .iter()
            .map(|r| r.get("id").cloned().unwrap())
            .collect();
        assert_eq!(ids, vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn test_insert_fills_defaults() {
        let store = InMemoryStore::new();
        let saved = store.insert(&meta(), Record::new().with("title", "x")).unwrap();
        assert_eq!(saved.get("views"), Some(&json!(0)));
    }

    #[test]
    fn test_insert_explicit_pk_bumps_counter() {
        let store = InMemoryStore::new();
        let m = meta();
        store.insert(&m, Record::new().with("id", 10)).unwrap();
        let next = store.insert(&m, Record::new()).unwrap();
        assert_eq!(next.get("id"), Some(&json!(11)));
        assert!(store.insert(&m, Record::new().with("id", 10)).is_err());
    }

    #[test]
    fn test_fetch_filters_orders_and_slices() {
        let store = seeded();
        let m = meta();
        let qs = QuerySet::new(m.label())
            .filter(Q::filter("views", Lookup::Gte(json!(20))))
            .order_by(["-views"]);
        let titles: Vec<Value> = store
            .fetch(&m, &qs)
            .unwrap()
            .iter()
            .map(|r| r.get("title").cloned().unwrap())
            .collect();
        assert_eq!(titles, vec![json!("a"), json!("c")]);

        let page = store.fetch(&m, &qs.clone().slice(1, Some(5))).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(store.count(&m, &qs.slice(1, Some(5))).unwrap(), 2);
    }

    #[test]
    fn test_order_by_pk_alias() {
        let store = seeded();
        let m = meta();
        let rows = store.fetch(&m, &QuerySet::new(m.label()).order_by(["-pk"])).unwrap();
        assert_eq!(rows[0].get("id"), Some(&json!(3)));
    }

    #[test]
    fn test_get_update_delete() {
        let store = seeded();
        let m = meta();
        assert!(store.get(&m, "2").unwrap().is_some());
        assert!(store.get(&m, "9").unwrap().is_none());

        let updated = store
            .update(&m, "2", Record::new().with("title", "z"))
            .unwrap();
        assert_eq!(updated.get("title"), Some(&json!("z")));
        assert_eq!(updated.get("views"), Some(&json!(30)));

        assert!(store.delete(&m, "2").unwrap());
        assert!(!store.delete(&m, "2").unwrap());
        assert!(matches!(
            store.update(&m, "2", Record::new()),
            Err(AdminError::NotFound(_))
        ));
    }

    #[test]
    fn test_unknown_model_is_empty() {
        let store = InMemoryStore::new();
        let other = ModelMeta::new("x", "Y");
        assert!(store.fetch(&other, &QuerySet::new(other.label())).unwrap().is_empty());
        assert!(!store.delete(&other, "1").unwrap());
    }

    #[test]
    fn test_clone_shares_tables() {
        let store = seeded();
        let clone = store.clone();
        clone.clear();
        assert!(store.all(&meta()).is_empty());
    }
}
