//! Models the admin site keeps for itself: the action log and per-user
//! settings.
//!
//! Both live in an ordinary [`ModelStore`], so the admin can browse them
//! like any registered model. [`ModelLogEntryStore`] is a [`LogEntryStore`]
//! writing [`LogEntry`]s as `xadmin.log` records.
//!
//! # Examples
//!
//! ```
//! use xadmin_rs_db::site_models::{get_user_setting, set_user_setting};
//! use xadmin_rs_db::InMemoryStore;
//!
//! let store = InMemoryStore::new();
//! set_user_setting(&store, 1, "site-theme", "dark").unwrap();
//! set_user_setting(&store, 1, "site-theme", "light").unwrap();
//! assert_eq!(get_user_setting(&store, 1, "site-theme").unwrap().as_deref(), Some("light"));
//! assert_eq!(get_user_setting(&store, 2, "site-theme").unwrap(), None);
//! ```

use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use xadmin_rs_core::AdminResult;

use crate::log_entry::{ActionFlag, LogEntry, LogEntryStore};
use crate::lookups::{Lookup, Q};
use crate::model::{FieldDef, FieldType, ModelMeta};
use crate::queryset::QuerySet;
use crate::record::{value_to_string, Record};
use crate::store::ModelStore;

/// Label of the action log model.
pub const LOG_LABEL: &str = "xadmin.log";
/// Label of the user settings model.
pub const USER_SETTINGS_LABEL: &str = "xadmin.usersettings";

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// The `xadmin.log` model.
pub fn log_meta() -> ModelMeta {
    ModelMeta::new("xadmin", "Log")
        .verbose_name("log entry")
        .verbose_name_plural("log entries")
        .field(FieldDef::new("action_time", FieldType::DateTime).verbose_name("action time"))
        .field(FieldDef::new("user", FieldType::Integer))
        .field(FieldDef::new("ip_addr", FieldType::Char).verbose_name("action ip").optional())
        .field(FieldDef::new("content_type", FieldType::Char).verbose_name("content type").optional())
        .field(FieldDef::new("object_id", FieldType::Char).verbose_name("object id").optional())
        .field(FieldDef::new("object_repr", FieldType::Char).verbose_name("object repr").max_length(200))
        .field(
            FieldDef::new("action_flag", FieldType::Char)
                .verbose_name("action flag")
                .choices([("create", "Create"), ("change", "Change"), ("delete", "Delete")]),
        )
        .field(FieldDef::new("message", FieldType::Text).verbose_name("change message").optional())
        .field(FieldDef::new("summary", FieldType::Char).not_editable().optional())
        .ordering(["-action_time"])
        .display_field("summary")
}

/// The `xadmin.usersettings` model.
pub fn user_settings_meta() -> ModelMeta {
    ModelMeta::new("xadmin", "UserSettings")
        .verbose_name("user setting")
        .verbose_name_plural("user settings")
        .field(FieldDef::new("user", FieldType::Integer))
        .field(FieldDef::new("key", FieldType::Char).verbose_name("settings key").max_length(256))
        .field(FieldDef::new("value", FieldType::Text).verbose_name("settings content").optional())
        .display_field("key")
}

// ── Log entries as records ───────────────────────────────────────────

/// A log entry as an `xadmin.log` record. The id is left to the store.
pub fn log_entry_to_record(entry: &LogEntry) -> Record {
    Record::new()
        .with("action_time", entry.action_time.format(TIME_FORMAT).to_string())
        .with("user", entry.user_id)
        .with("ip_addr", entry.ip_addr.clone())
        .with("content_type", entry.content_type.clone())
        .with("object_id", entry.object_id.clone())
        .with("object_repr", entry.object_repr.clone())
        .with("action_flag", entry.action_flag.as_str())
        .with("message", entry.message.clone())
        .with("summary", entry.to_string())
}

/// Reads an `xadmin.log` record back. Returns `None` when a required
/// column is missing or malformed.
pub fn record_to_log_entry(record: &Record) -> Option<LogEntry> {
    let text = |name: &str| match record.get(name) {
        None | Some(Value::Null) => None,
        Some(value) => Some(value_to_string(value)),
    };
    let action_flag = match text("action_flag")?.as_str() {
        "create" => ActionFlag::Create,
        "change" => ActionFlag::Change,
        "delete" => ActionFlag::Delete,
        _ => return None,
    };
    let naive = NaiveDateTime::parse_from_str(&text("action_time")?, TIME_FORMAT).ok()?;
    Some(LogEntry {
        id: record.get("id").and_then(Value::as_u64).unwrap_or_default(),
        action_time: DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc),
        user_id: record.get("user").and_then(Value::as_u64)?,
        ip_addr: text("ip_addr"),
        content_type: text("content_type"),
        object_id: text("object_id"),
        object_repr: text("object_repr").unwrap_or_default(),
        action_flag,
        message: text("message").unwrap_or_default(),
    })
}

/// A [`LogEntryStore`] keeping entries as `xadmin.log` records.
#[derive(Clone)]
pub struct ModelLogEntryStore {
    store: Arc<dyn ModelStore>,
    meta: ModelMeta,
}

impl ModelLogEntryStore {
    /// Logs into `store`.
    pub fn new(store: Arc<dyn ModelStore>) -> Self {
        Self {
            store,
            meta: log_meta(),
        }
    }

    fn newest_first(&self, qs: QuerySet) -> Vec<LogEntry> {
        match self.store.fetch(&self.meta, &qs.order_by(["-id"])) {
            Ok(records) => records.iter().filter_map(record_to_log_entry).collect(),
            Err(err) => {
                tracing::error!(error = %err, "failed to read log entries");
                Vec::new()
            }
        }
    }

    fn queryset(&self) -> QuerySet {
        QuerySet::new(self.meta.label())
    }
}

impl std::fmt::Debug for ModelLogEntryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelLogEntryStore")
            .field("model", &self.meta.label())
            .finish_non_exhaustive()
    }
}

impl LogEntryStore for ModelLogEntryStore {
    fn log(&self, mut entry: LogEntry) -> LogEntry {
        match self.store.insert(&self.meta, log_entry_to_record(&entry)) {
            Ok(saved) => {
                entry.id = saved.get("id").and_then(Value::as_u64).unwrap_or_default();
            }
            Err(err) => tracing::error!(error = %err, "failed to store log entry"),
        }
        entry
    }

    fn get_for_object(&self, content_type: &str, object_id: &str) -> Vec<LogEntry> {
        self.newest_first(
            self.queryset()
                .filter(Q::filter("content_type", Lookup::Exact(content_type.into())))
                .filter(Q::filter("object_id", Lookup::Exact(object_id.into()))),
        )
    }

    fn get_for_user(&self, user_id: u64) -> Vec<LogEntry> {
        self.newest_first(self.queryset().filter(Q::filter("user", Lookup::Exact(user_id.into()))))
    }

    fn recent(&self, limit: usize) -> Vec<LogEntry> {
        self.newest_first(self.queryset().slice(0, Some(limit)))
    }

    fn count(&self) -> usize {
        self.store.count(&self.meta, &self.queryset()).unwrap_or_default()
    }
}

// ── User settings ────────────────────────────────────────────────────

fn user_setting_query(user_id: u64, key: &str) -> QuerySet {
    QuerySet::new(USER_SETTINGS_LABEL)
        .filter(Q::filter("user", Lookup::Exact(user_id.into())))
        .filter(Q::filter("key", Lookup::Exact(key.into())))
}

/// The stored value of one user's setting.
pub fn get_user_setting(store: &dyn ModelStore, user_id: u64, key: &str) -> AdminResult<Option<String>> {
    let meta = user_settings_meta();
    let found = store.fetch(&meta, &user_setting_query(user_id, key).slice(0, Some(1)))?;
    Ok(found
        .first()
        .and_then(|r| r.get("value"))
        .filter(|v| !v.is_null())
        .map(value_to_string))
}

/// Creates or replaces one user's setting.
pub fn set_user_setting(store: &dyn ModelStore, user_id: u64, key: &str, value: &str) -> AdminResult<Record> {
    let meta = user_settings_meta();
    let existing = store.fetch(&meta, &user_setting_query(user_id, key).slice(0, Some(1)))?;
    match existing.first().and_then(|r| r.pk_string(&meta)) {
        Some(pk) => store.update(&meta, &pk, Record::new().with("value", value)),
        None => store.insert(
            &meta,
            Record::new().with("user", user_id).with("key", key).with("value", value),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn log_store() -> (Arc<InMemoryStore>, ModelLogEntryStore) {
        let store = Arc::new(InMemoryStore::new());
        let logs = ModelLogEntryStore::new(store.clone());
        (store, logs)
    }

    #[test]
    fn test_logged_entries_become_records() {
        let (store, logs) = log_store();
        let entry = logs.log(
            LogEntry::new(ActionFlag::Change, 7, "Changed title.")
                .object("blog.article", "3", "Release notes")
                .ip_addr(Some("10.0.0.1".into())),
        );
        assert_eq!(entry.id, 1);

        let record = store.get(&log_meta(), "1").unwrap().unwrap();
        assert_eq!(record.get("user"), Some(&serde_json::json!(7)));
        assert_eq!(record.get("action_flag"), Some(&serde_json::json!("change")));
        assert_eq!(
            record.display(&log_meta()),
            "Changed \"Release notes\" - Changed title."
        );
    }

    #[test]
    fn test_queries_read_entries_back_newest_first() {
        let (_, logs) = log_store();
        logs.log(LogEntry::new(ActionFlag::Create, 1, "Added.").object("blog.article", "3", "A"));
        logs.log(LogEntry::new(ActionFlag::Change, 2, "Changed body.").object("blog.article", "3", "A"));
        logs.log(LogEntry::new(ActionFlag::Delete, 1, "").object("blog.article", "4", "B"));

        let history = logs.get_for_object("blog.article", "3");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].action_flag, ActionFlag::Change);
        assert_eq!(history[0].message, "Changed body.");
        assert_eq!(logs.get_for_user(1).len(), 2);
        assert_eq!(logs.recent(1)[0].object_repr, "B");
        assert_eq!(logs.count(), 3);
    }

    #[test]
    fn test_malformed_record_is_skipped() {
        assert!(record_to_log_entry(&Record::new().with("action_flag", "rename")).is_none());
    }

    #[test]
    fn test_user_settings_are_per_user() {
        let store = InMemoryStore::new();
        set_user_setting(&store, 1, "dashboard", "a").unwrap();
        set_user_setting(&store, 2, "dashboard", "b").unwrap();
        set_user_setting(&store, 1, "dashboard", "c").unwrap();
        assert_eq!(get_user_setting(&store, 1, "dashboard").unwrap().as_deref(), Some("c"));
        assert_eq!(get_user_setting(&store, 2, "dashboard").unwrap().as_deref(), Some("b"));
        assert_eq!(store.all(&user_settings_meta()).len(), 2);
    }
}
