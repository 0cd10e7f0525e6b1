//! Admin action log.
//!
//! Every create, change and delete performed through the admin site leaves a
//! [`LogEntry`]. Views build entries with [`LogEntry::new`] and hand them to
//! a [`LogEntryStore`].
//!
//! # Examples
//!
//! ```
//! use xadmin_rs_db::log_entry::{ActionFlag, InMemoryLogEntryStore, LogEntry, LogEntryStore};
//!
//! let store = InMemoryLogEntryStore::new();
//! store.log(LogEntry::new(ActionFlag::Create, 1, "Added.").object("blog.article", "42", "My Article"));
//! store.log(LogEntry::new(ActionFlag::Change, 1, "Changed title.").object("blog.article", "42", "My Article"));
//!
//! let history = store.get_for_object("blog.article", "42");
//! assert_eq!(history.len(), 2);
//! assert_eq!(history[0].action_flag, ActionFlag::Change);
//! ```

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened to the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionFlag {
    /// The object was created.
    Create,
    /// The object was modified.
    Change,
    /// The object was deleted.
    Delete,
}

impl ActionFlag {
    /// The stored name of this flag.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Change => "change",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for ActionFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single admin action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Assigned by the store.
    pub id: u64,
    /// When the action occurred.
    pub action_time: DateTime<Utc>,
    /// The acting user's id.
    pub user_id: u64,
    /// The client address, when known.
    pub ip_addr: Option<String>,
    /// `app.model` of the affected object, if any.
    pub content_type: Option<String>,
    /// Primary key of the affected object.
    pub object_id: Option<String>,
    /// String representation of the object at the time of the action.
    pub object_repr: String,
    /// The kind of action.
    pub action_flag: ActionFlag,
    /// Free-form description, e.g. the change message.
    pub message: String,
}

impl LogEntry {
    /// Creates an entry not yet tied to an object.
    pub fn new(action_flag: ActionFlag, user_id: u64, message: impl Into<String>) -> Self {
        Self {
            id: 0,
            action_time: Utc::now(),
            user_id,
            ip_addr: None,
            content_type: None,
            object_id: None,
            object_repr: String::new(),
            action_flag,
            message: message.into(),
        }
    }

    /// Ties the entry to an object.
    #[must_use]
    pub fn object(
        mut self,
        content_type: impl Into<String>,
        object_id: impl Into<String>,
        object_repr: impl Into<String>,
    ) -> Self {
        self.content_type = Some(content_type.into());
        self.object_id = Some(object_id.into());
        self.object_repr = xadmin_rs_core::text::truncate_chars(&object_repr.into(), 200);
        self
    }

    /// Records the client address.
    #[must_use]
    pub fn ip_addr(mut self, ip: Option<String>) -> Self {
        self.ip_addr = ip;
        self
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.action_flag {
            ActionFlag::Create => write!(f, "Added \"{}\".", self.object_repr),
            ActionFlag::Change => {
                write!(f, "Changed \"{}\" - {}", self.object_repr, self.message)
            }
            ActionFlag::Delete => write!(f, "Deleted \"{}.\"", self.object_repr),
        }
    }
}

/// Storage for admin log entries.
pub trait LogEntryStore: Send + Sync {
    /// Stores an entry, assigning its id. Returns the stored entry.
    fn log(&self, entry: LogEntry) -> LogEntry;

    /// Entries for one object, newest first.
    fn get_for_object(&self, content_type: &str, object_id: &str) -> Vec<LogEntry>;

    /// Entries by one user, newest first.
    fn get_for_user(&self, user_id: u64) -> Vec<LogEntry>;

    /// The most recent entries, newest first.
    fn recent(&self, limit: usize) -> Vec<LogEntry>;

    /// Total number of entries.
    fn count(&self) -> usize;
}

/// In-memory [`LogEntryStore`]. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLogEntryStore {
    entries: Arc<RwLock<Vec<LogEntry>>>,
}

impl InMemoryLogEntryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn newest_first(&self, keep: impl Fn(&LogEntry) -> bool) -> Vec<LogEntry> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.iter().rev().filter(|e| keep(e)).cloned().collect()
    }
}

impl LogEntryStore for InMemoryLogEntryStore {
    fn log(&self, mut entry: LogEntry) -> LogEntry {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entry.id = entries.len() as u64 + 1;
        entries.push(entry.clone());
        entry
    }

    fn get_for_object(&self, content_type: &str, object_id: &str) -> Vec<LogEntry> {
        self.newest_first(|e| {
            e.content_type.as_deref() == Some(content_type)
                && e.object_id.as_deref() == Some(object_id)
        })
    }

    fn get_for_user(&self, user_id: u64) -> Vec<LogEntry> {
        self.newest_first(|e| e.user_id == user_id)
    }

    fn recent(&self, limit: usize) -> Vec<LogEntry> {
        let mut all = self.newest_first(|_| true);
        all.truncate(limit);
        all
    }

    fn count(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(flag: ActionFlag, user: u64, pk: &str) -> LogEntry {
        LogEntry::new(flag, user, "msg").object("blog.article", pk, "Article")
    }

    #[test]
    fn test_ids_are_sequential() {
        let store = InMemoryLogEntryStore::new();
        assert_eq!(store.log(entry(ActionFlag::Create, 1, "1")).id, 1);
        assert_eq!(store.log(entry(ActionFlag::Create, 1, "2")).id, 2);
        assert_eq!(store.count(), 2);
    }

    #[test]
    fn test_get_for_user_and_recent() {
        let store = InMemoryLogEntryStore::new();
        store.log(entry(ActionFlag::Create, 1, "1"));
        store.log(entry(ActionFlag::Change, 2, "1"));
        store.log(entry(ActionFlag::Delete, 1, "1"));
        assert_eq!(store.get_for_user(1).len(), 2);
        let recent = store.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].action_flag, ActionFlag::Delete);
    }

    #[test]
    fn test_object_repr_truncated() {
        let long = "x".repeat(300);
        let e = LogEntry::new(ActionFlag::Create, 1, "").object("a.b", "1", long);
        assert_eq!(e.object_repr.chars().count(), 200);
    }

    #[test]
    fn test_display() {
        let e = LogEntry::new(ActionFlag::Change, 1, "Changed title.").object("a.b", "1", "Post");
        assert_eq!(e.to_string(), "Changed \"Post\" - Changed title.");
        assert_eq!(ActionFlag::Delete.to_string(), "delete");
    }

    #[test]
    fn test_flag_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ActionFlag::Create).unwrap(), "\"create\"");
    }
}
