//! Sessions and one-time flash messages.
//!
//! A [`Session`] is a cheap, cloneable handle: the request, the view, and
//! every plugin share the same underlying data. Flash messages live in the
//! session until the next rendered page takes them.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The severity of a flash message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    /// Developer-facing detail.
    Debug = 10,
    /// Informational.
    Info = 20,
    /// An action succeeded.
    Success = 25,
    /// Something needs attention.
    Warning = 30,
    /// An action failed.
    Error = 40,
}

impl MessageLevel {
    /// The CSS tag for this level.
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    /// Parses a tag such as `"success"`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "success" => Some(Self::Success),
            "warning" => Some(Self::Warning),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl fmt::Display for MessageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A one-time notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Severity.
    pub level: MessageLevel,
    /// Text shown to the user.
    pub text: String,
    /// CSS classes: any extra tags followed by the level tag.
    pub tags: String,
}

impl Message {
    /// Creates a message tagged with its level.
    pub fn new(level: MessageLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
            tags: level.tag().to_string(),
        }
    }

    /// Creates a message with extra CSS tags.
    pub fn with_tags(level: MessageLevel, text: impl Into<String>, extra_tags: &str) -> Self {
        let tags = if extra_tags.is_empty() {
            level.tag().to_string()
        } else {
            format!("{extra_tags} {}", level.tag())
        };
        Self {
            level,
            text: text.into(),
            tags,
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[derive(Debug, Default)]
struct SessionData {
    values: BTreeMap<String, Value>,
    messages: Vec<Message>,
    modified: bool,
}

/// A shared handle to one client's session.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use xadmin_rs_http::{MessageLevel, Session};
///
/// let session = Session::new();
/// let same = session.clone();
/// same.set("LIST_QUERY", json!(["blog", "article", "p=2"]));
/// session.add_message(MessageLevel::Success, "Saved.");
///
/// assert_eq!(session.get("LIST_QUERY"), Some(json!(["blog", "article", "p=2"])));
/// assert_eq!(same.take_messages().len(), 1);
/// assert!(session.take_messages().is_empty());
/// ```
#[derive(Clone, Default)]
pub struct Session {
    inner: Arc<RwLock<SessionData>>,
}

impl Session {
    /// Creates an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the stored value.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.read(|data| data.values.get(key).cloned())
    }

    /// Returns `true` if `key` is stored.
    pub fn contains_key(&self, key: &str) -> bool {
        self.read(|data| data.values.contains_key(key))
    }

    /// Stores a value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.write(|data| {
            data.values.insert(key.into(), value.into());
        });
    }

    /// Removes a value.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.write(|data| data.values.remove(key))
    }

    /// Drops every value and message.
    pub fn flush(&self) {
        self.write(|data| {
            data.values.clear();
            data.messages.clear();
        });
    }

    /// Queues a flash message.
    pub fn add_message(&self, level: MessageLevel, text: impl Into<String>) {
        self.push_message(Message::new(level, text));
    }

    /// Queues a prepared flash message.
    pub fn push_message(&self, message: Message) {
        self.write(|data| data.messages.push(message));
    }

    /// Returns the queued messages without consuming them.
    pub fn messages(&self) -> Vec<Message> {
        self.read(|data| data.messages.clone())
    }

    /// Removes and returns the queued messages.
    pub fn take_messages(&self) -> Vec<Message> {
        self.write(|data| std::mem::take(&mut data.messages))
    }

    /// Returns `true` if anything changed since the handle was created or
    /// last [`mark_saved`](Self::mark_saved).
    pub fn is_modified(&self) -> bool {
        self.read(|data| data.modified)
    }

    /// Clears the modified flag.
    pub fn mark_saved(&self) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .modified = false;
    }

    /// Returns `true` if both handles point at the same session.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn read<T>(&self, f: impl FnOnce(&SessionData) -> T) -> T {
        f(&self.inner.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn write<T>(&self, f: impl FnOnce(&mut SessionData) -> T) -> T {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.modified = true;
        f(&mut guard)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.read(|data| {
            f.debug_struct("Session")
                .field("keys", &data.values.keys().collect::<Vec<_>>())
                .field("messages", &data.messages.len())
                .finish()
        })
    }
}

/// Session name of the cookie the server adapter sets.
pub const SESSION_COOKIE_NAME: &str = "xadmin_sessionid";

/// Keeps sessions in memory, keyed by a random id.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl SessionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the session for `key`, or a fresh one under a new key.
    pub fn load(&self, key: Option<&str>) -> (String, Session) {
        if let Some(key) = key {
            let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(session) = sessions.get(key) {
                return (key.to_string(), session.clone());
            }
        }
        let key = uuid::Uuid::new_v4().simple().to_string();
        let session = Session::new();
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone(), session.clone());
        tracing::trace!(session = %key, "created session");
        (key, session)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if no session exists.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
