//! # xadmin-rs-db
//!
//! The persistence collaborator seen from the admin site. Views never talk to
//! storage directly: they build a lazy [`QuerySet`] through hooks and hand it
//! to a [`ModelStore`] at the last moment.
//!
//! ## Modules
//!
//! - [`model`] - [`ModelMeta`] and [`FieldDef`]: what the admin knows about a model
//! - [`record`] - [`Record`], a single row as a JSON object
//! - [`lookups`] - [`Lookup`] and [`Q`] filter trees
//! - [`queryset`] - [`QuerySet`], an unevaluated query description
//! - [`store`] - The [`ModelStore`] trait and [`InMemoryStore`]
//! - [`log_entry`] - The admin action log
//! - [`site_models`] - The log and user settings as browsable models

pub mod log_entry;
pub mod lookups;
pub mod model;
pub mod queryset;
pub mod record;
pub mod site_models;
pub mod store;

pub use log_entry::{ActionFlag, InMemoryLogEntryStore, LogEntry, LogEntryStore};
pub use lookups::{parse_lookup, Lookup, Q};
pub use model::{FieldDef, FieldType, ModelMeta};
pub use queryset::QuerySet;
pub use record::Record;
pub use site_models::ModelLogEntryStore;
pub use store::{InMemoryStore, ModelStore};
