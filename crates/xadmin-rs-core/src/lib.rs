//! # xadmin-rs-core
//!
//! Foundation types shared by every xadmin-rs crate. This crate knows nothing
//! about views, plugins, or models.
//!
//! ## Modules
//!
//! - [`error`] - The [`AdminError`] taxonomy and result alias
//! - [`settings`] - Site-wide [`AdminSettings`]
//! - [`settings_loader`] - Loading settings from TOML/JSON files and `XADMIN_*` env vars
//! - [`logging`] - Tracing subscriber setup and request spans
//! - [`text`] - Small text helpers used when building titles and messages

pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;
pub mod text;

pub use error::{AdminError, AdminResult, ValidationError};
pub use settings::AdminSettings;
