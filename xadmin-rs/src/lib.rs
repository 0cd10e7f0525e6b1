//! # xadmin-rs
//!
//! A plugin-driven admin site generator for Rust.
//!
//! This is the meta-crate that re-exports the sub-crates. Depend on
//! `xadmin-rs` for everything, or on individual crates for finer control.
//!
//! ```no_run
//! use std::sync::Arc;
//! use xadmin_rs::admin::{server, AdminOptions, AdminSite, RegistryBuilder};
//! use xadmin_rs::core::AdminSettings;
//! use xadmin_rs::db::{FieldDef, FieldType, ModelMeta};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut builder = RegistryBuilder::with_defaults()?;
//! builder.register(
//!     ModelMeta::new("blog", "Article").field(FieldDef::new("title", FieldType::Char)),
//!     AdminOptions::new("ArticleAdmin"),
//! )?;
//! let site = Arc::new(AdminSite::new(builder.build(), AdminSettings::default()));
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8000").await?;
//! axum::serve(listener, server::router(site)).await?;
//! # Ok(())
//! # }
//! ```

/// Errors, settings, logging and text helpers.
pub use xadmin_rs_core as core;

/// Model metadata, records, querysets, stores and the admin log.
pub use xadmin_rs_db as db;

/// Users, groups, permissions and authentication.
pub use xadmin_rs_auth as auth;

/// Requests, responses, query dictionaries and sessions.
pub use xadmin_rs_http as http;

/// The template renderer and media assets.
pub use xadmin_rs_template as template;

/// Model forms and field widgets.
#[cfg(feature = "forms")]
pub use xadmin_rs_forms as forms;

/// Registry, composition, plugins, hooks, views and the site.
#[cfg(feature = "admin")]
pub use xadmin_rs_admin as admin;

/// Request factory, fixtures and response assertions.
#[cfg(feature = "testing")]
pub use xadmin_rs_test as test;

/// Commonly used items.
pub mod prelude {
    pub use xadmin_rs_auth::AdminUser;
    pub use xadmin_rs_core::{AdminError, AdminResult, AdminSettings};
    pub use xadmin_rs_db::{FieldDef, FieldType, ModelMeta, Record};
    pub use xadmin_rs_http::{AdminRequest, AdminResponse};

    #[cfg(feature = "admin")]
    pub use xadmin_rs_admin::{
        AdminOptions, AdminPlugin, AdminSite, AdminView, Handler, Hook, PluginClass, RegistryBuilder,
    };
}
