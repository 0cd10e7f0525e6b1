//! # xadmin-rs blog demo
//!
//! Serves an admin site for a small blog with three models, in-memory
//! records and two users (`admin` and `editor`, password `secret`).
//!
//! ```bash
//! cargo run --package blog-demo
//! ```
//!
//! Settings come from `blog.toml` when it exists, then `XADMIN_*`
//! environment variables. `XADMIN_BIND` picks the listen address.

mod admin;
mod models;
mod templates;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use xadmin_rs_admin::{server, AdminSite};
use xadmin_rs_auth::{AdminUser, Group, InMemoryAuthenticator};
use xadmin_rs_core::logging::setup_logging;
use xadmin_rs_core::settings_loader;
use xadmin_rs_db::ModelLogEntryStore;

fn authenticator() -> Arc<InMemoryAuthenticator> {
    let auth = InMemoryAuthenticator::new();
    auth.add_user(AdminUser::new(1, "admin").staff().superuser(), "secret");
    auth.add_user(
        AdminUser::new(2, "editor").staff().with_group(
            Group::new("editors")
                .with_perm("blog.view_post")
                .with_perm("blog.change_post")
                .with_perm("blog.view_author"),
        ),
        "secret",
    );
    Arc::new(auth)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = if Path::new("blog.toml").exists() {
        settings_loader::from_toml_file_with_env("blog.toml").context("loading blog.toml")?
    } else {
        settings_loader::from_env()
    };
    setup_logging(&settings);

    let registry = admin::registry().context("building the admin registry")?;
    let store = models::sample_store()?;
    let site = AdminSite::new(registry, settings)
        .with_store(store.clone())
        .with_log_store(Arc::new(ModelLogEntryStore::new(store)))
        .with_renderer(Arc::new(templates::engine()?))
        .with_authenticator(authenticator());
    let site = Arc::new(site);

    let prefix = site.settings().normalized_prefix();
    tracing::info!(models = site.registry().models().len(), prefix = %prefix, "admin site ready");

    let addr = std::env::var("XADMIN_BIND").unwrap_or_else(|_| "127.0.0.1:8000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!("listening on http://{addr}{prefix}");
    axum::serve(listener, server::router(site)).await?;
    Ok(())
}
