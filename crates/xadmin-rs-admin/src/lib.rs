//! # xadmin-rs-admin
//!
//! Plugin-driven admin screens. A [`RegistryBuilder`] collects models, option
//! bundles, view types and plugins at startup and freezes into a [`Registry`].
//! For each request the [`AdminSite`] composes the view type with the
//! model's options, activates plugins, and runs the view's extension points
//! through the plugin hook chains.
//!
//! ## Modules
//!
//! - [`registry`] - [`RegistryBuilder`] and the frozen [`Registry`]
//! - [`options`] - [`AdminOptions`] bundles and the resolved [`ViewContext`]
//! - [`composer`] - Composition of view types and options, cached
//! - [`plugin`] - The [`AdminPlugin`] trait and [`PluginClass`] declarations
//! - [`manager`] - Per-request plugin activation
//! - [`hooks`] - Extension points and the hook chain
//! - [`view`] - [`AdminView`], the per-request view instance
//! - [`view_type`] - [`ViewType`] hierarchy nodes
//! - [`views`] - Built-in view types
//! - [`plugins`] - Built-in plugins
//! - [`urls`] - The URL table
//! - [`site`] - [`AdminSite`]
//! - [`site_admins`] - Opt-in admin pages for the action log and user settings
//! - [`server`] - The axum adapter

pub mod composer;
pub mod hooks;
pub mod manager;
pub mod options;
pub mod plugin;
pub mod plugins;
pub mod registry;
pub mod server;
pub mod site;
pub mod site_admins;
pub mod urls;
pub mod view;
pub mod view_type;
pub mod views;

pub use composer::{ComposedView, Composer};
pub use hooks::{BlockFn, Handler, Hook, Next, DEFAULT_PRIORITY};
pub use manager::ActivePlugin;
pub use options::{AdminOptions, ViewContext};
pub use plugin::{AdminPlugin, MergedPlugin, PluginClass, PluginSettings, DEFAULT_ORDER};
pub use registry::{AdminUrl, ModelAdmin, Registry, RegistryBuilder, RegistrySnapshot};
pub use site::{AdminSite, UserLoader};
pub use urls::{ResolverMatch, UrlTable};
pub use view::AdminView;
pub use view_type::{ViewHandler, ViewType};
