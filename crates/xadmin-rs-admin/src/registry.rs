//! Registration and the frozen registry.
//!
//! Integrators describe the site on a mutable [`RegistryBuilder`] during
//! startup. [`RegistryBuilder::freeze`] collapses every model's option
//! bundles and returns the immutable [`Registry`] that request handling
//! shares. After the freeze the builder rejects every mutation.
//!
//! # Examples
//!
//! ```
//! use serde_json::json;
//! use xadmin_rs_admin::options::AdminOptions;
//! use xadmin_rs_admin::registry::RegistryBuilder;
//! use xadmin_rs_core::AdminError;
//! use xadmin_rs_db::ModelMeta;
//!
//! let mut builder = RegistryBuilder::new();
//! let article = ModelMeta::new("blog", "Article");
//! builder
//!     .register(article.clone(), AdminOptions::new("Base").attr("list_display", json!(["a"])))
//!     .unwrap();
//! builder
//!     .register(article.clone(), AdminOptions::new("Wide").attr("list_display", json!(["a", "b"])))
//!     .unwrap();
//!
//! let registry = builder.freeze();
//! let admin = registry.get_registry("blog.article").unwrap();
//! assert_eq!(admin.options().get("list_display"), Some(&json!(["a", "b"])));
//!
//! let err = builder.register(article, AdminOptions::new("Late")).unwrap_err();
//! assert!(matches!(err, AdminError::ImproperlyConfigured(_)));
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use xadmin_rs_core::{AdminError, AdminResult};
use xadmin_rs_db::ModelMeta;

use crate::options::AdminOptions;
use crate::plugin::PluginClass;
use crate::view_type::ViewType;

/// The default priority of a URL entry. Higher priorities match first.
pub const DEFAULT_URL_PRIORITY: i32 = 100;

/// A view mounted at a route.
#[derive(Debug, Clone)]
pub struct AdminUrl {
    /// Regex route, relative to the site root (or the model root).
    pub route: String,
    /// The view type serving it.
    pub view_type: &'static ViewType,
    /// URL name. Model views use `%s_%s_<suffix>`.
    pub name: String,
    /// Ordering within its group.
    pub priority: i32,
}

#[derive(Debug, Clone)]
struct ModelEntry {
    meta: Arc<ModelMeta>,
    /// Newest first.
    options: Vec<Arc<AdminOptions>>,
    order: usize,
}

#[derive(Debug, Clone, Default)]
struct RegistryState {
    models: Vec<ModelEntry>,
    view_options: BTreeMap<&'static str, Vec<Arc<AdminOptions>>>,
    settings: BTreeMap<String, Vec<Arc<AdminOptions>>>,
    plugins: BTreeMap<&'static str, Vec<Arc<PluginClass>>>,
    views: Vec<AdminUrl>,
    modelviews: Vec<AdminUrl>,
}

/// An opaque copy of a builder's registrations.
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    state: RegistryState,
    next_order: usize,
}

/// The mutable, startup-only side of the registry.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    state: RegistryState,
    next_order: usize,
    frozen: bool,
}

impl RegistryBuilder {
    /// An empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// A builder with the standard URL table and built-in plugins.
    pub fn with_defaults() -> AdminResult<Self> {
        let mut builder = Self::new();
        builder.register_builtin_views()?;
        builder.register_builtin_plugins()?;
        Ok(builder)
    }

    fn check_open(&self, what: &str) -> AdminResult<()> {
        if self.frozen {
            Err(AdminError::ImproperlyConfigured(format!(
                "cannot {what}: the site is already frozen"
            )))
        } else {
            Ok(())
        }
    }

    /// Returns `true` once [`freeze`](Self::freeze) ran.
    pub const fn is_frozen(&self) -> bool {
        self.frozen
    }

    // ── Models ───────────────────────────────────────────────────────

    /// Registers an option bundle for a model. Bundles registered later
    /// take precedence.
    ///
    /// # Errors
    ///
    /// `AlreadyRegistered` if a bundle with the same name is registered for
    /// the model; `ImproperlyConfigured` for abstract models or after the
    /// freeze.
    pub fn register(&mut self, meta: impl Into<Arc<ModelMeta>>, options: AdminOptions) -> AdminResult<()> {
        let meta = meta.into();
        self.check_open(&format!("register {}", meta.label()))?;
        if meta.abstract_model {
            return Err(AdminError::ImproperlyConfigured(format!(
                "the model {} is abstract, so it cannot be registered with admin",
                meta.object_name
            )));
        }
        let label = meta.label();
        let options = Arc::new(options);
        if let Some(entry) = self.state.models.iter_mut().find(|m| m.meta.label() == label) {
            if entry.options.iter().any(|o| o.name() == options.name()) {
                return Err(AdminError::AlreadyRegistered(format!(
                    "{} is already registered for {label}",
                    options.name()
                )));
            }
            entry.options.insert(0, options);
        } else {
            self.state.models.push(ModelEntry {
                meta,
                options: vec![options],
                order: self.next_order,
            });
            self.next_order += 1;
        }
        tracing::debug!(model = %label, "registered model options");
        Ok(())
    }

    /// Removes every option bundle of a model.
    pub fn unregister(&mut self, label: &str) -> AdminResult<()> {
        self.check_open(&format!("unregister {label}"))?;
        let before = self.state.models.len();
        self.state.models.retain(|m| m.meta.label() != label);
        if self.state.models.len() == before {
            return Err(AdminError::NotRegistered(format!("the model {label} is not registered")));
        }
        tracing::debug!(model = label, "unregistered model");
        Ok(())
    }

    /// Labels of the registered models, in registration order.
    pub fn registered_models(&self) -> Vec<String> {
        self.state.models.iter().map(|m| m.meta.label()).collect()
    }

    // ── View and settings options ────────────────────────────────────

    /// Attaches a bundle to a view type. It applies to every composed view
    /// of that type or a descendant.
    pub fn register_view_options(&mut self, view_type: &'static ViewType, options: AdminOptions) -> AdminResult<()> {
        self.check_open(&format!("register options for {}", view_type.name))?;
        let list = self.state.view_options.entry(view_type.name).or_default();
        if list.iter().any(|o| o.name() == options.name()) {
            return Err(AdminError::AlreadyRegistered(format!(
                "{} is already registered for {}",
                options.name(),
                view_type.name
            )));
        }
        list.insert(0, Arc::new(options));
        tracing::debug!(view = view_type.name, "registered view options");
        Ok(())
    }

    /// Detaches a named bundle from a view type.
    pub fn unregister_view_options(&mut self, view_type: &'static ViewType, name: &str) -> AdminResult<()> {
        self.check_open(&format!("unregister options for {}", view_type.name))?;
        let not_registered = || AdminError::NotRegistered(format!("{name} is not registered for {}", view_type.name));
        let list = self
            .state
            .view_options
            .get_mut(view_type.name)
            .ok_or_else(not_registered)?;
        let before = list.len();
        list.retain(|o| o.name() != name);
        if list.len() == before {
            return Err(not_registered());
        }
        if list.is_empty() {
            self.state.view_options.remove(view_type.name);
        }
        Ok(())
    }

    /// Registers a settings bundle under a lowercase name such as `"listadmin"`
    /// or `"comm"`. The composer applies it to view types whose name maps to
    /// it.
    pub fn register_settings(&mut self, name: &str, options: AdminOptions) -> AdminResult<()> {
        self.check_open(&format!("register settings {name}"))?;
        self.state
            .settings
            .entry(name.to_lowercase())
            .or_default()
            .insert(0, Arc::new(options));
        Ok(())
    }

    // ── Plugins ──────────────────────────────────────────────────────

    /// Attaches a plugin to a view type and its descendants.
    pub fn register_plugin(&mut self, plugin: impl Into<Arc<PluginClass>>, view_type: &'static ViewType) -> AdminResult<()> {
        let plugin = plugin.into();
        self.check_open(&format!("register plugin {}", plugin.id()))?;
        let list = self.state.plugins.entry(view_type.name).or_default();
        if list.iter().any(|p| p.id() == plugin.id()) {
            return Err(AdminError::AlreadyRegistered(format!(
                "plugin {} is already registered for {}",
                plugin.id(),
                view_type.name
            )));
        }
        tracing::debug!(plugin = plugin.id(), view = view_type.name, "registered plugin");
        list.push(plugin);
        Ok(())
    }

    /// Detaches plugins by id. Nothing changes unless every id is present.
    pub fn unregister_plugin(&mut self, view_type: &'static ViewType, ids: &[&str]) -> AdminResult<()> {
        self.check_open("unregister plugins")?;
        let list = self.state.plugins.get(view_type.name).map_or(&[][..], Vec::as_slice);
        if let Some(missing) = ids.iter().find(|id| !list.iter().any(|p| p.id() == **id)) {
            return Err(AdminError::NotRegistered(format!(
                "plugin {missing} is not registered for {}",
                view_type.name
            )));
        }
        if let Some(list) = self.state.plugins.get_mut(view_type.name) {
            list.retain(|p| !ids.iter().any(|id| *id == p.id()));
            if list.is_empty() {
                self.state.plugins.remove(view_type.name);
            }
        }
        Ok(())
    }

    /// Ids of the plugins attached directly to a view type.
    pub fn plugin_ids(&self, view_type: &'static ViewType) -> Vec<String> {
        self.state
            .plugins
            .get(view_type.name)
            .map(|list| list.iter().map(|p| p.id().to_string()).collect())
            .unwrap_or_default()
    }

    // ── URL table ────────────────────────────────────────────────────

    /// Mounts a site-level view.
    pub fn register_view(&mut self, route: &str, view_type: &'static ViewType, name: &str) -> AdminResult<()> {
        self.register_view_with_priority(route, view_type, name, DEFAULT_URL_PRIORITY)
    }

    /// Mounts a site-level view with an explicit priority.
    pub fn register_view_with_priority(
        &mut self,
        route: &str,
        view_type: &'static ViewType,
        name: &str,
        priority: i32,
    ) -> AdminResult<()> {
        self.check_open(&format!("register view {name}"))?;
        self.state.views.push(AdminUrl {
            route: route.to_string(),
            view_type,
            name: name.to_string(),
            priority,
        });
        Ok(())
    }

    /// Mounts a view under every registered model.
    pub fn register_modelview(&mut self, route: &str, view_type: &'static ViewType, name: &str) -> AdminResult<()> {
        self.register_modelview_with_priority(route, view_type, name, DEFAULT_URL_PRIORITY)
    }

    /// Mounts a model view with an explicit priority.
    pub fn register_modelview_with_priority(
        &mut self,
        route: &str,
        view_type: &'static ViewType,
        name: &str,
        priority: i32,
    ) -> AdminResult<()> {
        self.check_open(&format!("register model view {name}"))?;
        self.state.modelviews.push(AdminUrl {
            route: route.to_string(),
            view_type,
            name: name.to_string(),
            priority,
        });
        Ok(())
    }

    /// Replaces the view type of the entry matching `route` or `name`.
    pub fn update_view(&mut self, route: &str, view_type: &'static ViewType, name: &str) -> AdminResult<()> {
        self.check_open(&format!("update view {name}"))?;
        let entry = self
            .state
            .views
            .iter_mut()
            .chain(self.state.modelviews.iter_mut())
            .find(|u| u.route == route || u.name == name)
            .ok_or_else(|| {
                AdminError::ImproperlyConfigured(format!(
                    "no view registered at '{route}' or named '{name}'"
                ))
            })?;
        entry.view_type = view_type;
        Ok(())
    }

    // ── Snapshots and freezing ───────────────────────────────────────

    /// Copies every registration.
    pub fn copy_registry(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            state: self.state.clone(),
            next_order: self.next_order,
        }
    }

    /// Restores a copy taken with [`copy_registry`](Self::copy_registry).
    pub fn restore_registry(&mut self, snapshot: RegistrySnapshot) -> AdminResult<()> {
        self.check_open("restore the registry")?;
        self.state = snapshot.state;
        self.next_order = snapshot.next_order;
        Ok(())
    }

    /// Marks the site ready and returns the immutable registry.
    pub fn freeze(&mut self) -> Registry {
        self.frozen = true;
        let registry = Registry::from_state(&self.state);
        tracing::debug!(
            models = registry.models.len(),
            views = registry.views.len(),
            "registry frozen"
        );
        registry
    }

    /// Consumes the builder, freezing it.
    pub fn build(mut self) -> Registry {
        self.freeze()
    }
}

// ── Frozen registry ──────────────────────────────────────────────────

/// A registered model with its collapsed option bundle.
#[derive(Debug, Clone)]
pub struct ModelAdmin {
    meta: Arc<ModelMeta>,
    options: Arc<AdminOptions>,
    order: usize,
}

impl ModelAdmin {
    /// Model metadata.
    pub fn meta(&self) -> &Arc<ModelMeta> {
        &self.meta
    }

    /// Every registered bundle folded into one, named `<app><model>Admin`.
    pub fn options(&self) -> &Arc<AdminOptions> {
        &self.options
    }

    /// Registration order of the model.
    pub const fn order(&self) -> usize {
        self.order
    }
}

/// The immutable registry shared by request handling.
#[derive(Debug, Clone)]
pub struct Registry {
    models: Vec<ModelAdmin>,
    view_options: BTreeMap<&'static str, Vec<Arc<AdminOptions>>>,
    settings: BTreeMap<String, Vec<Arc<AdminOptions>>>,
    plugins: BTreeMap<&'static str, Vec<Arc<PluginClass>>>,
    views: Vec<AdminUrl>,
    modelviews: Vec<AdminUrl>,
}

impl Registry {
    fn from_state(state: &RegistryState) -> Self {
        let models = state
            .models
            .iter()
            .map(|entry| ModelAdmin {
                options: Arc::new(AdminOptions::collapse(
                    format!("{}{}Admin", entry.meta.app_label, entry.meta.model_name),
                    &entry.options,
                )),
                meta: Arc::clone(&entry.meta),
                order: entry.order,
            })
            .collect();
        Self {
            models,
            view_options: state.view_options.clone(),
            settings: state.settings.clone(),
            plugins: state.plugins.clone(),
            views: state.views.clone(),
            modelviews: state.modelviews.clone(),
        }
    }

    /// Looks up a model by label (`app.model`).
    pub fn get_registry(&self, label: &str) -> AdminResult<&ModelAdmin> {
        let label = label.to_lowercase();
        self.models
            .iter()
            .find(|m| m.meta.label() == label)
            .ok_or_else(|| AdminError::NotRegistered(format!("the model {label} is not registered")))
    }

    /// The model's options, or `default` when it is not registered.
    pub fn get_registry_or<'a>(&'a self, label: &str, default: &'a Arc<AdminOptions>) -> &'a Arc<AdminOptions> {
        self.get_registry(label).map_or(default, ModelAdmin::options)
    }

    /// Returns `true` if the model is registered.
    pub fn is_registered(&self, label: &str) -> bool {
        self.get_registry(label).is_ok()
    }

    /// Registered models, in registration order.
    pub fn models(&self) -> &[ModelAdmin] {
        &self.models
    }

    /// Bundles attached to a view type, most recent first.
    pub fn view_options(&self, view_type: &ViewType) -> &[Arc<AdminOptions>] {
        self.view_options.get(view_type.name).map_or(&[], Vec::as_slice)
    }

    /// Settings bundles under a lowercase name, most recent first.
    pub fn settings_options(&self, name: &str) -> &[Arc<AdminOptions>] {
        self.settings.get(name).map_or(&[], Vec::as_slice)
    }

    /// Plugins attached directly to a view type, in registration order.
    pub fn plugins(&self, view_type: &ViewType) -> &[Arc<PluginClass>] {
        self.plugins.get(view_type.name).map_or(&[], Vec::as_slice)
    }

    /// Site-level URL entries.
    pub fn views(&self) -> &[AdminUrl] {
        &self.views
    }

    /// Per-model URL entries.
    pub fn modelviews(&self) -> &[AdminUrl] {
        &self.modelviews
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::views::{CREATE_VIEW, LIST_VIEW, UPDATE_VIEW};

    struct Noop;
    impl crate::plugin::AdminPlugin for Noop {}

    fn plugin(id: &str) -> PluginClass {
        PluginClass::builder(id, |_| Ok(Noop)).build().unwrap()
    }

    fn article() -> ModelMeta {
        ModelMeta::new("blog", "Article")
    }

    #[test]
    fn test_register_twice_same_name() {
        let mut builder = RegistryBuilder::new();
        builder.register(article(), AdminOptions::new("A")).unwrap();
        let err = builder.register(article(), AdminOptions::new("A")).unwrap_err();
        assert!(matches!(err, AdminError::AlreadyRegistered(_)));
    }

    #[test]
    fn test_abstract_model_rejected() {
        let mut builder = RegistryBuilder::new();
        let err = builder
            .register(article().abstract_model(true), AdminOptions::new("A"))
            .unwrap_err();
        assert!(matches!(err, AdminError::ImproperlyConfigured(_)));
        assert!(builder.registered_models().is_empty());
    }

    #[test]
    fn test_unregister() {
        let mut builder = RegistryBuilder::new();
        builder.register(article(), AdminOptions::new("A")).unwrap();
        builder.unregister("blog.article").unwrap();
        assert!(matches!(
            builder.unregister("blog.article"),
            Err(AdminError::NotRegistered(_))
        ));
    }

    #[test]
    fn test_model_order_follows_registration() {
        let mut builder = RegistryBuilder::new();
        builder.register(article(), AdminOptions::new("A")).unwrap();
        builder.register(ModelMeta::new("blog", "Author"), AdminOptions::new("B")).unwrap();
        builder.register(article(), AdminOptions::new("C")).unwrap();
        let registry = builder.build();
        assert_eq!(registry.get_registry("blog.article").unwrap().order(), 0);
        assert_eq!(registry.get_registry("blog.author").unwrap().order(), 1);
        assert_eq!(
            registry.get_registry("blog.article").unwrap().options().name(),
            "blogarticleAdmin"
        );
    }

    #[test]
    fn test_get_registry_or_default() {
        let registry = RegistryBuilder::new().build();
        let default = Arc::new(AdminOptions::new("Default"));
        assert_eq!(registry.get_registry_or("blog.article", &default).name(), "Default");
        assert!(matches!(
            registry.get_registry("blog.article"),
            Err(AdminError::NotRegistered(_))
        ));
    }

    #[test]
    fn test_unregister_plugin_is_all_or_nothing() {
        let mut builder = RegistryBuilder::new();
        builder.register_plugin(plugin("a"), &LIST_VIEW).unwrap();
        builder.register_plugin(plugin("b"), &LIST_VIEW).unwrap();
        let err = builder.unregister_plugin(&LIST_VIEW, &["a", "missing"]).unwrap_err();
        assert!(matches!(err, AdminError::NotRegistered(_)));
        assert_eq!(builder.plugin_ids(&LIST_VIEW), ["a", "b"]);
        builder.unregister_plugin(&LIST_VIEW, &["a"]).unwrap();
        assert_eq!(builder.plugin_ids(&LIST_VIEW), ["b"]);
    }

    #[test]
    fn test_duplicate_plugin_rejected() {
        let mut builder = RegistryBuilder::new();
        builder.register_plugin(plugin("a"), &LIST_VIEW).unwrap();
        assert!(matches!(
            builder.register_plugin(plugin("a"), &LIST_VIEW),
            Err(AdminError::AlreadyRegistered(_))
        ));
    }

    #[test]
    fn test_frozen_builder_rejects_everything() {
        let mut builder = RegistryBuilder::new();
        builder.register(article(), AdminOptions::new("A")).unwrap();
        let _ = builder.freeze();
        assert!(builder.register_plugin(plugin("a"), &LIST_VIEW).is_err());
        assert!(builder.register_view("^x/$", &LIST_VIEW, "x").is_err());
        assert!(builder.unregister("blog.article").is_err());
        assert!(builder.register_settings("comm", AdminOptions::new("S")).is_err());
        assert_eq!(builder.registered_models(), ["blog.article"]);
        assert!(builder.plugin_ids(&LIST_VIEW).is_empty());
    }

    #[test]
    fn test_update_view() {
        let mut builder = RegistryBuilder::new();
        builder.register_modelview("^add/$", &CREATE_VIEW, "%s_%s_add").unwrap();
        builder.update_view("^add/$", &UPDATE_VIEW, "%s_%s_add").unwrap();
        let err = builder.update_view("^nope/$", &UPDATE_VIEW, "nope").unwrap_err();
        assert!(matches!(err, AdminError::ImproperlyConfigured(_)));
        let registry = builder.build();
        assert_eq!(registry.modelviews()[0].view_type.name, "UpdateAdminView");
    }

    #[test]
    fn test_copy_and_restore() {
        let mut builder = RegistryBuilder::new();
        builder.register(article(), AdminOptions::new("A")).unwrap();
        let snapshot = builder.copy_registry();
        builder.register(ModelMeta::new("blog", "Author"), AdminOptions::new("B")).unwrap();
        builder.restore_registry(snapshot).unwrap();
        assert_eq!(builder.registered_models(), ["blog.article"]);
    }

    #[test]
    fn test_view_options_registration() {
        let mut builder = RegistryBuilder::new();
        builder
            .register_view_options(&LIST_VIEW, AdminOptions::new("L").attr("list_per_page", json!(5)))
            .unwrap();
        assert!(builder.register_view_options(&LIST_VIEW, AdminOptions::new("L")).is_err());
        builder.unregister_view_options(&LIST_VIEW, "L").unwrap();
        assert!(matches!(
            builder.unregister_view_options(&LIST_VIEW, "L"),
            Err(AdminError::NotRegistered(_))
        ));
    }

    #[test]
    fn test_failed_unregister_leaves_no_empty_entry() {
        let mut builder = RegistryBuilder::new();
        assert!(builder.unregister_view_options(&LIST_VIEW, "L").is_err());
        assert!(builder.unregister_plugin(&LIST_VIEW, &["a"]).is_err());
        assert!(!builder.state.view_options.contains_key(LIST_VIEW.name));
        assert!(!builder.state.plugins.contains_key(LIST_VIEW.name));

        builder.register_plugin(plugin("a"), &LIST_VIEW).unwrap();
        builder.unregister_plugin(&LIST_VIEW, &["a"]).unwrap();
        assert!(!builder.state.plugins.contains_key(LIST_VIEW.name));
    }
}
