//! The class composer.
//!
//! Composition turns a view type plus the registered option bundles that
//! apply to it into one [`ComposedView`]: the ordered bundle list, the
//! resolved [`ViewContext`], and the plugins with their merged settings.
//! Results are cached under the model label plus the separated bundle
//! names, so a second request for the same view type and model returns the
//! same `Arc`.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;
use xadmin_rs_core::{AdminResult, AdminSettings};
use xadmin_rs_db::ModelMeta;

use crate::options::{AdminOptions, ViewContext};
use crate::plugin::{MergedPlugin, PluginClass, PluginSettings};
use crate::registry::Registry;
use crate::view_type::ViewType;

/// Separates the parts of a cache key; never valid inside a name.
const KEY_SEP: &str = "\u{1f}";

/// A view type merged with its option bundles.
#[derive(Debug)]
pub struct ComposedView {
    view_type: &'static ViewType,
    model: Option<Arc<ModelMeta>>,
    model_order: Option<usize>,
    merge_name: String,
    options: Vec<Arc<AdminOptions>>,
    context: ViewContext,
    plugin_classes: Vec<MergedPlugin>,
}

impl ComposedView {
    /// The original view type.
    pub const fn view_type(&self) -> &'static ViewType {
        self.view_type
    }

    /// The model, for model views.
    pub const fn model(&self) -> Option<&Arc<ModelMeta>> {
        self.model.as_ref()
    }

    /// Registration order of the model.
    pub const fn model_order(&self) -> Option<usize> {
        self.model_order
    }

    /// Every contributing name concatenated, most specific first.
    pub fn merge_name(&self) -> &str {
        &self.merge_name
    }

    /// Contributing bundles, most specific first.
    pub fn options(&self) -> &[Arc<AdminOptions>] {
        &self.options
    }

    /// The resolved configuration.
    pub const fn context(&self) -> &ViewContext {
        &self.context
    }

    /// Plugins with merged settings, most derived view level first and
    /// registration order within a level.
    pub fn plugin_classes(&self) -> &[MergedPlugin] {
        &self.plugin_classes
    }
}

/// Composes views and caches the results.
#[derive(Debug, Default)]
pub struct Composer {
    views: RwLock<HashMap<String, Arc<ComposedView>>>,
    merged_plugins: RwLock<HashMap<String, PluginSettings>>,
}

impl Composer {
    /// An empty composer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Composes `view_type` for the model labelled `model`, or for no model.
    ///
    /// # Errors
    ///
    /// `NotRegistered` for an unknown model, `ImproperlyConfigured` when an
    /// attribute does not fit the resolved configuration.
    pub fn compose(
        &self,
        registry: &Registry,
        settings: &AdminSettings,
        view_type: &'static ViewType,
        model: Option<&str>,
    ) -> AdminResult<Arc<ComposedView>> {
        let model_admin = model.map(|label| registry.get_registry(label)).transpose()?;

        let mut names: Vec<String> = Vec::new();
        let mut options: Vec<Arc<AdminOptions>> = Vec::new();
        if let Some(admin) = model_admin {
            names.push(admin.options().name().to_string());
            options.push(Arc::clone(admin.options()));
        }

        let mut plugin_levels: Vec<(&'static ViewType, usize)> = Vec::new();
        for vt in view_type.ancestors() {
            for opt in registry.view_options(vt) {
                names.push(opt.name().to_string());
                options.push(Arc::clone(opt));
            }
            if let Some(key) = settings_key(registry, vt.name) {
                for opt in registry.settings_options(&key) {
                    names.push(opt.name().to_string());
                    options.push(Arc::clone(opt));
                }
            }
            names.push(vt.name.to_string());
            plugin_levels.push((vt, options.len()));
        }
        let merge_name = names.concat();
        let label = model.unwrap_or("");
        let cache_key = format!("{label}{KEY_SEP}{}", names.join(KEY_SEP));

        if let Some(hit) = self
            .views
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&cache_key)
        {
            return Ok(Arc::clone(hit));
        }

        let context = ViewContext::resolve(settings, view_type, &options)?;
        let mut plugin_classes = Vec::new();
        for (vt, visible) in plugin_levels {
            for class in registry.plugins(vt) {
                plugin_classes.push(self.merge_plugin(label, class, &options[..visible]));
            }
        }

        let composed = Arc::new(ComposedView {
            view_type,
            model: model_admin.map(|m| Arc::clone(m.meta())),
            model_order: model_admin.map(crate::registry::ModelAdmin::order),
            merge_name,
            options,
            context,
            plugin_classes,
        });
        tracing::debug!(
            view = view_type.name,
            model = model.unwrap_or(""),
            plugins = composed.plugin_classes.len(),
            "composed view"
        );
        self.views
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(cache_key, Arc::clone(&composed));
        Ok(composed)
    }

    /// Resolves a plugin's settings against the bundles visible at its
    /// level, given most specific first.
    ///
    /// Defaults come first; then each bundle's override map for the plugin,
    /// least specific first; then each bundle's attributes named like a
    /// declared setting, least specific first. An attribute whose JSON type
    /// differs from a non-null default is ignored.
    fn merge_plugin(
        &self,
        label: &str,
        class: &Arc<PluginClass>,
        options: &[Arc<AdminOptions>],
    ) -> MergedPlugin {
        let key = format!(
            "{}{KEY_SEP}{label}{KEY_SEP}{}",
            class.id(),
            options.iter().map(|o| o.name()).collect::<Vec<_>>().join(KEY_SEP)
        );
        if let Some(settings) = self
            .merged_plugins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return MergedPlugin {
                class: Arc::clone(class),
                settings: settings.clone(),
            };
        }

        let defaults = class.defaults();
        let mut settings = PluginSettings::new(defaults.clone());
        for option in options.iter().rev() {
            if let Some(overrides) = option.plugin_overrides().get(class.id()) {
                for (k, v) in overrides {
                    settings.set(k.clone(), v.clone());
                }
            }
        }
        for option in options.iter().rev() {
            for (k, v) in option.attrs() {
                let Some(default) = defaults.get(k) else {
                    continue;
                };
                if compatible(default, v) {
                    settings.set(k.clone(), v.clone());
                } else {
                    tracing::warn!(
                        plugin = class.id(),
                        attr = %k,
                        option = option.name(),
                        "ignoring option attribute of a different type than the plugin setting"
                    );
                }
            }
        }

        self.merged_plugins
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, settings.clone());
        MergedPlugin {
            class: Arc::clone(class),
            settings,
        }
    }

    /// Drops every cached composition and merged plugin.
    pub fn clear_cache(&self) {
        self.views.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.merged_plugins
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of cached compositions.
    pub fn cached_views(&self) -> usize {
        self.views.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// The settings name for a view type: its lowercase name, or that name
/// without a trailing `admin` or `adminview`, whichever is registered.
fn settings_key(registry: &Registry, view_name: &str) -> Option<String> {
    let lower = view_name.to_lowercase();
    let candidates = [
        Some(lower.as_str()),
        lower.strip_suffix("admin"),
        lower.strip_suffix("adminview"),
    ];
    let found = candidates
        .into_iter()
        .flatten()
        .find(|name| !registry.settings_options(name).is_empty())
        .map(ToString::to_string);
    found
}

fn compatible(default: &Value, value: &Value) -> bool {
    default.is_null()
        || value.is_null()
        || matches!(
            (default, value),
            (Value::Bool(_), Value::Bool(_))
                | (Value::Number(_), Value::Number(_))
                | (Value::String(_), Value::String(_))
                | (Value::Array(_), Value::Array(_))
                | (Value::Object(_), Value::Object(_))
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::plugin::AdminPlugin;
    use crate::registry::RegistryBuilder;
    use crate::views::{COMM_ADMIN_VIEW, LIST_VIEW, MODEL_ADMIN_VIEW};

    struct Counter;
    impl AdminPlugin for Counter {}

    fn counter(id: &str) -> PluginClass {
        PluginClass::builder(id, |_| Ok(Counter))
            .setting("per_page", 10)
            .setting("label", "rows")
            .setting("anything", Value::Null)
            .build()
            .unwrap()
    }

    fn article() -> ModelMeta {
        ModelMeta::new("blog", "Article")
    }

    #[test]
    fn test_compose_is_cached() {
        let mut builder = RegistryBuilder::new();
        builder.register(article(), AdminOptions::new("ArticleAdmin")).unwrap();
        let registry = builder.build();
        let composer = Composer::new();
        let settings = AdminSettings::default();
        let a = composer.compose(&registry, &settings, &LIST_VIEW, Some("blog.article")).unwrap();
        let b = composer.compose(&registry, &settings, &LIST_VIEW, Some("blog.article")).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(composer.cached_views(), 1);
        composer.clear_cache();
        let c = composer.compose(&registry, &settings, &LIST_VIEW, Some("blog.article")).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_merge_name_and_option_order() {
        let mut builder = RegistryBuilder::new();
        builder.register(article(), AdminOptions::new("ArticleAdmin")).unwrap();
        builder
            .register_view_options(&MODEL_ADMIN_VIEW, AdminOptions::new("ModelDefaults"))
            .unwrap();
        builder.register_settings("comm", AdminOptions::new("CommSettings")).unwrap();
        let registry = builder.build();
        let composed = Composer::new()
            .compose(&registry, &AdminSettings::default(), &LIST_VIEW, Some("blog.article"))
            .unwrap();
        assert_eq!(
            composed.merge_name(),
            "blogarticleAdminListAdminViewModelDefaultsModelAdminViewCommSettingsCommAdminViewBaseAdminView"
        );
        let names: Vec<_> = composed.options().iter().map(|o| o.name().to_string()).collect();
        assert_eq!(names, ["blogarticleAdmin", "ModelDefaults", "CommSettings"]);
    }

    #[test]
    fn test_cache_keys_do_not_collide_across_models() {
        let mut builder = RegistryBuilder::new();
        builder
            .register(ModelMeta::new("ab", "C"), AdminOptions::new("AbC").attr("list_per_page", 7))
            .unwrap();
        builder
            .register(ModelMeta::new("a", "Bc"), AdminOptions::new("ABc").attr("list_per_page", 3))
            .unwrap();
        builder.register_plugin(counter("counter"), &LIST_VIEW).unwrap();
        let registry = builder.build();
        let composer = Composer::new();
        let settings = AdminSettings::default();
        let first = composer.compose(&registry, &settings, &LIST_VIEW, Some("ab.c")).unwrap();
        let second = composer.compose(&registry, &settings, &LIST_VIEW, Some("a.bc")).unwrap();

        assert_eq!(first.merge_name(), second.merge_name());
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(composer.cached_views(), 2);
        assert_eq!(first.model().unwrap().label(), "ab.c");
        assert_eq!(second.model().unwrap().label(), "a.bc");
        assert_eq!(first.context().list_per_page, 7);
        assert_eq!(second.context().list_per_page, 3);
    }

    #[test]
    fn test_unknown_model() {
        let registry = RegistryBuilder::new().build();
        let err = Composer::new()
            .compose(&registry, &AdminSettings::default(), &LIST_VIEW, Some("blog.article"))
            .unwrap_err();
        assert!(matches!(err, xadmin_rs_core::AdminError::NotRegistered(_)));
    }

    #[test]
    fn test_plugin_settings_merge() {
        let mut builder = RegistryBuilder::new();
        builder
            .register(
                article(),
                AdminOptions::new("ArticleAdmin")
                    .attr("per_page", 25)
                    .attr("label", 3)
                    .attr("anything", json!(["x"]))
                    .attr("unrelated", true)
                    .plugin_override("counter", "label", "entries")
                    .plugin_override("counter", "per_page", 99),
            )
            .unwrap();
        builder.register_plugin(counter("counter"), &COMM_ADMIN_VIEW).unwrap();
        let registry = builder.build();
        let composed = Composer::new()
            .compose(&registry, &AdminSettings::default(), &LIST_VIEW, Some("blog.article"))
            .unwrap();
        let merged = &composed.plugin_classes()[0];
        let settings = merged.settings().as_map();
        assert_eq!(settings["per_page"], json!(25));
        assert_eq!(settings["label"], json!("entries"));
        assert_eq!(settings["anything"], json!(["x"]));
        assert!(!settings.contains_key("unrelated"));
    }

    #[test]
    fn test_plugins_listed_most_derived_level_first() {
        let mut builder = RegistryBuilder::new();
        builder.register_plugin(counter("base"), &COMM_ADMIN_VIEW).unwrap();
        builder.register_plugin(counter("list"), &LIST_VIEW).unwrap();
        builder.register(article(), AdminOptions::new("A")).unwrap();
        let registry = builder.build();
        let composed = Composer::new()
            .compose(&registry, &AdminSettings::default(), &LIST_VIEW, Some("blog.article"))
            .unwrap();
        let ids: Vec<_> = composed.plugin_classes().iter().map(MergedPlugin::id).collect();
        assert_eq!(ids, ["list", "base"]);
    }

    #[test]
    fn test_settings_key_suffix_stripping() {
        let mut builder = RegistryBuilder::new();
        builder.register_settings("list", AdminOptions::new("S")).unwrap();
        let registry = builder.build();
        assert_eq!(settings_key(&registry, "ListAdminView").as_deref(), Some("list"));
        assert_eq!(settings_key(&registry, "CommAdminView"), None);
    }
}
