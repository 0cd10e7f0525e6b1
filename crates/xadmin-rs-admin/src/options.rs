//! Option bundles and the resolved view configuration.
//!
//! An [`AdminOptions`] value is what an integrator registers for a model, a
//! view type, or a settings name: attributes, per-plugin override maps, and
//! hook overrides. A composed view resolves every contributing bundle into
//! one typed [`ViewContext`].

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use xadmin_rs_core::{AdminError, AdminResult, AdminSettings};

use crate::hooks::{option_hook_fn, Hook, Next, OptionHookFn};
use crate::view::AdminView;
use crate::view_type::ViewType;

#[derive(Clone)]
pub(crate) struct OptionHook {
    pub(crate) name: &'static str,
    pub(crate) handler: Arc<dyn Any + Send + Sync>,
}

impl OptionHook {
    pub(crate) fn typed<T: 'static, A: 'static>(&self) -> AdminResult<OptionHookFn<T, A>> {
        self.handler
            .downcast_ref::<OptionHookFn<T, A>>()
            .cloned()
            .ok_or_else(|| {
                AdminError::IncorrectPluginArg(format!(
                    "option override of '{}' does not match the signature of the extension point",
                    self.name
                ))
            })
    }
}

/// A named configuration bundle.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use xadmin_rs_admin::options::AdminOptions;
///
/// let options = AdminOptions::new("ArticleAdmin")
///     .attr("list_display", json!(["title", "status"]))
///     .attr("list_per_page", 20)
///     .plugin_override("filter", "free_query_filter", false);
///
/// assert_eq!(options.name(), "ArticleAdmin");
/// assert_eq!(options.get("list_per_page"), Some(&json!(20)));
/// assert_eq!(options.plugin_overrides()["filter"]["free_query_filter"], json!(false));
/// ```
#[derive(Clone)]
pub struct AdminOptions {
    name: String,
    attrs: Map<String, Value>,
    plugin_overrides: BTreeMap<String, Map<String, Value>>,
    hooks: Vec<OptionHook>,
}

impl AdminOptions {
    /// Creates an empty bundle.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Map::new(),
            plugin_overrides: BTreeMap::new(),
            hooks: Vec::new(),
        }
    }

    /// Sets an attribute.
    #[must_use]
    pub fn attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    /// Overrides one setting of the plugin with id `plugin`.
    #[must_use]
    pub fn plugin_override(
        mut self,
        plugin: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.plugin_overrides
            .entry(plugin.into())
            .or_default()
            .insert(key.into(), value.into());
        self
    }

    /// Wraps an extension point. The handler runs outside every plugin
    /// handler and decides whether to call `next`.
    #[must_use]
    pub fn hook<T, A, F>(mut self, hook: &Hook<T, A>, handler: F) -> Self
    where
        T: 'static,
        A: 'static,
        F: Fn(&mut AdminView, &A, Next<'_, T, A>) -> AdminResult<T> + Send + Sync + 'static,
    {
        let handler: OptionHookFn<T, A> = option_hook_fn(handler);
        self.hooks.push(OptionHook {
            name: hook.name(),
            handler: Arc::new(handler),
        });
        self
    }

    /// The bundle's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns an attribute.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attrs.get(key)
    }

    /// All attributes.
    pub const fn attrs(&self) -> &Map<String, Value> {
        &self.attrs
    }

    /// The explicit plugin override maps.
    pub const fn plugin_overrides(&self) -> &BTreeMap<String, Map<String, Value>> {
        &self.plugin_overrides
    }

    /// Returns `true` if the bundle overrides the named extension point.
    pub fn overrides(&self, hook: &str) -> bool {
        self.hooks.iter().any(|h| h.name == hook)
    }

    pub(crate) fn hooks_named<'a>(&'a self, hook: &'a str) -> impl Iterator<Item = &'a OptionHook> + 'a {
        self.hooks.iter().filter(move |h| h.name == hook)
    }

    /// Folds bundles, newest first, into one. Newer attributes and override
    /// entries replace older ones; hook overrides of every bundle are kept,
    /// the newest outermost.
    pub(crate) fn collapse(name: impl Into<String>, newest_first: &[Arc<Self>]) -> Self {
        let mut collapsed = Self::new(name);
        for options in newest_first.iter().rev() {
            collapsed.attrs.extend(options.attrs.clone());
            for (plugin, overrides) in &options.plugin_overrides {
                collapsed
                    .plugin_overrides
                    .entry(plugin.clone())
                    .or_default()
                    .extend(overrides.clone());
            }
        }
        collapsed.hooks = newest_first
            .iter()
            .flat_map(|o| o.hooks.iter().cloned())
            .collect();
        collapsed
    }
}

impl fmt::Debug for AdminOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminOptions")
            .field("name", &self.name)
            .field("attrs", &self.attrs)
            .field("plugin_overrides", &self.plugin_overrides)
            .field("hooks", &self.hooks.iter().map(|h| h.name).collect::<Vec<_>>())
            .finish()
    }
}

// ── Resolved configuration ───────────────────────────────────────────

/// The configuration a composed view runs with.
///
/// Resolved once per composition by layering, lowest precedence first: site
/// settings, each ancestor view type's defaults (outermost first), then
/// each option bundle's attributes (least specific first). Attributes with
/// no field here land in [`extra`](Self::extra).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewContext {
    pub base_template: String,
    pub need_site_permission: bool,
    pub site_title: String,
    pub site_footer: String,
    pub menu_template: String,
    pub default_model_icon: Option<String>,
    /// Model label (`app.model`) to icon class.
    pub global_models_icon: BTreeMap<String, String>,
    /// App label to menu title.
    pub apps_label_title: BTreeMap<String, String>,
    /// App label to icon class.
    pub apps_icons: BTreeMap<String, String>,
    pub model_icon: Option<String>,
    pub hidden_menu: bool,

    pub fields: Option<Vec<String>>,
    pub exclude: Vec<String>,
    pub ordering: Option<Vec<String>>,
    /// Actions (`view`, `add`, `change`, `delete`) this admin never grants.
    pub remove_permissions: Vec<String>,
    pub readonly_fields: Vec<String>,

    pub list_display: Vec<String>,
    pub list_display_links: Vec<String>,
    pub list_per_page: usize,
    pub list_max_show_all: usize,

    pub save_as: bool,
    pub save_on_top: bool,
    pub title: Option<String>,
    pub icon: Option<String>,

    pub object_list_template: Option<String>,
    pub add_form_template: Option<String>,
    pub change_form_template: Option<String>,
    pub delete_confirmation_template: Option<String>,
    pub detail_template: Option<String>,
    pub login_template: Option<String>,

    /// Attributes only plugins or integrator hooks read.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for ViewContext {
    fn default() -> Self {
        Self {
            base_template: "xadmin/base.html".to_string(),
            need_site_permission: true,
            site_title: String::new(),
            site_footer: String::new(),
            menu_template: "xadmin/includes/sitemenu_default.html".to_string(),
            default_model_icon: None,
            global_models_icon: BTreeMap::new(),
            apps_label_title: BTreeMap::new(),
            apps_icons: BTreeMap::new(),
            model_icon: None,
            hidden_menu: false,
            fields: None,
            exclude: Vec::new(),
            ordering: None,
            remove_permissions: Vec::new(),
            readonly_fields: Vec::new(),
            list_display: vec!["__str__".to_string()],
            list_display_links: Vec::new(),
            list_per_page: 50,
            list_max_show_all: 200,
            save_as: false,
            save_on_top: false,
            title: None,
            icon: None,
            object_list_template: None,
            add_form_template: None,
            change_form_template: None,
            delete_confirmation_template: None,
            detail_template: None,
            login_template: None,
            extra: Map::new(),
        }
    }
}

impl ViewContext {
    /// Resolves the configuration of `view_type` under `options`, given
    /// most specific first.
    ///
    /// # Errors
    ///
    /// `ImproperlyConfigured` when an attribute has the wrong type for its
    /// field.
    pub fn resolve(
        settings: &AdminSettings,
        view_type: &'static ViewType,
        options: &[Arc<AdminOptions>],
    ) -> AdminResult<Self> {
        let mut layered = Map::new();
        layered.insert("site_title".into(), settings.site_title.clone().into());
        layered.insert("site_footer".into(), settings.site_footer.clone().into());
        layered.insert(
            "default_model_icon".into(),
            settings.default_model_icon.clone().map_or(Value::Null, Value::String),
        );
        layered.insert("list_per_page".into(), settings.list_per_page.into());
        layered.insert("list_max_show_all".into(), settings.list_max_show_all.into());

        for vt in view_type.ancestors().into_iter().rev() {
            layered.extend(vt.handler.defaults());
        }
        for option in options.iter().rev() {
            layered.extend(option.attrs.clone());
        }

        serde_json::from_value(Value::Object(layered)).map_err(|e| {
            AdminError::ImproperlyConfigured(format!(
                "invalid option attribute for {}: {e}",
                view_type.name
            ))
        })
    }

    /// Reads an attribute from [`extra`](Self::extra).
    pub fn extra<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.extra
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// The attribute value as JSON, whether typed or extra.
    pub fn attr(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.extra.get(key) {
            return Some(value.clone());
        }
        match serde_json::to_value(self) {
            Ok(Value::Object(mut map)) => map.remove(key),
            _ => None,
        }
    }
}
