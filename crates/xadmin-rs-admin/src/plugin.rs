//! The plugin contract.
//!
//! A plugin is two things:
//!
//! - a type implementing [`AdminPlugin`], instantiated once per request and
//!   asked through [`AdminPlugin::init_request`] whether it is active;
//! - a [`PluginClass`] describing it to the registry: an id, an order, the
//!   default settings it reads, a factory, and the extension points and
//!   blocks it handles.
//!
//! # Examples
//!
//! ```
//! use serde::Deserialize;
//! use xadmin_rs_admin::hooks::Handler;
//! use xadmin_rs_admin::plugin::{AdminPlugin, PluginClass};
//! use xadmin_rs_admin::views::base::GET_MEDIA;
//! use xadmin_rs_admin::view::AdminView;
//! use xadmin_rs_core::AdminResult;
//! use xadmin_rs_template::Media;
//!
//! #[derive(Deserialize)]
//! struct ChartPlugin {
//!     chart_js: String,
//! }
//!
//! impl AdminPlugin for ChartPlugin {}
//!
//! fn media(plugin: &ChartPlugin, _view: &mut AdminView, media: Media, _: &()) -> AdminResult<Media> {
//!     Ok(media.js(plugin.chart_js.clone()))
//! }
//!
//! let class = PluginClass::builder("chart", |settings| settings.deserialize::<ChartPlugin>())
//!     .order(50)
//!     .setting("chart_js", "xadmin/js/xadmin.plugin.charts.js")
//!     .hook(&GET_MEDIA, Handler::Filter(media))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(class.id(), "chart");
//! assert_eq!(class.order(), 50);
//! assert!(class.handles("get_media"));
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use xadmin_rs_core::{AdminError, AdminResult};

use crate::hooks::{erase_block, BlockFn, ErasedBlockFn, Handler, Hook, HookEntry, DEFAULT_PRIORITY};
use crate::view::AdminView;

/// The default plugin order. Lower orders wrap further out.
pub const DEFAULT_ORDER: i32 = 100;

/// Object-safe access to [`Any`] for trait objects.
pub trait AsAny {
    /// Returns `self` as `&dyn Any`.
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A per-request plugin instance.
///
/// Both lifecycle methods have permissive defaults: a plugin that does not
/// override `init_request` is always active.
pub trait AdminPlugin: AsAny {
    /// Decides whether the plugin takes part in this request. Errors abort
    /// the request.
    fn init_request(&mut self, view: &mut AdminView) -> AdminResult<bool> {
        let _ = view;
        Ok(true)
    }

    /// One-time configuration after activation.
    fn setup(&mut self, view: &mut AdminView) -> AdminResult<()> {
        let _ = view;
        Ok(())
    }
}

// ── Settings ─────────────────────────────────────────────────────────

/// The resolved settings a plugin is instantiated from: the plugin's
/// defaults with option overrides applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PluginSettings(Map<String, Value>);

impl PluginSettings {
    /// Wraps a map.
    pub const fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Returns a raw value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns a typed value, or `default` when absent or of another type.
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.0
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or(default)
    }

    /// Deserializes every setting into `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> AdminResult<T> {
        serde_json::from_value(Value::Object(self.0.clone()))
            .map_err(|e| AdminError::ImproperlyConfigured(format!("invalid plugin settings: {e}")))
    }

    /// The underlying map.
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub(crate) fn set(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }
}

// ── Plugin classes ───────────────────────────────────────────────────

/// Builds a boxed plugin instance from its settings.
pub type PluginFactory = Arc<dyn Fn(&PluginSettings) -> AdminResult<Box<dyn AdminPlugin>> + Send + Sync>;

pub(crate) struct BlockEntry {
    pub(crate) name: String,
    pub(crate) priority: i32,
    pub(crate) render: ErasedBlockFn,
}

/// A registered plugin: everything the composer and dispatcher need to
/// know without instantiating it.
pub struct PluginClass {
    id: String,
    order: i32,
    defaults: Map<String, Value>,
    factory: PluginFactory,
    hooks: HashMap<&'static str, HookEntry>,
    blocks: Vec<BlockEntry>,
}

impl PluginClass {
    /// Starts describing a plugin of type `P`.
    pub fn builder<P, F>(id: impl Into<String>, factory: F) -> PluginClassBuilder<P>
    where
        P: AdminPlugin + 'static,
        F: Fn(&PluginSettings) -> AdminResult<P> + Send + Sync + 'static,
    {
        let factory: PluginFactory = Arc::new(move |settings: &PluginSettings| {
            let plugin: Box<dyn AdminPlugin> = Box::new(factory(settings)?);
            Ok(plugin)
        });
        PluginClassBuilder {
            id: id.into(),
            order: DEFAULT_ORDER,
            defaults: Map::new(),
            factory,
            hooks: HashMap::new(),
            blocks: Vec::new(),
            problems: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// The identifier used by option override maps and `unregister_plugin`.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The plugin's order.
    pub const fn order(&self) -> i32 {
        self.order
    }

    /// The settings the plugin declares, with their defaults.
    pub const fn defaults(&self) -> &Map<String, Value> {
        &self.defaults
    }

    /// Returns `true` if the plugin handles the named extension point.
    pub fn handles(&self, hook: &str) -> bool {
        self.hooks.contains_key(hook)
    }

    /// Names of the extension points the plugin handles, sorted.
    pub fn hook_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.hooks.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Names of the blocks the plugin renders into.
    pub fn block_names(&self) -> Vec<&str> {
        self.blocks.iter().map(|b| b.name.as_str()).collect()
    }

    /// Creates a fresh instance.
    pub fn instantiate(&self, settings: &PluginSettings) -> AdminResult<Box<dyn AdminPlugin>> {
        (self.factory)(settings)
    }

    pub(crate) fn hook_entry(&self, hook: &str) -> Option<&HookEntry> {
        self.hooks.get(hook)
    }

    pub(crate) fn blocks_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a BlockEntry> + 'a {
        self.blocks.iter().filter(move |b| b.name == name)
    }
}

impl fmt::Debug for PluginClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginClass")
            .field("id", &self.id)
            .field("order", &self.order)
            .field("defaults", &self.defaults)
            .field("hooks", &self.hook_names())
            .field("blocks", &self.block_names())
            .finish_non_exhaustive()
    }
}

/// Builder for [`PluginClass`].
pub struct PluginClassBuilder<P> {
    id: String,
    order: i32,
    defaults: Map<String, Value>,
    factory: PluginFactory,
    hooks: HashMap<&'static str, HookEntry>,
    blocks: Vec<BlockEntry>,
    problems: Vec<String>,
    _marker: PhantomData<fn() -> P>,
}

impl<P: AdminPlugin + 'static> PluginClassBuilder<P> {
    /// Sets the order.
    #[must_use]
    pub const fn order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// Declares a setting and its default. Option attributes with the same
    /// name override it during composition.
    #[must_use]
    pub fn setting(mut self, key: impl Into<String>, default: impl Into<Value>) -> Self {
        self.defaults.insert(key.into(), default.into());
        self
    }

    /// Handles an extension point at the default priority.
    #[must_use]
    pub fn hook<T: 'static, A: 'static>(self, hook: &Hook<T, A>, handler: Handler<P, T, A>) -> Self {
        self.hook_with_priority(hook, DEFAULT_PRIORITY, handler)
    }

    /// Handles an extension point. Among one plugin's peers with the same
    /// order, lower priorities wrap further out.
    #[must_use]
    pub fn hook_with_priority<T: 'static, A: 'static>(
        mut self,
        hook: &Hook<T, A>,
        priority: i32,
        handler: Handler<P, T, A>,
    ) -> Self {
        if self.hooks.contains_key(hook.name()) {
            self.problems
                .push(format!("'{}' is handled more than once", hook.name()));
            return self;
        }
        let erased = handler.erase(&self.id, hook.name());
        self.hooks.insert(
            hook.name(),
            HookEntry {
                priority,
                handler: Box::new(erased),
            },
        );
        self
    }

    /// Renders into a named block at the default priority.
    #[must_use]
    pub fn block(self, name: &str, render: BlockFn<P>) -> Self {
        self.block_with_priority(name, DEFAULT_PRIORITY, render)
    }

    /// Renders into a named block. Higher priorities render first.
    #[must_use]
    pub fn block_with_priority(mut self, name: &str, priority: i32, render: BlockFn<P>) -> Self {
        let render = erase_block(render, &self.id, name);
        self.blocks.push(BlockEntry {
            name: name.to_string(),
            priority,
            render,
        });
        self
    }

    /// Finishes the description.
    ///
    /// # Errors
    ///
    /// `ImproperlyConfigured` for an empty id or an extension point handled
    /// twice.
    pub fn build(self) -> AdminResult<PluginClass> {
        if self.id.trim().is_empty() {
            return Err(AdminError::ImproperlyConfigured(
                "a plugin needs a non-empty id".into(),
            ));
        }
        if !self.problems.is_empty() {
            return Err(AdminError::ImproperlyConfigured(format!(
                "plugin '{}': {}",
                self.id,
                self.problems.join("; ")
            )));
        }
        Ok(PluginClass {
            id: self.id,
            order: self.order,
            defaults: self.defaults,
            factory: self.factory,
            hooks: self.hooks,
            blocks: self.blocks,
        })
    }
}

impl<P> fmt::Debug for PluginClassBuilder<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginClassBuilder")
            .field("id", &self.id)
            .field("order", &self.order)
            .finish_non_exhaustive()
    }
}

/// A plugin class paired with the settings resolved for one composed view.
#[derive(Debug, Clone)]
pub struct MergedPlugin {
    pub(crate) class: Arc<PluginClass>,
    pub(crate) settings: PluginSettings,
}

impl MergedPlugin {
    /// The plugin class.
    pub fn class(&self) -> &Arc<PluginClass> {
        &self.class
    }

    /// The resolved settings.
    pub const fn settings(&self) -> &PluginSettings {
        &self.settings
    }

    /// Shorthand for `class().id()`.
    pub fn id(&self) -> &str {
        self.class.id()
    }

    /// Shorthand for `class().order()`.
    pub fn order(&self) -> i32 {
        self.class.order()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::views::base::GET_MEDIA;
    use xadmin_rs_template::Media;

    struct Noop;

    impl AdminPlugin for Noop {}

    fn add_js(_: &Noop, _: &mut AdminView, media: Media, _: &()) -> AdminResult<Media> {
        Ok(media.js("x.js"))
    }

    #[test]
    fn test_builder_defaults() {
        let class = PluginClass::builder("noop", |_| Ok(Noop)).build().unwrap();
        assert_eq!(class.order(), DEFAULT_ORDER);
        assert!(class.hook_names().is_empty());
        assert!(class.defaults().is_empty());
    }

    #[test]
    fn test_empty_id_rejected() {
        let err = PluginClass::builder(" ", |_| Ok(Noop)).build().unwrap_err();
        assert!(matches!(err, AdminError::ImproperlyConfigured(_)));
    }

    #[test]
    fn test_duplicate_hook_rejected() {
        let err = PluginClass::builder("noop", |_| Ok(Noop))
            .hook(&GET_MEDIA, Handler::Filter(add_js))
            .hook(&GET_MEDIA, Handler::Filter(add_js))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("get_media"));
    }

    #[test]
    fn test_instantiate_downcasts() {
        let class = PluginClass::builder("noop", |_| Ok(Noop)).build().unwrap();
        let instance = class.instantiate(&PluginSettings::default()).unwrap();
        assert!(instance.as_ref().as_any().downcast_ref::<Noop>().is_some());
    }

    #[test]
    fn test_settings_access() {
        let mut map = Map::new();
        map.insert("per_page".into(), json!(20));
        map.insert("label".into(), json!("x"));
        let settings = PluginSettings::new(map);
        assert_eq!(settings.get_or("per_page", 0_usize), 20);
        assert_eq!(settings.get_or("label", 0_usize), 0);
        assert_eq!(settings.get_or("missing", 7_usize), 7);

        #[derive(serde::Deserialize)]
        struct Typed {
            per_page: usize,
        }
        assert_eq!(settings.deserialize::<Typed>().unwrap().per_page, 20);
    }

    #[test]
    fn test_debug_lists_hooks() {
        let class = PluginClass::builder("noop", |_| Ok(Noop))
            .hook(&GET_MEDIA, Handler::Filter(add_js))
            .build()
            .unwrap();
        assert!(format!("{class:?}").contains("get_media"));
    }
}
