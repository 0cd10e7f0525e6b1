//! The per-request view instance.
//!
//! An [`AdminView`] is built from a [`ComposedView`] for exactly one
//! request. [`AdminView::setup`] activates plugins and runs the
//! `init_request` and `setup_view` extension points;
//! [`AdminView::dispatch`] then routes by method.
//!
//! Every hooked entry point goes through [`AdminView::call_hook`], which
//! wraps the view type's base implementation in the option overrides and
//! active plugin handlers for that extension point. The entry points
//! themselves are defined next to their view types in [`crate::views`].

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use serde_json::{json, Map, Value};
use xadmin_rs_auth::{check_permission, permissions::get_model_perm, Action, AdminUser};
use xadmin_rs_core::text::escape_html;
use xadmin_rs_core::{AdminError, AdminResult};
use xadmin_rs_db::{ActionFlag, LogEntry, ModelMeta, ModelStore, Record};
use xadmin_rs_http::{AdminRequest, AdminResponse, MessageLevel};
use xadmin_rs_template::Context;

use crate::composer::ComposedView;
use crate::hooks::{link, run_chain, Hook, Link, DEFAULT_PRIORITY};
use crate::manager::{init_plugins, ActivePlugin};
use crate::options::ViewContext;
use crate::plugin::AdminPlugin;
use crate::site::AdminSite;
use crate::view_type::ViewType;
use crate::views::base::{INIT_REQUEST, SETUP_VIEW};

/// One view handling one request.
pub struct AdminView {
    pub(crate) site: Arc<AdminSite>,
    pub(crate) composed: Arc<ComposedView>,
    /// The request being handled.
    pub request: AdminRequest,
    /// Lowercase HTTP method.
    pub request_method: String,
    /// The acting principal.
    pub user: AdminUser,
    /// Positional URL captures.
    pub args: Vec<String>,
    /// This request's copy of the resolved configuration.
    pub options: ViewContext,
    /// The model, for model views.
    pub model: Option<Arc<ModelMeta>>,
    pub(crate) plugins: Vec<ActivePlugin>,
    extensions: http::Extensions,
}

impl AdminView {
    pub(crate) fn new(
        site: Arc<AdminSite>,
        composed: Arc<ComposedView>,
        request: AdminRequest,
        args: Vec<String>,
    ) -> Self {
        Self {
            request_method: request.method_name(),
            user: request.user().clone(),
            options: composed.context().clone(),
            model: composed.model().cloned(),
            site,
            composed,
            request,
            args,
            plugins: Vec::new(),
            extensions: http::Extensions::new(),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Activates plugins, then runs `init_request` and `setup_view`.
    ///
    /// Plugin activation itself is not an extension point. An error from
    /// any phase aborts the request before a response exists.
    pub fn setup(&mut self) -> AdminResult<()> {
        let composed = Arc::clone(&self.composed);
        self.plugins = init_plugins(self, composed.plugin_classes())?;
        self.call_hook(&INIT_REQUEST, &(), |view, ()| view.view_type().init_request(view))?;
        self.call_hook(&SETUP_VIEW, &(), |view, ()| view.view_type().setup_view(view))
    }

    /// Routes the request to the hooked `get` or `post` entry point.
    pub fn dispatch(&mut self) -> AdminResult<AdminResponse> {
        match self.request_method.as_str() {
            "get" | "head" => self.get(),
            "post" => self.post(),
            other => Err(AdminError::MethodNotAllowed(format!(
                "{} does not accept {}",
                self.view_type().name,
                other.to_uppercase()
            ))),
        }
    }

    // ── Hook dispatch ────────────────────────────────────────────────

    /// Runs an extension point: option overrides (most specific outermost),
    /// then active plugin handlers (lowest order outermost, then lowest
    /// priority), then `base`.
    pub fn call_hook<T, A>(
        &mut self,
        hook: &Hook<T, A>,
        args: &A,
        mut base: impl FnMut(&mut Self, &A) -> AdminResult<T>,
    ) -> AdminResult<T>
    where
        T: 'static,
        A: 'static,
    {
        let links = self.links(hook)?;
        if !links.is_empty() {
            tracing::trace!(hook = hook.name(), links = links.len(), "dispatching hook");
        }
        run_chain(&links, self, args, &mut base)
    }

    fn links<T: 'static, A: 'static>(&self, hook: &Hook<T, A>) -> AdminResult<Vec<Link<T, A>>> {
        let name = hook.name();
        let mut links = Vec::new();

        for option in self.composed.options() {
            for entry in option.hooks_named(name) {
                let handler = entry.typed::<T, A>()?;
                let option_name = option.name().to_string();
                links.push(link(move |view: &mut Self, args: &A, next| {
                    tracing::trace!(hook = name, option = %option_name, "running option override");
                    handler(view, args, next)
                }));
            }
        }

        let mut handlers = Vec::new();
        for plugin in &self.plugins {
            if let Some(entry) = plugin.class().hook_entry(name) {
                handlers.push((entry.priority, plugin, entry));
            }
        }
        handlers.sort_by_key(|(priority, _, _)| *priority);

        for (_, plugin, entry) in handlers {
            let handler = entry.typed::<T, A>(plugin.id(), name)?;
            let instance = plugin.shared();
            let plugin_id = plugin.id().to_string();
            links.push(link(move |view: &mut Self, args: &A, next| {
                tracing::trace!(hook = name, plugin = %plugin_id, "running plugin hook");
                handler(instance.as_ref(), view, args, next)
            }));
        }
        Ok(links)
    }

    /// Renders a template block: the view type's own fragment and every
    /// active plugin's, by descending priority with the view first among
    /// equals, concatenated.
    pub fn render_block(&mut self, name: &str, context: &Context) -> AdminResult<String> {
        type Source = Option<(Rc<dyn AdminPlugin>, crate::hooks::ErasedBlockFn)>;
        let mut sources: Vec<(i32, Source)> = vec![(DEFAULT_PRIORITY, None)];
        for plugin in &self.plugins {
            for block in plugin.class().blocks_named(name) {
                sources.push((block.priority, Some((plugin.shared(), Arc::clone(&block.render)))));
            }
        }
        sources.sort_by_key(|(priority, _)| std::cmp::Reverse(*priority));

        let mut nodes = Vec::new();
        for (_, source) in sources {
            let fragment = match source {
                None => self.view_type().block(self, name, context, &mut nodes)?,
                Some((plugin, render)) => render(plugin.as_ref(), self, context, &mut nodes)?,
            };
            if let Some(fragment) = fragment {
                nodes.push(fragment);
            }
        }
        Ok(nodes.concat())
    }

    // ── Accessors ────────────────────────────────────────────────────

    /// The site serving this view.
    pub fn site(&self) -> &Arc<AdminSite> {
        &self.site
    }

    /// The composed view this instance was built from.
    pub fn composed(&self) -> &Arc<ComposedView> {
        &self.composed
    }

    /// The view type.
    pub fn view_type(&self) -> &'static ViewType {
        self.composed.view_type()
    }

    /// Active plugins, ascending by order.
    pub fn plugins(&self) -> &[ActivePlugin] {
        &self.plugins
    }

    /// The first active plugin of type `P`.
    pub fn plugin<P: AdminPlugin + 'static>(&self) -> Option<&P> {
        self.plugins.iter().find_map(ActivePlugin::downcast::<P>)
    }

    /// Returns `true` if the plugin with this id is active.
    pub fn has_plugin(&self, id: &str) -> bool {
        self.plugins.iter().any(|p| p.id() == id)
    }

    /// The model, or `ImproperlyConfigured` for views without one.
    pub fn opts(&self) -> AdminResult<Arc<ModelMeta>> {
        self.model.clone().ok_or_else(|| {
            AdminError::ImproperlyConfigured(format!("{} needs a model", self.view_type().name))
        })
    }

    /// The record store.
    pub fn store(&self) -> Arc<dyn ModelStore> {
        self.site.store()
    }

    // ── Request-scoped state ─────────────────────────────────────────

    /// State stored for the rest of the request.
    pub fn state<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions.get::<T>()
    }

    /// Mutable state.
    pub fn state_mut<T: Send + Sync + 'static>(&mut self) -> Option<&mut T> {
        self.extensions.get_mut::<T>()
    }

    /// Stores state, replacing a previous value of the same type.
    pub fn insert_state<T: Clone + Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.extensions.insert(value)
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn merged_params(&self, new_params: &[(&str, Option<&str>)], remove: &[&str]) -> AdminResult<xadmin_rs_http::QueryDict> {
        let mut params = self.request.get().copy();
        params.remove_where(|key| remove.iter().any(|prefix| key.starts_with(prefix)))?;
        for (key, value) in new_params {
            match value {
                Some(value) => params.set(key, value)?,
                None => {
                    params.remove(key)?;
                }
            }
        }
        Ok(params)
    }

    /// The current GET parameters with `new_params` applied (`None`
    /// removes a key) and every key starting with a `remove` prefix
    /// dropped, as `?query`.
    pub fn get_query_string(&self, new_params: &[(&str, Option<&str>)], remove: &[&str]) -> AdminResult<String> {
        Ok(format!("?{}", self.merged_params(new_params, remove)?.urlencode()))
    }

    /// The same parameters as hidden form inputs. Empty values are skipped.
    pub fn get_form_params(&self, new_params: &[(&str, Option<&str>)], remove: &[&str]) -> AdminResult<String> {
        let params = self.merged_params(new_params, remove)?;
        Ok(params
            .items()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| {
                format!(
                    r#"<input type="hidden" name="{}" value="{}"/>"#,
                    escape_html(k),
                    escape_html(v)
                )
            })
            .collect())
    }

    /// Reverses a site URL name.
    pub fn get_admin_url(&self, name: &str, args: &[&str]) -> AdminResult<String> {
        self.site.reverse(name, args)
    }

    /// Reverses `<app>_<model>_<name>`.
    pub fn get_model_url(&self, meta: &ModelMeta, name: &str, args: &[&str]) -> AdminResult<String> {
        self.get_admin_url(&format!("{}_{}_{}", meta.app_label, meta.model_name, name), args)
    }

    /// The full permission name for an action on a model.
    pub fn get_model_perm(&self, meta: &ModelMeta, action: &Action) -> String {
        get_model_perm(meta, action)
    }

    /// Whether the user may perform `action` on `meta`.
    pub fn has_model_perm(&self, meta: &ModelMeta, action: &Action) -> bool {
        check_permission(&self.user, meta, action)
    }

    /// Queues a flash message.
    pub fn message_user(&self, message: impl Into<String>, level: MessageLevel) {
        self.request.session().add_message(level, message);
    }

    /// A structured-data response.
    pub fn render_response(&self, content: Value) -> AdminResponse {
        AdminResponse::json(content)
    }

    /// Records an admin action in the log store.
    pub fn log(&self, flag: ActionFlag, message: impl Into<String>, obj: Option<&Record>) -> LogEntry {
        let mut entry =
            LogEntry::new(flag, self.user.id, message).ip_addr(self.request.remote_addr().map(str::to_string));
        if let (Some(obj), Some(meta)) = (obj, self.model.as_deref()) {
            entry = entry.object(
                meta.label(),
                obj.pk_string(meta).unwrap_or_default(),
                obj.display(meta),
            );
        }
        self.site.log_store().log(entry)
    }

    /// A template response with the declared blocks rendered into
    /// `blocks` and pending flash messages under `messages`.
    pub fn template_response(&mut self, templates: Vec<String>, mut context: Context) -> AdminResult<AdminResponse> {
        let mut blocks = Map::new();
        for name in self.view_type().declared_blocks() {
            let html = self.render_block(name, &context)?;
            if !html.is_empty() {
                blocks.insert(name.to_string(), Value::String(html));
            }
        }
        context.insert("blocks", Value::Object(blocks));
        let messages: Vec<Value> = self
            .request
            .session()
            .take_messages()
            .into_iter()
            .map(|m| json!({"text": m.text, "tags": m.tags, "level": m.level.tag()}))
            .collect();
        context.insert("messages", messages);
        Ok(AdminResponse::template(templates, context))
    }
}

impl fmt::Debug for AdminView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminView")
            .field("view", &self.view_type().name)
            .field("model", &self.model.as_ref().map(|m| m.label()))
            .field("method", &self.request_method)
            .field("path", &self.request.path())
            .field("plugins", &self.plugins)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::plugin::PluginClass;
    use crate::views::testing::{admin, blog_builder, site_from};
    use crate::views::{COMM_ADMIN_VIEW, INDEX_VIEW};

    struct Stamp;
    impl AdminPlugin for Stamp {}

    fn index_view(plugin: PluginClass) -> AdminView {
        let mut builder = blog_builder();
        builder.register_plugin(plugin, &COMM_ADMIN_VIEW).unwrap();
        let site = site_from(builder);
        site.get_view(&INDEX_VIEW, None, admin().get("/xadmin/"), Vec::new())
            .unwrap()
    }

    #[test]
    fn test_render_block_by_descending_priority() {
        let class = PluginClass::builder("stamp", |_| Ok(Stamp))
            .block_with_priority("extra", 5, |_, _, _, nodes| Ok(Some(format!("low{}", nodes.len()))))
            .block_with_priority("extra", 20, |_, _, _, nodes| Ok(Some(format!("high{}", nodes.len()))))
            .block("extra", |_, _, _, nodes| Ok(Some(format!("mid{}", nodes.len()))))
            .build()
            .unwrap();
        let mut view = index_view(class);
        let html = view.render_block("extra", &Context::new()).unwrap();
        assert_eq!(html, "high0mid1low2");
    }

    #[test]
    fn test_render_block_skips_empty_fragments() {
        let class = PluginClass::builder("stamp", |_| Ok(Stamp))
            .block("extra", |_, _, _, _| Ok(None))
            .block_with_priority("extra", 1, |_, _, _, nodes| Ok(Some(nodes.concat() + "tail")))
            .build()
            .unwrap();
        let mut view = index_view(class);
        assert_eq!(view.render_block("extra", &Context::new()).unwrap(), "tail");
        assert_eq!(view.render_block("other", &Context::new()).unwrap(), "");
    }
}
