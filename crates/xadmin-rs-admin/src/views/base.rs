//! `BaseAdminView`: the root of the view hierarchy.

use serde_json::{Map, Value};
use xadmin_rs_core::AdminResult;
use xadmin_rs_http::AdminResponse;
use xadmin_rs_template::{media, Context, Media};

use crate::hooks::Hook;
use crate::view::AdminView;
use crate::view_type::{ViewHandler, ViewType};

/// Request preconditions. Runs right after plugin activation.
pub static INIT_REQUEST: Hook<()> = Hook::new("init_request");
/// Per-request preparation once preconditions hold.
pub static SETUP_VIEW: Hook<()> = Hook::new("setup_view");
/// The GET (and HEAD) handler.
pub static GET: Hook<AdminResponse> = Hook::new("get");
/// The POST handler.
pub static POST: Hook<AdminResponse> = Hook::new("post");
/// Template variables.
pub static GET_CONTEXT: Hook<Context> = Hook::new("get_context");
/// Static assets.
pub static GET_MEDIA: Hook<Media> = Hook::new("get_media");

pub(crate) struct BaseHandler;

impl ViewHandler for BaseHandler {
    fn defaults(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("base_template".into(), "xadmin/base.html".into());
        map.insert("need_site_permission".into(), true.into());
        map
    }

    fn get_context(&self, _vt: &'static ViewType, view: &mut AdminView) -> AdminResult<Context> {
        let media = view.get_media()?;
        let static_url = view.site().settings().static_url.clone();
        Ok(Context::new()
            .with("view", view.view_type().name)
            .with("base_template", view.options.base_template.clone())
            .with("media", media.render(&static_url)))
    }
}

/// The root view type.
pub static BASE_ADMIN_VIEW: ViewType = ViewType::new("BaseAdminView", None, &BaseHandler);

impl AdminView {
    /// Handles GET through the `get` extension point.
    pub fn get(&mut self) -> AdminResult<AdminResponse> {
        self.call_hook(&GET, &(), |view, _| view.view_type().get(view))
    }

    /// Handles POST through the `post` extension point.
    pub fn post(&mut self) -> AdminResult<AdminResponse> {
        self.call_hook(&POST, &(), |view, _| view.view_type().post(view))
    }

    /// Builds the template context through the `get_context` extension point.
    pub fn get_context(&mut self) -> AdminResult<Context> {
        self.call_hook(&GET_CONTEXT, &(), |view, _| view.view_type().get_context(view))
    }

    /// Collects static assets through the `get_media` extension point.
    pub fn get_media(&mut self) -> AdminResult<Media> {
        self.call_hook(&GET_MEDIA, &(), |view, _| view.view_type().get_media(view))
    }

    /// Resolves vendor asset tags, minified unless the site runs in debug.
    pub fn vendor(&self, tags: &[&str]) -> AdminResult<Media> {
        media::vendor(tags, self.site().settings().debug)
    }
}
