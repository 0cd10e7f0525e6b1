//! View types.
//!
//! A [`ViewType`] is a node in a single-inheritance hierarchy of admin
//! screens. Each node names its parent and a [`ViewHandler`] holding the
//! base implementations of its extension points. A handler that does not
//! override a method inherits the parent's behavior.
//!
//! The methods on [`ViewType`] run only the base implementation. The hooked
//! entry points that plugins and options wrap live on
//! [`AdminView`](crate::view::AdminView).

use std::fmt;

use serde_json::{Map, Value};
use xadmin_rs_core::{AdminError, AdminResult};
use xadmin_rs_http::AdminResponse;
use xadmin_rs_template::{Context, Media};

use crate::view::AdminView;

/// Base implementations for one view type.
///
/// Every method receives the [`ViewType`] it was reached through so the
/// default can continue with that type's parent.
pub trait ViewHandler: Send + Sync {
    /// Option attributes this level contributes before any option class.
    fn defaults(&self) -> Map<String, Value> {
        Map::new()
    }

    /// Template blocks this level declares.
    fn block_names(&self) -> &'static [&'static str] {
        &[]
    }

    /// Request-level preconditions, typically permission checks.
    fn init_request(&self, vt: &'static ViewType, view: &mut AdminView) -> AdminResult<()> {
        vt.parent.map_or(Ok(()), |p| p.init_request(view))
    }

    /// Per-request state that needs the active plugins.
    fn setup_view(&self, vt: &'static ViewType, view: &mut AdminView) -> AdminResult<()> {
        vt.parent.map_or(Ok(()), |p| p.setup_view(view))
    }

    /// Handles GET (and HEAD).
    fn get(&self, vt: &'static ViewType, view: &mut AdminView) -> AdminResult<AdminResponse> {
        match vt.parent {
            Some(p) => p.get(view),
            None => Err(AdminError::MethodNotAllowed(format!("{} does not accept GET", vt.name))),
        }
    }

    /// Handles POST.
    fn post(&self, vt: &'static ViewType, view: &mut AdminView) -> AdminResult<AdminResponse> {
        match vt.parent {
            Some(p) => p.post(view),
            None => Err(AdminError::MethodNotAllowed(format!("{} does not accept POST", vt.name))),
        }
    }

    /// Template variables.
    fn get_context(&self, vt: &'static ViewType, view: &mut AdminView) -> AdminResult<Context> {
        vt.parent.map_or_else(|| Ok(Context::new()), |p| p.get_context(view))
    }

    /// Static assets.
    fn get_media(&self, vt: &'static ViewType, view: &mut AdminView) -> AdminResult<Media> {
        vt.parent.map_or_else(|| Ok(Media::new()), |p| p.get_media(view))
    }

    /// Breadcrumb entries (`{"url", "title"}` objects).
    fn get_breadcrumb(&self, vt: &'static ViewType, view: &mut AdminView) -> AdminResult<Vec<Value>> {
        vt.parent.map_or_else(|| Ok(Vec::new()), |p| p.get_breadcrumb(view))
    }

    /// Templates the page renders with, most specific first.
    fn template_names(&self, vt: &'static ViewType, view: &AdminView) -> Vec<String> {
        vt.parent.map_or_else(Vec::new, |p| p.template_names(view))
    }

    /// The view's own fragment for a template block.
    fn block(
        &self,
        vt: &'static ViewType,
        view: &mut AdminView,
        name: &str,
        context: &Context,
        nodes: &mut Vec<String>,
    ) -> AdminResult<Option<String>> {
        vt.parent
            .map_or(Ok(None), |p| p.block(view, name, context, nodes))
    }
}

/// A node of the view hierarchy.
///
/// # Examples
///
/// ```
/// use xadmin_rs_admin::views::{COMM_ADMIN_VIEW, LIST_VIEW, BASE_ADMIN_VIEW};
///
/// let names: Vec<_> = LIST_VIEW.ancestors().iter().map(|v| v.name).collect();
/// assert_eq!(names, ["ListAdminView", "ModelAdminView", "CommAdminView", "BaseAdminView"]);
/// assert!(LIST_VIEW.is_a(&COMM_ADMIN_VIEW));
/// assert!(!BASE_ADMIN_VIEW.is_a(&LIST_VIEW));
/// ```
pub struct ViewType {
    /// Unique name, also the key for view options and plugins.
    pub name: &'static str,
    /// The parent view type.
    pub parent: Option<&'static ViewType>,
    /// Base implementations.
    pub handler: &'static dyn ViewHandler,
}

impl ViewType {
    /// Declares a view type.
    pub const fn new(
        name: &'static str,
        parent: Option<&'static Self>,
        handler: &'static dyn ViewHandler,
    ) -> Self {
        Self {
            name,
            parent,
            handler,
        }
    }

    /// This type followed by its parents, most derived first.
    pub fn ancestors(&'static self) -> Vec<&'static Self> {
        let mut chain = vec![self];
        let mut current = self.parent;
        while let Some(vt) = current {
            chain.push(vt);
            current = vt.parent;
        }
        chain
    }

    /// Returns `true` if `other` is this type or one of its ancestors.
    pub fn is_a(&'static self, other: &Self) -> bool {
        self.ancestors().iter().any(|vt| vt.name == other.name)
    }

    /// Blocks declared along the whole ancestor chain, outermost first.
    pub fn declared_blocks(&'static self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = Vec::new();
        for vt in self.ancestors().into_iter().rev() {
            for name in vt.handler.block_names() {
                if !names.contains(name) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Runs the base `init_request`.
    pub fn init_request(&'static self, view: &mut AdminView) -> AdminResult<()> {
        self.handler.init_request(self, view)
    }

    /// Runs the base `setup_view`.
    pub fn setup_view(&'static self, view: &mut AdminView) -> AdminResult<()> {
        self.handler.setup_view(self, view)
    }

    /// Runs the base GET handler.
    pub fn get(&'static self, view: &mut AdminView) -> AdminResult<AdminResponse> {
        self.handler.get(self, view)
    }

    /// Runs the base POST handler.
    pub fn post(&'static self, view: &mut AdminView) -> AdminResult<AdminResponse> {
        self.handler.post(self, view)
    }

    /// Runs the base `get_context`.
    pub fn get_context(&'static self, view: &mut AdminView) -> AdminResult<Context> {
        self.handler.get_context(self, view)
    }

    /// Runs the base `get_media`.
    pub fn get_media(&'static self, view: &mut AdminView) -> AdminResult<Media> {
        self.handler.get_media(self, view)
    }

    /// Runs the base `get_breadcrumb`.
    pub fn get_breadcrumb(&'static self, view: &mut AdminView) -> AdminResult<Vec<Value>> {
        self.handler.get_breadcrumb(self, view)
    }

    /// The page templates, most specific first.
    pub fn template_names(&'static self, view: &AdminView) -> Vec<String> {
        self.handler.template_names(self, view)
    }

    /// Runs the base block renderer.
    pub fn block(
        &'static self,
        view: &mut AdminView,
        name: &str,
        context: &Context,
        nodes: &mut Vec<String>,
    ) -> AdminResult<Option<String>> {
        self.handler.block(self, view, name, context, nodes)
    }
}

impl PartialEq for ViewType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ViewType {}

impl fmt::Debug for ViewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewType")
            .field("name", &self.name)
            .field("parent", &self.parent.map(|p| p.name))
            .finish_non_exhaustive()
    }
}

impl fmt::Display for ViewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
