//! The admin site: a frozen registry plus the collaborators views talk to.
//!
//! An [`AdminSite`] is built once at startup from a [`Registry`] and shared
//! behind an `Arc` by every request. It owns the composition cache, the URL
//! table, and the record, log, template and authentication backends.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use xadmin_rs_auth::{AdminUser, Authenticator, InMemoryAuthenticator, SESSION_KEY};
use xadmin_rs_core::{AdminError, AdminResult, AdminSettings};
use xadmin_rs_db::{InMemoryLogEntryStore, InMemoryStore, LogEntryStore, ModelStore};
use xadmin_rs_http::{AdminRequest, AdminResponse};
use xadmin_rs_template::{Engine, TemplateRenderer};

use crate::composer::{ComposedView, Composer};
use crate::registry::Registry;
use crate::urls::{ResolverMatch, UrlTable};
use crate::view::AdminView;
use crate::view_type::ViewType;
use crate::views::LOGIN_VIEW;

/// Resolves the principal of a request when the session does not.
pub type UserLoader = Arc<dyn Fn(&AdminRequest) -> Option<AdminUser> + Send + Sync>;

/// A configured admin site.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use xadmin_rs_admin::{AdminOptions, AdminSite, RegistryBuilder};
/// use xadmin_rs_core::AdminSettings;
/// use xadmin_rs_db::ModelMeta;
///
/// let mut builder = RegistryBuilder::with_defaults().unwrap();
/// builder
///     .register(ModelMeta::new("blog", "Article"), AdminOptions::new("ArticleAdmin"))
///     .unwrap();
/// let site = Arc::new(AdminSite::new(builder.build(), AdminSettings::default()));
///
/// assert_eq!(site.reverse("blog_article_changelist", &[]).unwrap(), "/xadmin/blog/article/");
/// assert_eq!(site.reverse("blog_article_change", &["3"]).unwrap(), "/xadmin/blog/article/3/update/");
/// ```
pub struct AdminSite {
    registry: Arc<Registry>,
    settings: AdminSettings,
    composer: Composer,
    store: Arc<dyn ModelStore>,
    log_store: Arc<dyn LogEntryStore>,
    renderer: Arc<dyn TemplateRenderer>,
    authenticator: Arc<dyn Authenticator>,
    user_loader: Option<UserLoader>,
    urls: OnceCell<UrlTable>,
}

impl AdminSite {
    /// A site over `registry` with in-memory backends and templates loaded
    /// from `settings.template_dirs`.
    pub fn new(registry: impl Into<Arc<Registry>>, settings: AdminSettings) -> Self {
        let renderer = match Engine::from_dirs(&settings.template_dirs) {
            Ok(engine) => engine,
            Err(e) => {
                tracing::warn!(error = %e, "could not load templates, starting with none");
                Engine::new()
            }
        };
        Self {
            registry: registry.into(),
            settings,
            composer: Composer::new(),
            store: Arc::new(InMemoryStore::new()),
            log_store: Arc::new(InMemoryLogEntryStore::new()),
            renderer: Arc::new(renderer),
            authenticator: Arc::new(InMemoryAuthenticator::new()),
            user_loader: None,
            urls: OnceCell::new(),
        }
    }

    /// Replaces the model store, an empty in-memory one by default.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn ModelStore>) -> Self {
        self.store = store;
        self
    }

    /// Replaces the store that receives admin log entries.
    #[must_use]
    pub fn with_log_store(mut self, log_store: Arc<dyn LogEntryStore>) -> Self {
        self.log_store = log_store;
        self
    }

    /// Replaces the template renderer.
    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn TemplateRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Replaces the credential checker used by the login view.
    #[must_use]
    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = authenticator;
        self
    }

    /// Consulted for requests whose session holds no user.
    #[must_use]
    pub fn with_user_loader(mut self, loader: UserLoader) -> Self {
        self.user_loader = Some(loader);
        self
    }

    // ── Accessors ────────────────────────────────────────────────────

    /// The frozen registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Site-wide settings.
    pub const fn settings(&self) -> &AdminSettings {
        &self.settings
    }

    /// The composer holding this site's cached views.
    pub const fn composer(&self) -> &Composer {
        &self.composer
    }

    /// A shared handle to the model store.
    pub fn store(&self) -> Arc<dyn ModelStore> {
        Arc::clone(&self.store)
    }

    /// Where change history is written and read.
    pub fn log_store(&self) -> &Arc<dyn LogEntryStore> {
        &self.log_store
    }

    /// The template renderer.
    pub fn renderer(&self) -> &Arc<dyn TemplateRenderer> {
        &self.renderer
    }

    /// The credential checker.
    pub fn authenticator(&self) -> &Arc<dyn Authenticator> {
        &self.authenticator
    }

    /// Active staff may use the site.
    pub const fn has_permission(&self, user: &AdminUser) -> bool {
        user.is_active && user.is_staff
    }

    /// The principal of a request: the user id stored in its session, then
    /// the user loader, then the anonymous user.
    pub fn load_user(&self, request: &AdminRequest) -> AdminUser {
        let from_session = request
            .session()
            .get(SESSION_KEY)
            .and_then(|id| id.as_u64())
            .and_then(|id| self.authenticator.get_user(id));
        from_session
            .or_else(|| self.user_loader.as_ref().and_then(|load| load(request)))
            .unwrap_or_else(AdminUser::anonymous)
    }

    // ── URLs ─────────────────────────────────────────────────────────

    /// The URL table, built on first use. Building it clears the
    /// composition cache.
    pub fn get_urls(&self) -> AdminResult<&UrlTable> {
        self.urls.get_or_try_init(|| {
            let table = UrlTable::build(&self.registry, &self.settings.normalized_prefix())?;
            self.composer.clear_cache();
            Ok(table)
        })
    }

    /// The absolute path of a named view.
    pub fn reverse(&self, name: &str, args: &[&str]) -> AdminResult<String> {
        self.get_urls()?.reverse(name, args)
    }

    /// Matches an absolute path against the URL table.
    pub fn resolve(&self, path: &str) -> AdminResult<Option<ResolverMatch>> {
        Ok(self.get_urls()?.resolve(path))
    }

    // ── Views ────────────────────────────────────────────────────────

    /// The composed view type for `view_type` on `model`.
    pub fn get_view_class(
        &self,
        view_type: &'static ViewType,
        model: Option<&str>,
    ) -> AdminResult<Arc<ComposedView>> {
        self.composer
            .compose(&self.registry, &self.settings, view_type, model)
    }

    /// Constructs a view for one request and runs its setup.
    pub fn get_view(
        self: &Arc<Self>,
        view_type: &'static ViewType,
        model: Option<&str>,
        request: AdminRequest,
        args: Vec<String>,
    ) -> AdminResult<AdminView> {
        let composed = self.get_view_class(view_type, model)?;
        let mut view = AdminView::new(Arc::clone(self), composed, request, args);
        view.setup()?;
        Ok(view)
    }

    // ── Request handling ─────────────────────────────────────────────

    /// Serves a request, turning errors into responses.
    pub fn handle(self: &Arc<Self>, request: AdminRequest) -> AdminResponse {
        let path = request.path().to_string();
        match self.try_handle(request) {
            Ok(response) => response,
            Err(err) => {
                match &err {
                    AdminError::PermissionDenied(_) => {
                        tracing::info!(path = %path, error = %err, "permission denied");
                    }
                    e if e.is_client_error() => {
                        tracing::debug!(path = %path, status = e.status_code(), error = %e, "client error");
                    }
                    e => tracing::error!(path = %path, error = %e, "admin request failed"),
                }
                AdminResponse::from_error(&err)
            }
        }
    }

    /// Serves a request, returning errors as they are.
    ///
    /// Views that need site permission are served by the login view when
    /// the user lacks it.
    pub fn try_handle(self: &Arc<Self>, request: AdminRequest) -> AdminResult<AdminResponse> {
        let resolved = self
            .resolve(request.path())?
            .ok_or_else(|| AdminError::NotFound(format!("no admin view at {}", request.path())))?;
        let composed = self.get_view_class(resolved.view_type, resolved.model.as_deref())?;

        if composed.context().need_site_permission && !self.has_permission(request.user()) {
            tracing::debug!(view = resolved.name, "site permission required, serving login");
            let mut login = self.get_view(&LOGIN_VIEW, None, request, Vec::new())?;
            return login.dispatch();
        }

        tracing::debug!(
            view = resolved.view_type.name,
            model = resolved.model.as_deref().unwrap_or(""),
            name = %resolved.name,
            "dispatching"
        );
        let mut view = AdminView::new(Arc::clone(self), composed, request, resolved.args);
        view.setup()?;
        view.dispatch()
    }

    /// Renders a response into an `http` response.
    pub fn render(&self, response: AdminResponse) -> AdminResult<http::Response<String>> {
        response.into_http(self.renderer.as_ref())
    }
}

impl fmt::Debug for AdminSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminSite")
            .field("url_prefix", &self.settings.url_prefix)
            .field("models", &self.registry.models().len())
            .field("cached_views", &self.composer.cached_views())
            .finish_non_exhaustive()
    }
}
