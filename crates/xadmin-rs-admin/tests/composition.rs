//! Integration tests for registration, composition, plugin activation and
//! hook dispatch.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::json;
use xadmin_rs_admin::hooks::{Handler, Hook};
use xadmin_rs_admin::plugin::{AdminPlugin, PluginClass};
use xadmin_rs_admin::views::base::INIT_REQUEST;
use xadmin_rs_admin::views::{COMM_ADMIN_VIEW, INDEX_VIEW, LIST_VIEW};
use xadmin_rs_admin::{AdminOptions, AdminSite, AdminView, RegistryBuilder};
use xadmin_rs_core::{AdminError, AdminResult, AdminSettings};
use xadmin_rs_test::{assert_status, fixtures, RequestFactory};

// ── Helpers ─────────────────────────────────────────────────────────

static COMPUTE: Hook<i64> = Hook::new("compute");

struct Doubler;
impl AdminPlugin for Doubler {}

struct Incrementer;
impl AdminPlugin for Incrementer {}

/// Active only when the request carries `?wake=1`.
struct Sleepy;
impl AdminPlugin for Sleepy {
    fn init_request(&mut self, view: &mut AdminView) -> AdminResult<bool> {
        Ok(view.request.get().get("wake") == Some("1"))
    }
}

/// Answers with 42 when `?answer` is present.
struct Oracle;
impl AdminPlugin for Oracle {}

/// Refuses every request.
struct Guard;
impl AdminPlugin for Guard {
    fn init_request(&mut self, _view: &mut AdminView) -> AdminResult<bool> {
        Err(AdminError::PermissionDenied("guarded".into()))
    }
}

fn double(_: &Doubler, _: &mut AdminView, value: i64, _: &()) -> AdminResult<i64> {
    Ok(value * 2)
}

fn increment(_: &Incrementer, _: &mut AdminView, value: i64, _: &()) -> AdminResult<i64> {
    Ok(value + 1)
}

fn thousand(_: &Sleepy, _: &mut AdminView, value: i64, _: &()) -> AdminResult<i64> {
    Ok(value + 1000)
}

fn answer(_: &Oracle, view: &mut AdminView, _: &()) -> AdminResult<Option<i64>> {
    Ok(view.request.get().contains_key("answer").then_some(42))
}

fn doubler(order: i32) -> PluginClass {
    PluginClass::builder("double", |_| Ok(Doubler))
        .order(order)
        .hook(&COMPUTE, Handler::Filter(double))
        .build()
        .unwrap()
}

fn incrementer(order: i32) -> PluginClass {
    PluginClass::builder("increment", |_| Ok(Incrementer))
        .order(order)
        .hook(&COMPUTE, Handler::Filter(increment))
        .build()
        .unwrap()
}

fn blog_builder() -> RegistryBuilder {
    let mut builder = RegistryBuilder::with_defaults().unwrap();
    builder
        .register(fixtures::author_meta(), AdminOptions::new("AuthorAdmin"))
        .unwrap();
    builder
        .register(fixtures::article_meta(), AdminOptions::new("ArticleAdmin"))
        .unwrap();
    builder
}

fn site(builder: RegistryBuilder) -> Arc<AdminSite> {
    Arc::new(
        AdminSite::new(builder.build(), AdminSettings::default())
            .with_store(fixtures::blog_store())
            .with_authenticator(fixtures::authenticator()),
    )
}

fn index_view(site: &Arc<AdminSite>, url: &str) -> AdminView {
    let request = RequestFactory::new().user(fixtures::superuser()).get(url);
    site.get_view(&INDEX_VIEW, None, request, Vec::new()).unwrap()
}

fn compute(view: &mut AdminView) -> i64 {
    view.call_hook(&COMPUTE, &(), |_, _| Ok(5)).unwrap()
}

// ═════════════════════════════════════════════════════════════════════
// 1. Composition is cached and deterministic
// ═════════════════════════════════════════════════════════════════════

#[test]
fn test_composition_returns_same_view() {
    let site = site(blog_builder());
    let first = site.get_view_class(&LIST_VIEW, Some("blog.article")).unwrap();
    let second = site.get_view_class(&LIST_VIEW, Some("blog.article")).unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let other = site.get_view_class(&LIST_VIEW, Some("blog.author")).unwrap();
    assert!(!Arc::ptr_eq(&first, &other));
    assert_eq!(first.merge_name(), "blogarticleAdminListAdminViewModelAdminViewCommAdminViewBaseAdminView");
}

#[test]
fn test_unregistered_model_is_not_composed() {
    let site = site(blog_builder());
    let err = site.get_view_class(&LIST_VIEW, Some("blog.comment")).unwrap_err();
    assert!(matches!(err, AdminError::NotRegistered(_)));
}

// ═════════════════════════════════════════════════════════════════════
// 2. Option precedence
// ═════════════════════════════════════════════════════════════════════

#[test]
fn test_later_registration_wins() {
    let mut builder = RegistryBuilder::with_defaults().unwrap();
    builder
        .register(
            fixtures::article_meta(),
            AdminOptions::new("Base").attr("list_display", json!(["a"])).attr("list_per_page", 5),
        )
        .unwrap();
    builder
        .register(
            fixtures::article_meta(),
            AdminOptions::new("Wide").attr("list_display", json!(["a", "b"])),
        )
        .unwrap();
    let site = site(builder);
    let composed = site.get_view_class(&LIST_VIEW, Some("blog.article")).unwrap();
    assert_eq!(composed.context().list_display, ["a", "b"]);
    assert_eq!(composed.context().list_per_page, 5);
}

#[test]
fn test_model_options_beat_view_options() {
    let mut builder = blog_builder();
    builder
        .register_view_options(&LIST_VIEW, AdminOptions::new("ListDefaults").attr("list_per_page", 30))
        .unwrap();
    builder
        .register_view_options(&COMM_ADMIN_VIEW, AdminOptions::new("CommDefaults").attr("site_title", "Blog"))
        .unwrap();
    builder
        .register(
            fixtures::article_meta(),
            AdminOptions::new("ArticlePaging").attr("list_per_page", 10),
        )
        .unwrap();
    let site = site(builder);

    let article = site.get_view_class(&LIST_VIEW, Some("blog.article")).unwrap();
    assert_eq!(article.context().list_per_page, 10);
    assert_eq!(article.context().site_title, "Blog");

    let author = site.get_view_class(&LIST_VIEW, Some("blog.author")).unwrap();
    assert_eq!(author.context().list_per_page, 30);
}

#[test]
fn test_per_request_options_do_not_leak() {
    let site = site(blog_builder());
    let request = RequestFactory::new().user(fixtures::superuser()).get("/xadmin/blog/article/");
    let mut view = site
        .get_view(&LIST_VIEW, Some("blog.article"), request, Vec::new())
        .unwrap();
    view.options.list_per_page = 1;
    let composed = site.get_view_class(&LIST_VIEW, Some("blog.article")).unwrap();
    assert_eq!(composed.context().list_per_page, 50);
}

// ═════════════════════════════════════════════════════════════════════
// 3. Freezing
// ═════════════════════════════════════════════════════════════════════

#[test]
fn test_frozen_builder_rejects_registration() {
    let mut builder = blog_builder();
    let registry = builder.freeze();
    assert!(builder.is_frozen());

    let err = builder
        .register(fixtures::article_meta(), AdminOptions::new("Late"))
        .unwrap_err();
    assert!(matches!(err, AdminError::ImproperlyConfigured(_)));
    assert!(builder.register_plugin(doubler(10), &INDEX_VIEW).is_err());
    assert!(builder.register_view("^late/$", &INDEX_VIEW, "late").is_err());

    assert_eq!(registry.models().len(), 2);
    assert!(registry.plugins(&INDEX_VIEW).is_empty());
}

// ═════════════════════════════════════════════════════════════════════
// 4. Hook chain ordering
// ═════════════════════════════════════════════════════════════════════

#[test]
fn test_lower_order_wraps_outside() {
    let mut builder = blog_builder();
    builder.register_plugin(incrementer(10), &COMM_ADMIN_VIEW).unwrap();
    builder.register_plugin(doubler(20), &COMM_ADMIN_VIEW).unwrap();
    let site = site(builder);
    let mut view = index_view(&site, "/xadmin/");
    assert_eq!(compute(&mut view), 11);
}

#[test]
fn test_order_decides_regardless_of_registration() {
    let mut builder = blog_builder();
    builder.register_plugin(doubler(10), &INDEX_VIEW).unwrap();
    builder.register_plugin(incrementer(20), &COMM_ADMIN_VIEW).unwrap();
    let site = site(builder);
    let mut view = index_view(&site, "/xadmin/");
    assert_eq!(compute(&mut view), 12);
}

#[test]
fn test_option_override_runs_outermost() {
    let mut builder = blog_builder();
    builder.register_plugin(incrementer(10), &COMM_ADMIN_VIEW).unwrap();
    builder.register_plugin(doubler(20), &COMM_ADMIN_VIEW).unwrap();
    builder
        .register_view_options(
            &INDEX_VIEW,
            AdminOptions::new("Scale").hook(&COMPUTE, |view, _, next| {
                Ok(next.call(view)? * 10)
            }),
        )
        .unwrap();
    let site = site(builder);
    let mut view = index_view(&site, "/xadmin/");
    assert_eq!(compute(&mut view), 110);
}

#[test]
fn test_option_override_can_skip_the_chain() {
    let mut builder = blog_builder();
    builder.register_plugin(doubler(10), &COMM_ADMIN_VIEW).unwrap();
    builder
        .register_view_options(
            &INDEX_VIEW,
            AdminOptions::new("Fixed").hook(&COMPUTE, |_, _, _| Ok(-1)),
        )
        .unwrap();
    let site = site(builder);
    let mut view = index_view(&site, "/xadmin/");
    assert_eq!(compute(&mut view), -1);
}

// ═════════════════════════════════════════════════════════════════════
// 5. Activation
// ═════════════════════════════════════════════════════════════════════

#[test]
fn test_inactive_plugin_contributes_nothing() {
    let mut builder = blog_builder();
    let sleepy = PluginClass::builder("sleepy", |_| Ok(Sleepy))
        .hook(&COMPUTE, Handler::Filter(thousand))
        .build()
        .unwrap();
    builder.register_plugin(sleepy, &COMM_ADMIN_VIEW).unwrap();
    let site = site(builder);

    let mut asleep = index_view(&site, "/xadmin/");
    assert!(!asleep.has_plugin("sleepy"));
    assert_eq!(compute(&mut asleep), 5);

    let mut awake = index_view(&site, "/xadmin/?wake=1");
    assert!(awake.has_plugin("sleepy"));
    assert!(awake.plugin::<Sleepy>().is_some());
    assert_eq!(compute(&mut awake), 1005);
}

#[test]
fn test_active_plugins_sorted_by_order() {
    let mut builder = blog_builder();
    builder.register_plugin(doubler(30), &INDEX_VIEW).unwrap();
    builder.register_plugin(incrementer(5), &COMM_ADMIN_VIEW).unwrap();
    let site = site(builder);
    let view = index_view(&site, "/xadmin/");
    let ids: Vec<_> = view.plugins().iter().map(|p| p.id().to_string()).collect();
    assert_eq!(ids, ["increment", "double"]);
}

#[test]
fn test_replace_none_falls_back_to_inner_chain() {
    let mut builder = blog_builder();
    let oracle = PluginClass::builder("oracle", |_| Ok(Oracle))
        .order(10)
        .hook(&COMPUTE, Handler::Replace(answer))
        .build()
        .unwrap();
    builder.register_plugin(oracle, &COMM_ADMIN_VIEW).unwrap();
    builder.register_plugin(doubler(20), &COMM_ADMIN_VIEW).unwrap();
    let site = site(builder);

    let mut plain = index_view(&site, "/xadmin/");
    assert_eq!(compute(&mut plain), 10);

    let mut asked = index_view(&site, "/xadmin/?answer=1");
    assert_eq!(compute(&mut asked), 42);
}

// ═════════════════════════════════════════════════════════════════════
// 6. Failing activation aborts the request
// ═════════════════════════════════════════════════════════════════════

static LATER_INSTANTIATED: AtomicUsize = AtomicUsize::new(0);
static INIT_HOOKS_RUN: AtomicUsize = AtomicUsize::new(0);

struct Later;
impl AdminPlugin for Later {}

#[test]
fn test_init_request_error_stops_everything_after_it() {
    let mut builder = blog_builder();
    let guard = PluginClass::builder("guard", |_| Ok(Guard)).order(1).build().unwrap();
    let later = PluginClass::builder("later", |_| {
        LATER_INSTANTIATED.fetch_add(1, Ordering::SeqCst);
        Ok(Later)
    })
    .order(50)
    .build()
    .unwrap();
    builder.register_plugin(guard, &INDEX_VIEW).unwrap();
    builder.register_plugin(later, &INDEX_VIEW).unwrap();
    builder
        .register_view_options(
            &INDEX_VIEW,
            AdminOptions::new("Probe").hook(&INIT_REQUEST, |view, _, next| {
                INIT_HOOKS_RUN.fetch_add(1, Ordering::SeqCst);
                next.call(view)
            }),
        )
        .unwrap();
    let site = site(builder);

    let request = RequestFactory::new().user(fixtures::superuser()).get("/xadmin/");
    let response = site.handle(request);
    assert_status(&response, 403);
    assert_eq!(LATER_INSTANTIATED.load(Ordering::SeqCst), 0);
    assert_eq!(INIT_HOOKS_RUN.load(Ordering::SeqCst), 0);
}

// ═════════════════════════════════════════════════════════════════════
// 7. Plugin settings
// ═════════════════════════════════════════════════════════════════════

#[derive(serde::Deserialize)]
struct Paged {
    per_page: i64,
}
impl AdminPlugin for Paged {}

fn paged(plugin: &Paged, _: &mut AdminView, value: i64, _: &()) -> AdminResult<i64> {
    Ok(value * plugin.per_page)
}

#[test]
fn test_plugin_reads_merged_settings() {
    let mut builder = RegistryBuilder::with_defaults().unwrap();
    let class = PluginClass::builder("paged", |settings| settings.deserialize::<Paged>())
        .setting("per_page", 1)
        .hook(&COMPUTE, Handler::Filter(paged))
        .build()
        .unwrap();
    builder.register_plugin(class, &LIST_VIEW).unwrap();
    builder
        .register(fixtures::author_meta(), AdminOptions::new("AuthorAdmin").attr("per_page", 3))
        .unwrap();
    builder
        .register(
            fixtures::article_meta(),
            AdminOptions::new("ArticleAdmin").plugin_override("paged", "per_page", 7),
        )
        .unwrap();
    let site = site(builder);
    let factory = RequestFactory::new().user(fixtures::superuser());

    let mut authors = site
        .get_view(&LIST_VIEW, Some("blog.author"), factory.get("/xadmin/blog/author/"), Vec::new())
        .unwrap();
    assert_eq!(compute(&mut authors), 15);

    let mut articles = site
        .get_view(&LIST_VIEW, Some("blog.article"), factory.get("/xadmin/blog/article/"), Vec::new())
        .unwrap();
    assert_eq!(compute(&mut articles), 35);
}
