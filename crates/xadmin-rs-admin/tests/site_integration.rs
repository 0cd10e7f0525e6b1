//! Integration tests for the URL table, request handling, the login
//! fallback, list filtering across plugins, and the axum adapter.

use std::sync::Arc;

use axum::body::Body;
use http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::json;
use tower::ServiceExt;
use xadmin_rs_admin::plugins::filters::FilterState;
use xadmin_rs_admin::server;
use xadmin_rs_admin::views::list::ListState;
use xadmin_rs_admin::views::LIST_VIEW;
use xadmin_rs_admin::{AdminOptions, AdminSite, RegistryBuilder};
use xadmin_rs_auth::SESSION_KEY;
use xadmin_rs_core::{AdminError, AdminSettings};
use xadmin_rs_db::{LogEntryStore, ModelStore, QuerySet};
use xadmin_rs_http::session::SESSION_COOKIE_NAME;
use xadmin_rs_template::Engine;
use xadmin_rs_test::{
    assert_context_contains, assert_redirects, assert_status, assert_template_used, fixtures,
    RequestFactory,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn blog_site() -> Arc<AdminSite> {
    let mut builder = RegistryBuilder::with_defaults().unwrap();
    builder
        .register(
            fixtures::author_meta(),
            AdminOptions::new("AuthorAdmin").attr("list_display", json!(["name", "email"])),
        )
        .unwrap();
    builder
        .register(
            fixtures::article_meta(),
            AdminOptions::new("ArticleAdmin")
                .attr("list_display", json!(["title", "status", "author"]))
                .attr("list_filter", json!(["status"]))
                .attr("search_fields", json!(["title"])),
        )
        .unwrap();
    Arc::new(
        AdminSite::new(builder.build(), AdminSettings::default())
            .with_store(fixtures::blog_store())
            .with_authenticator(fixtures::authenticator()),
    )
}

fn admin() -> RequestFactory {
    RequestFactory::new().user(fixtures::superuser())
}

// ═════════════════════════════════════════════════════════════════════
// 1. Reversing and resolving URLs
// ═════════════════════════════════════════════════════════════════════

#[test]
fn test_reverse_model_urls() {
    let site = blog_site();
    assert_eq!(site.reverse("index", &[]).unwrap(), "/xadmin/");
    assert_eq!(site.reverse("login", &[]).unwrap(), "/xadmin/login/");
    assert_eq!(site.reverse("blog_article_changelist", &[]).unwrap(), "/xadmin/blog/article/");
    assert_eq!(site.reverse("blog_author_add", &[]).unwrap(), "/xadmin/blog/author/add/");
    assert_eq!(
        site.reverse("blog_article_delete", &["7"]).unwrap(),
        "/xadmin/blog/article/7/delete/"
    );
}

#[test]
fn test_reverse_failures() {
    let site = blog_site();
    assert!(matches!(
        site.reverse("blog_comment_changelist", &[]),
        Err(AdminError::NoReverseMatch(_))
    ));
    assert!(matches!(
        site.reverse("blog_article_change", &[]),
        Err(AdminError::NoReverseMatch(_))
    ));
}

#[test]
fn test_resolve_paths() {
    let site = blog_site();
    let matched = site.resolve("/xadmin/blog/article/3/update/").unwrap().unwrap();
    assert_eq!(matched.view_type.name, "UpdateAdminView");
    assert_eq!(matched.model.as_deref(), Some("blog.article"));
    assert_eq!(matched.args, ["3"]);
    assert_eq!(matched.name, "blog_article_change");

    let index = site.resolve("/xadmin").unwrap().unwrap();
    assert_eq!(index.view_type.name, "IndexView");

    assert!(site.resolve("/elsewhere/").unwrap().is_none());
    assert!(site.resolve("/xadmin/blog/comment/").unwrap().is_none());
}

#[test]
fn test_unknown_path_is_404() {
    let site = blog_site();
    let response = site.handle(admin().get("/xadmin/nowhere/"));
    assert_status(&response, 404);
}

// ═════════════════════════════════════════════════════════════════════
// 2. Login fallback and authentication
// ═════════════════════════════════════════════════════════════════════

#[test]
fn test_anonymous_user_gets_login_page() {
    let site = blog_site();
    let response = site.handle(RequestFactory::new().get("/xadmin/blog/article/"));
    assert_status(&response, 200);
    assert_template_used(&response, "xadmin/views/login.html");
    assert_context_contains(&response, "title", &json!("Please Login"));
    assert_context_contains(&response, "next", &json!("/xadmin/blog/article/"));
}

#[test]
fn test_staff_without_perms_is_denied_list() {
    let site = blog_site();
    let response = site.handle(RequestFactory::new().user(fixtures::staff()).get("/xadmin/blog/article/"));
    assert_status(&response, 403);
}

#[test]
fn test_inactive_user_gets_login_page() {
    let site = blog_site();
    let response = site.handle(RequestFactory::new().user(fixtures::inactive()).get("/xadmin/"));
    assert_template_used(&response, "xadmin/views/login.html");
}

#[test]
fn test_login_stores_user_in_session() {
    let site = blog_site();
    let factory = RequestFactory::new();
    let response = site.handle(factory.post(
        "/xadmin/login/",
        &[("username", "admin"), ("password", fixtures::PASSWORD), ("next", "/xadmin/blog/")],
    ));
    assert_redirects(&response, "/xadmin/blog/");
    assert_eq!(factory.session_handle().get(SESSION_KEY), Some(json!(1)));

    let user = site.load_user(&factory.get("/xadmin/"));
    assert_eq!(user.username, "admin");
}

#[test]
fn test_login_rejects_bad_password() {
    let site = blog_site();
    let factory = RequestFactory::new();
    let response = site.handle(factory.post("/xadmin/login/", &[("username", "admin"), ("password", "nope")]));
    assert_status(&response, 200);
    assert_context_contains(&response, "username", &json!("admin"));
    assert!(response.context().unwrap().contains_key("error"));
    assert!(!factory.session_handle().contains_key(SESSION_KEY));
}

#[test]
fn test_external_next_is_ignored() {
    let site = blog_site();
    let response = site.handle(RequestFactory::new().post(
        "/xadmin/login/",
        &[("username", "admin"), ("password", fixtures::PASSWORD), ("next", "//evil.example/")],
    ));
    assert_redirects(&response, "/xadmin/");
}

// ═════════════════════════════════════════════════════════════════════
// 3. Filters and relations narrow the list together
// ═════════════════════════════════════════════════════════════════════

#[test]
fn test_filter_and_relation_predicates_in_order() {
    let site = blog_site();
    let request = admin().get("/xadmin/blog/article/?_rel_author__id__exact=3&_p_status__exact=published");
    let mut view = site
        .get_view(&LIST_VIEW, Some("blog.article"), request, Vec::new())
        .unwrap();
    assert!(view.has_plugin("list_relate_display"));

    let queryset = view.get_list_queryset().unwrap();
    assert_eq!(queryset.predicates(), ["author.id = '3'", "status = 'published'"]);

    view.make_result_list().unwrap();
    let state = view.state::<ListState>().unwrap();
    assert_eq!(state.result_count, 2);
    assert_eq!(state.full_result_count, 5);
    assert!(view.state::<FilterState>().unwrap().has_query_param);
}

#[test]
fn test_relation_to_unknown_field_is_bad_request() {
    let site = blog_site();
    let response = site.handle(admin().get("/xadmin/blog/article/?_rel_title__exact=x"));
    assert_status(&response, 400);
}

#[test]
fn test_list_page_context() {
    let site = blog_site();
    let response = site.handle(admin().get("/xadmin/blog/article/?_p_status__exact=draft"));
    assert_status(&response, 200);
    assert_template_used(&response, "xadmin/views/model_list.html");
    assert_context_contains(&response, "result_count", &json!(3));
    assert_context_contains(&response, "title", &json!("Article List"));
}

#[test]
fn test_bad_page_redirects_with_error_flag() {
    let site = blog_site();
    let response = site.handle(admin().get("/xadmin/blog/article/?p=9"));
    assert_redirects(&response, "/xadmin/blog/article/?e=1");
}

// ═════════════════════════════════════════════════════════════════════
// 4. Editing through the site
// ═════════════════════════════════════════════════════════════════════

#[test]
fn test_create_then_delete_article() {
    let site = blog_site();
    let meta = fixtures::article_meta();
    let store = site.store();
    let before = store.count(&meta, &QuerySet::new(meta.label())).unwrap();

    let response = site.handle(admin().post(
        "/xadmin/blog/article/add/",
        &[("title", "Fresh"), ("status", "draft"), ("author", "2")],
    ));
    assert_status(&response, 302);
    assert_eq!(store.count(&meta, &QuerySet::new(meta.label())).unwrap(), before + 1);
    assert!(store.get(&meta, "6").unwrap().is_some());

    let response = site.handle(admin().post("/xadmin/blog/article/6/delete/", &[("post", "yes")]));
    assert_status(&response, 302);
    assert!(store.get(&meta, "6").unwrap().is_none());
    assert!(!site.log_store().get_for_object("blog.article", "6").is_empty());
}

// ═════════════════════════════════════════════════════════════════════
// 5. Serving over HTTP
// ═════════════════════════════════════════════════════════════════════

fn served_site() -> Arc<AdminSite> {
    let mut engine = Engine::new();
    engine
        .add_raw_template("xadmin/views/login.html", "<h1>{{ title }}</h1>")
        .unwrap();
    let registry = RegistryBuilder::with_defaults().unwrap().build();
    Arc::new(
        AdminSite::new(registry, AdminSettings::default())
            .with_renderer(Arc::new(engine))
            .with_authenticator(fixtures::authenticator()),
    )
}

#[tokio::test]
async fn test_router_serves_login_and_sets_cookie() {
    let app = server::router(served_site());
    let response = app
        .oneshot(Request::builder().uri("/xadmin/login/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
    assert!(cookie.starts_with(&format!("{SESSION_COOKIE_NAME}=")));
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"<h1>Please Login</h1>");
}

#[tokio::test]
async fn test_router_redirects_after_login() {
    let app = server::router(served_site());
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/xadmin/login/")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(format!("username=admin&password={}", fixtures::PASSWORD)))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[header::LOCATION], "/xadmin/");
}

#[tokio::test]
async fn test_router_outside_prefix_is_404() {
    let app = server::router(served_site());
    let response = app
        .oneshot(Request::builder().uri("/other/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
