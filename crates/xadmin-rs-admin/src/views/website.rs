//! Site pages outside any model: the dashboard, login, logout and the
//! user settings endpoint.

use serde_json::{Map, Value};
use xadmin_rs_auth::SESSION_KEY;
use xadmin_rs_core::{AdminError, AdminResult};
use xadmin_rs_db::site_models::set_user_setting;
use xadmin_rs_http::AdminResponse;
use xadmin_rs_template::Context;

use crate::view::AdminView;
use crate::view_type::{ViewHandler, ViewType};
use crate::views::base::BASE_ADMIN_VIEW;
use crate::views::comm::COMM_ADMIN_VIEW;

/// Parameter naming where to go after login or logout.
pub const REDIRECT_FIELD_NAME: &str = "next";

// ── Index ────────────────────────────────────────────────────────────

pub(crate) struct IndexHandler;

impl ViewHandler for IndexHandler {
    fn defaults(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("title".into(), "Main Dashboard".into());
        map.insert("icon".into(), "fa fa-tachometer-alt".into());
        map
    }

    fn get(&self, _vt: &'static ViewType, view: &mut AdminView) -> AdminResult<AdminResponse> {
        let context = view.get_context()?;
        view.get_response(context)
    }

    fn get_context(&self, _vt: &'static ViewType, view: &mut AdminView) -> AdminResult<Context> {
        let mut context = COMM_ADMIN_VIEW.get_context(view)?;
        context.insert("title", view.options.title.clone());
        context.insert("icon", view.options.icon.clone());
        context.insert("page_id", "home");
        Ok(context)
    }

    fn template_names(&self, _vt: &'static ViewType, _view: &AdminView) -> Vec<String> {
        vec!["xadmin/views/dashboard.html".to_string()]
    }
}

/// The dashboard at the site root.
pub static INDEX_VIEW: ViewType = ViewType::new("IndexView", Some(&COMM_ADMIN_VIEW), &IndexHandler);

// ── Login ────────────────────────────────────────────────────────────

/// A local path to continue to, never another host.
fn redirect_target(view: &AdminView) -> Option<String> {
    view.request
        .post()
        .get(REDIRECT_FIELD_NAME)
        .or_else(|| view.request.get().get(REDIRECT_FIELD_NAME))
        .filter(|url| url.starts_with('/') && !url.starts_with("//"))
        .map(str::to_string)
}

fn success_url(view: &AdminView) -> AdminResult<String> {
    match redirect_target(view) {
        Some(url) => Ok(url),
        None => view.get_admin_url("index", &[]),
    }
}

pub(crate) struct LoginHandler;

impl ViewHandler for LoginHandler {
    fn defaults(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("need_site_permission".into(), false.into());
        map.insert("title".into(), "Please Login".into());
        map
    }

    fn get(&self, _vt: &'static ViewType, view: &mut AdminView) -> AdminResult<AdminResponse> {
        if view.site().has_permission(&view.user) {
            return Ok(AdminResponse::redirect(success_url(view)?));
        }
        let context = view.get_context()?;
        view.get_response(context)
    }

    fn post(&self, _vt: &'static ViewType, view: &mut AdminView) -> AdminResult<AdminResponse> {
        let username = view.request.post().get("username").unwrap_or_default().to_string();
        let password = view.request.post().get("password").unwrap_or_default().to_string();

        let user = view
            .site()
            .authenticator()
            .authenticate(&username, &password)
            .filter(|user| view.site().has_permission(user));
        let Some(user) = user else {
            tracing::info!(username = %username, "rejected admin login");
            let mut context = view.get_context()?;
            context.insert(
                "error",
                "Please enter the correct username and password for a staff account. \
                 Note that both fields may be case-sensitive.",
            );
            context.insert("username", username);
            return view.get_response(context);
        };

        tracing::info!(user = user.id, username = %user.username, "admin login");
        view.request.session().set(SESSION_KEY, user.id);
        view.request.set_user(user.clone());
        view.user = user;
        Ok(AdminResponse::redirect(success_url(view)?))
    }

    fn get_context(&self, _vt: &'static ViewType, view: &mut AdminView) -> AdminResult<Context> {
        let mut context = BASE_ADMIN_VIEW.get_context(view)?;
        let full_path = view.request.get_full_path();
        context.insert("title", view.options.title.clone());
        context.insert("app_path", full_path.clone());
        context.insert(REDIRECT_FIELD_NAME, redirect_target(view).unwrap_or(full_path));
        context.insert("site_title", view.options.site_title.clone());
        Ok(context)
    }

    fn template_names(&self, _vt: &'static ViewType, view: &AdminView) -> Vec<String> {
        vec![view
            .options
            .login_template
            .clone()
            .unwrap_or_else(|| "xadmin/views/login.html".to_string())]
    }
}

/// The login form. Also serves any protected page requested without site
/// permission.
pub static LOGIN_VIEW: ViewType = ViewType::new("LoginView", Some(&BASE_ADMIN_VIEW), &LoginHandler);

// ── Logout ───────────────────────────────────────────────────────────

pub(crate) struct LogoutHandler;

impl ViewHandler for LogoutHandler {
    fn defaults(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("need_site_permission".into(), false.into());
        map.insert("title".into(), "Logged out".into());
        map
    }

    fn get(&self, _vt: &'static ViewType, view: &mut AdminView) -> AdminResult<AdminResponse> {
        tracing::info!(user = view.user.id, "admin logout");
        view.request.session().flush();
        if let Some(url) = redirect_target(view) {
            return Ok(AdminResponse::redirect(url));
        }
        let context = view.get_context()?;
        view.get_response(context)
    }

    fn post(&self, vt: &'static ViewType, view: &mut AdminView) -> AdminResult<AdminResponse> {
        self.get(vt, view)
    }

    fn get_context(&self, _vt: &'static ViewType, view: &mut AdminView) -> AdminResult<Context> {
        let mut context = BASE_ADMIN_VIEW.get_context(view)?;
        context.insert("title", view.options.title.clone());
        context.insert("site_title", view.options.site_title.clone());
        context.insert("index_url", view.get_admin_url("index", &[]).ok());
        Ok(context)
    }

    fn template_names(&self, _vt: &'static ViewType, _view: &AdminView) -> Vec<String> {
        vec!["xadmin/views/logged_out.html".to_string()]
    }
}

/// Ends the session.
pub static LOGOUT_VIEW: ViewType = ViewType::new("LogoutView", Some(&BASE_ADMIN_VIEW), &LogoutHandler);

// ── User settings ────────────────────────────────────────────────────

pub(crate) struct UserSettingHandler;

impl ViewHandler for UserSettingHandler {
    fn post(&self, _vt: &'static ViewType, view: &mut AdminView) -> AdminResult<AdminResponse> {
        let (Some(key), Some(value)) = (view.request.post().get("key"), view.request.post().get("value")) else {
            return Err(AdminError::BadRequest("key and value are required".into()));
        };
        let (key, value) = (key.to_string(), value.to_string());
        set_user_setting(view.store().as_ref(), view.user.id, &key, &value)?;
        tracing::debug!(user = view.user.id, key = %key, "saved user setting");
        Ok(AdminResponse::text(200, ""))
    }
}

/// Stores one `key`/`value` setting of the current user. Pages post here
/// over ajax when a user rearranges them.
pub static USER_SETTING_VIEW: ViewType =
    ViewType::new("UserSettingView", Some(&BASE_ADMIN_VIEW), &UserSettingHandler);

#[cfg(test)]
mod tests {
    use super::*;
    use xadmin_rs_db::site_models::get_user_setting;
    use xadmin_rs_test::{assert_status, fixtures, RequestFactory};

    use crate::views::testing::blog_site;

    #[test]
    fn test_user_setting_is_stored_per_user() {
        let site = blog_site();
        let admin = fixtures::superuser();
        let request = RequestFactory::new()
            .user(admin.clone())
            .post_ajax("/xadmin/settings/user", &[("key", "dashboard:home:pos"), ("value", "w1,w2|w3")]);
        let response = site.handle(request);
        assert_status(&response, 200);
        assert_eq!(
            get_user_setting(site.store().as_ref(), admin.id, "dashboard:home:pos").unwrap().as_deref(),
            Some("w1,w2|w3")
        );
        assert_eq!(get_user_setting(site.store().as_ref(), admin.id + 1, "dashboard:home:pos").unwrap(), None);
    }

    #[test]
    fn test_user_setting_without_value_is_rejected() {
        let site = blog_site();
        let request = RequestFactory::new()
            .user(fixtures::superuser())
            .post_ajax("/xadmin/settings/user", &[("key", "site-theme")]);
        assert_status(&site.handle(request), 400);
    }
}
