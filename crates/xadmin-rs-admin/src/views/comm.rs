//! `CommAdminView`: site chrome shared by every page behind the login.
//!
//! Adds the navigation menu, breadcrumbs, site title and footer to the
//! template context.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use xadmin_rs_auth::{check_permission, permissions::get_model_perm, Action};
use xadmin_rs_core::text::{capfirst, title};
use xadmin_rs_core::AdminResult;
use xadmin_rs_template::Context;

use crate::hooks::Hook;
use crate::view::AdminView;
use crate::view_type::{ViewHandler, ViewType};
use crate::views::base::BASE_ADMIN_VIEW;

/// The unfiltered navigation menu.
pub static GET_NAV_MENU: Hook<Vec<Value>> = Hook::new("get_nav_menu");
/// Whether a model (by label) is left out of the menu.
pub static HIDDEN_MODEL_MENU: Hook<bool, String> = Hook::new("hidden_model_menu");
/// Whether the menu can be read back from the session.
pub static HAS_SESSION_NAV_MENU: Hook<bool> = Hook::new("has_session_nav_menu");
/// The icon class of a model (by label).
pub static GET_MODEL_ICON: Hook<Option<String>, String> = Hook::new("get_model_icon");
/// Breadcrumb entries.
pub static GET_BREADCRUMB: Hook<Vec<Value>> = Hook::new("get_breadcrumb");

/// Session key of the cached navigation menu.
pub const NAV_MENU_SESSION_KEY: &str = "nav_menu";

pub(crate) struct CommHandler;

impl ViewHandler for CommHandler {
    fn defaults(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("base_template".into(), "xadmin/base_site.html".into());
        map
    }

    fn get_context(&self, _vt: &'static ViewType, view: &mut AdminView) -> AdminResult<Context> {
        let mut context = BASE_ADMIN_VIEW.get_context(view)?;

        let mut nav_menu = if view.has_session_nav_menu()? {
            match view.request.session().get(NAV_MENU_SESSION_KEY) {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            }
        } else {
            let menu = view.get_nav_menu()?;
            let filtered: Vec<Value> = menu
                .into_iter()
                .filter(|item| menu_permitted(view, item))
                .filter_map(|item| filter_menu_item(view, item))
                .collect();
            if view.site().settings().caches_nav_menu() {
                view.request
                    .session()
                    .set(NAV_MENU_SESSION_KEY, Value::Array(filtered.clone()));
            }
            filtered
        };

        let path = view.request.path().to_string();
        for item in &mut nav_menu {
            mark_selected(item, &path);
        }

        let breadcrumbs = view.get_breadcrumb()?;
        context.insert("menu_template", view.options.menu_template.clone());
        context.insert("nav_menu", nav_menu);
        context.insert("site_title", view.options.site_title.clone());
        context.insert("site_footer", view.options.site_footer.clone());
        context.insert("breadcrumbs", breadcrumbs);
        Ok(context)
    }

    fn get_breadcrumb(&self, _vt: &'static ViewType, view: &mut AdminView) -> AdminResult<Vec<Value>> {
        let url = view.get_admin_url("index", &[]).ok();
        Ok(vec![json!({"url": url, "title": "Home"})])
    }
}

/// Shared site chrome.
pub static COMM_ADMIN_VIEW: ViewType =
    ViewType::new("CommAdminView", Some(&BASE_ADMIN_VIEW), &CommHandler);

// ── Menu building ────────────────────────────────────────────────────

fn build_nav_menu(view: &mut AdminView) -> AdminResult<Vec<Value>> {
    let site = Arc::clone(view.site());
    let mut apps: Vec<(String, Map<String, Value>)> = Vec::new();

    for admin in site.registry().models() {
        let meta = admin.meta();
        let label = meta.label();
        if view.hidden_model_menu(&label)? {
            continue;
        }
        let Ok(url) = view.get_model_url(meta, "changelist", &[]) else {
            continue;
        };
        let icon = view.get_model_icon(&label)?;
        let model_item = json!({
            "title": capfirst(&meta.verbose_name_plural),
            "url": url,
            "icon": icon,
            "perm": get_model_perm(meta, &Action::View),
            "model": label,
            "order": admin.order(),
        });

        let app_label = meta.app_label.clone();
        let position = match apps.iter().position(|(app, _)| *app == app_label) {
            Some(position) => position,
            None => {
                let key = app_label.to_lowercase();
                let app_title = view
                    .options
                    .apps_label_title
                    .get(&key)
                    .cloned()
                    .unwrap_or_else(|| title(&app_label));
                let mut app = Map::new();
                app.insert("title".into(), app_title.into());
                app.insert("menus".into(), Value::Array(Vec::new()));
                apps.push((app_label.clone(), app));
                apps.len() - 1
            }
        };
        let app_icon = view.options.apps_icons.get(&app_label.to_lowercase()).cloned();
        let default_icon = view.options.default_model_icon.clone();
        let (_, app) = &mut apps[position];

        if let Some(Value::Array(menus)) = app.get_mut("menus") {
            menus.push(model_item);
        }
        if let Some(app_icon) = app_icon {
            app.insert("first_icon".into(), app_icon.into());
        } else if let Some(icon) = icon {
            let replace = match app.get("first_icon") {
                None => true,
                Some(current) => current.as_str() == default_icon.as_deref(),
            };
            if replace {
                app.insert("first_icon".into(), icon.into());
            }
        }
        if !app.contains_key("first_url") {
            app.insert("first_url".into(), url.into());
        }
    }

    let mut menu: Vec<Value> = apps
        .into_iter()
        .map(|(_, mut app)| {
            if let Some(Value::Array(menus)) = app.get_mut("menus") {
                menus.sort_by(|a, b| {
                    let key = |v: &Value| {
                        (
                            v["order"].as_u64().unwrap_or_default(),
                            v["title"].as_str().unwrap_or_default().to_string(),
                        )
                    };
                    key(a).cmp(&key(b))
                });
            }
            Value::Object(app)
        })
        .collect();
    menu.sort_by(|a, b| {
        a["title"]
            .as_str()
            .unwrap_or_default()
            .cmp(b["title"].as_str().unwrap_or_default())
    });
    Ok(menu)
}

fn menu_permitted(view: &AdminView, item: &Value) -> bool {
    if let Some(label) = item.get("model").and_then(Value::as_str) {
        if let Ok(admin) = view.site().registry().get_registry(label) {
            return check_permission(&view.user, admin.meta(), &Action::View);
        }
    }
    match item.get("perm").and_then(Value::as_str) {
        None => true,
        Some("super") => view.user.is_superuser,
        Some(perm) => view.user.has_perm(perm),
    }
}

/// Drops unpermitted children. A group whose children were all dropped is
/// removed.
fn filter_menu_item(view: &AdminView, mut item: Value) -> Option<Value> {
    let Value::Object(map) = &mut item else {
        return Some(item);
    };
    map.remove("perm");
    if let Some(Value::Array(children)) = map.remove("menus") {
        let before = children.len();
        let kept: Vec<Value> = children
            .into_iter()
            .filter(|child| menu_permitted(view, child))
            .filter_map(|child| filter_menu_item(view, child))
            .collect();
        if before > 0 && kept.is_empty() {
            return None;
        }
        map.insert("menus".into(), Value::Array(kept));
    }
    Some(item)
}

fn mark_selected(item: &mut Value, path: &str) -> bool {
    let mut selected = item
        .get("url")
        .and_then(Value::as_str)
        .map_or(false, |url| {
            let base = url.split('?').next().unwrap_or(url);
            path.starts_with(base)
        });
    if let Some(Value::Array(children)) = item.get_mut("menus") {
        for child in children {
            if mark_selected(child, path) {
                selected = true;
            }
        }
    }
    if selected {
        if let Value::Object(map) = item {
            map.insert("selected".into(), true.into());
        }
    }
    selected
}

impl AdminView {
    /// The navigation menu before permission filtering.
    pub fn get_nav_menu(&mut self) -> AdminResult<Vec<Value>> {
        self.call_hook(&GET_NAV_MENU, &(), |view, _| build_nav_menu(view))
    }

    /// Whether a model is left out of the menu; defaults to its
    /// `hidden_menu` attribute.
    pub fn hidden_model_menu(&mut self, label: &str) -> AdminResult<bool> {
        self.call_hook(&HIDDEN_MODEL_MENU, &label.to_string(), |view, label| {
            Ok(view
                .site()
                .registry()
                .get_registry(label)
                .ok()
                .and_then(|admin| admin.options().get("hidden_menu").and_then(Value::as_bool))
                .unwrap_or(false))
        })
    }

    /// Whether the session holds a cached menu that may be reused.
    pub fn has_session_nav_menu(&mut self) -> AdminResult<bool> {
        self.call_hook(&HAS_SESSION_NAV_MENU, &(), |view, _| {
            Ok(view.site().settings().caches_nav_menu()
                && view.request.session().contains_key(NAV_MENU_SESSION_KEY))
        })
    }

    /// The icon of a model: the global icon map, then the model's own
    /// `model_icon`, then the default icon.
    pub fn get_model_icon(&mut self, label: &str) -> AdminResult<Option<String>> {
        self.call_hook(&GET_MODEL_ICON, &label.to_string(), |view, label| {
            if let Some(icon) = view.options.global_models_icon.get(label) {
                return Ok(Some(icon.clone()));
            }
            let registered = view
                .site()
                .registry()
                .get_registry(label)
                .ok()
                .and_then(|admin| admin.options().get("model_icon").and_then(Value::as_str).map(str::to_string));
            Ok(registered.or_else(|| view.options.default_model_icon.clone()))
        })
    }

    /// Breadcrumb entries through the `get_breadcrumb` extension point.
    pub fn get_breadcrumb(&mut self) -> AdminResult<Vec<Value>> {
        self.call_hook(&GET_BREADCRUMB, &(), |view, _| view.view_type().get_breadcrumb(view))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xadmin_rs_db::{FieldDef, FieldType, ModelMeta};
    use xadmin_rs_test::{fixtures, RequestFactory};

    use crate::options::AdminOptions;
    use crate::views::testing::{admin, blog_builder, site_from};
    use crate::views::INDEX_VIEW;

    fn order_meta() -> ModelMeta {
        ModelMeta::new("shop", "Order").field(FieldDef::new("total", FieldType::Integer))
    }

    fn shop_and_blog() -> Arc<crate::site::AdminSite> {
        let mut builder = blog_builder();
        builder.register(order_meta(), AdminOptions::new("OrderAdmin")).unwrap();
        site_from(builder)
    }

    fn titles(items: &Value) -> Vec<&str> {
        items
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["title"].as_str().unwrap())
            .collect()
    }

    #[test]
    fn test_nav_menu_groups_models_by_app() {
        let site = shop_and_blog();
        let mut view = site.get_view(&INDEX_VIEW, None, admin().get("/xadmin/"), Vec::new()).unwrap();
        let menu = Value::Array(view.get_nav_menu().unwrap());

        assert_eq!(titles(&menu), ["Blog", "Shop"]);
        assert_eq!(titles(&menu[0]["menus"]), ["Authors", "Articles"]);
        assert_eq!(menu[0]["first_url"], json!("/xadmin/blog/author/"));
        assert_eq!(menu[1]["menus"][0]["url"], json!("/xadmin/shop/order/"));
    }

    #[test]
    fn test_nav_menu_drops_groups_without_permitted_models() {
        let site = shop_and_blog();
        let response = site.handle(RequestFactory::new().user(fixtures::editor()).get("/xadmin/"));
        let menu = response.context().unwrap().get("nav_menu").unwrap().clone();
        assert_eq!(titles(&menu), ["Blog"]);
        assert_eq!(titles(&menu[0]["menus"]), ["Authors", "Articles"]);
        assert!(menu[0].get("perm").is_none());
    }

    #[test]
    fn test_hidden_model_left_out() {
        let mut builder = blog_builder();
        builder
            .register(order_meta(), AdminOptions::new("Hidden").attr("hidden_menu", true))
            .unwrap();
        let site = site_from(builder);
        let mut view = site.get_view(&INDEX_VIEW, None, admin().get("/xadmin/"), Vec::new()).unwrap();
        assert_eq!(titles(&Value::Array(view.get_nav_menu().unwrap())), ["Blog"]);
    }

    #[test]
    fn test_current_model_is_selected() {
        let site = shop_and_blog();
        let response = site.handle(admin().get("/xadmin/blog/article/"));
        let menu = response.context().unwrap().get("nav_menu").unwrap().clone();
        assert_eq!(menu[0]["selected"], json!(true));
        assert_eq!(menu[0]["menus"][1]["selected"], json!(true));
        assert!(menu[0]["menus"][0].get("selected").is_none());
        assert!(menu[1].get("selected").is_none());
    }
}
