//! Admin registrations for the site's own models: the action log and the
//! user settings.
//!
//! These are opt-in. Call [`RegistryBuilder::register_site_models`] and
//! give the site a [`ModelLogEntryStore`](xadmin_rs_db::ModelLogEntryStore)
//! over the same store to browse the log in the admin.

use serde_json::{json, Value};
use xadmin_rs_core::text::escape_html;
use xadmin_rs_core::{AdminError, AdminResult};
use xadmin_rs_db::record::value_to_string;
use xadmin_rs_db::site_models::{log_meta, user_settings_meta};

use crate::hooks::Next;
use crate::options::AdminOptions;
use crate::registry::RegistryBuilder;
use crate::view::AdminView;
use crate::views::list::{ItemArgs, ResultHeader, ResultItem, RESULT_HEADER, RESULT_ITEM};

/// Column linking a log entry to the object it is about.
pub const LINK_COLUMN: &str = "link";

/// Options for `xadmin.usersettings`: kept out of the menu.
pub fn user_settings_admin() -> AdminOptions {
    AdminOptions::new("UserSettingsAdmin")
        .attr("model_icon", "fa fa-cog")
        .attr("hidden_menu", true)
}

/// Options for `xadmin.log`.
pub fn log_admin() -> AdminOptions {
    AdminOptions::new("LogAdmin")
        .attr("list_display", json!(["action_time", "user", "ip_addr", "__str__", LINK_COLUMN]))
        .attr("list_filter", json!(["user", "action_time"]))
        .attr("search_fields", json!(["ip_addr", "message"]))
        .attr("model_icon", "fa fa-cog")
        .hook(&RESULT_HEADER, link_header)
        .hook(&RESULT_ITEM, link_item)
}

impl RegistryBuilder {
    /// Registers the action log and user settings models.
    pub fn register_site_models(&mut self) -> AdminResult<()> {
        self.register(user_settings_meta(), user_settings_admin())?;
        self.register(log_meta(), log_admin())
    }
}

#[allow(clippy::ptr_arg)]
fn link_header(view: &mut AdminView, field_name: &String, next: Next<'_, ResultHeader, String>) -> AdminResult<ResultHeader> {
    let mut header = next.call(view)?;
    if field_name == LINK_COLUMN {
        header.text = String::new();
    }
    Ok(header)
}

fn text(args: &ItemArgs, name: &str) -> Option<String> {
    match args.record.get(name) {
        None | Some(Value::Null) => None,
        Some(value) => Some(value_to_string(value)).filter(|s| !s.is_empty()),
    }
}

fn link_item(view: &mut AdminView, args: &ItemArgs, next: Next<'_, ResultItem, ItemArgs>) -> AdminResult<ResultItem> {
    let mut item = next.call(view)?;
    if args.field_name != LINK_COLUMN {
        return Ok(item);
    }
    item.text = String::new();
    item.allow_tags = true;
    if text(args, "action_flag").as_deref() == Some("delete") {
        return Ok(item);
    }
    let (Some(content_type), Some(object_id)) = (text(args, "content_type"), text(args, "object_id")) else {
        return Ok(item);
    };
    let name = format!("{}_change", content_type.replace('.', "_"));
    match view.get_admin_url(&name, &[object_id.as_str()]) {
        Ok(url) => {
            item.text = format!("<a href='{}' target='_blank'>Admin Object</a>", escape_html(&url));
        }
        Err(AdminError::NoReverseMatch(_)) => {
            tracing::debug!(content_type = %content_type, "log entry of an unregistered model");
        }
        Err(e) => return Err(e),
    }
    Ok(item)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use xadmin_rs_core::AdminSettings;
    use xadmin_rs_db::{ActionFlag, LogEntry, LogEntryStore, ModelLogEntryStore};
    use xadmin_rs_test::{assert_status, fixtures};

    use super::*;
    use crate::site::AdminSite;
    use crate::views::list::ListState;
    use crate::views::testing::{admin, blog_builder};
    use crate::views::LIST_VIEW;

    fn logged_site() -> Arc<AdminSite> {
        let mut builder = blog_builder();
        builder.register_site_models().unwrap();
        let store = fixtures::blog_store();
        Arc::new(
            AdminSite::new(builder.build(), AdminSettings::default())
                .with_store(store.clone())
                .with_log_store(Arc::new(ModelLogEntryStore::new(store)))
                .with_authenticator(fixtures::authenticator()),
        )
    }

    fn log_list(site: &Arc<AdminSite>, query: &str) -> AdminView {
        let url = format!("/xadmin/xadmin/log/{query}");
        let mut view = site.get_view(&LIST_VIEW, Some("xadmin.log"), admin().get(&url), Vec::new()).unwrap();
        view.make_result_list().unwrap();
        view
    }

    fn result_count(view: &AdminView) -> usize {
        view.state::<ListState>().unwrap().result_count
    }

    #[test]
    fn test_edits_show_up_in_the_log_list() {
        let site = logged_site();
        let response = site.handle(admin().post(
            "/xadmin/blog/article/1/update/",
            &[("title", "Hello again"), ("status", "draft"), ("author", "1")],
        ));
        assert_status(&response, 302);

        let mut view = log_list(&site, "");
        assert_eq!(result_count(&view), 1);
        let entry = view.state::<ListState>().unwrap().results[0].clone();
        let link = view.result_item(&entry, LINK_COLUMN).unwrap();
        assert!(link.allow_tags);
        assert_eq!(link.text, "<a href='/xadmin/blog/article/1/update/' target='_blank'>Admin Object</a>");
        assert_eq!(view.result_header(LINK_COLUMN).unwrap().text, "");
    }

    #[test]
    fn test_log_list_search_and_filter() {
        let site = logged_site();
        site.log_store()
            .log(LogEntry::new(ActionFlag::Change, 1, "Changed title.").object("blog.article", "1", "Hello"));
        site.log_store().log(
            LogEntry::new(ActionFlag::Change, 2, "Changed body.")
                .object("blog.article", "2", "Second")
                .ip_addr(Some("10.1.2.3".into())),
        );

        assert_eq!(result_count(&log_list(&site, "?_q_=title")), 1);
        assert_eq!(result_count(&log_list(&site, "?_q_=10.1.2")), 1);
        assert_eq!(result_count(&log_list(&site, "?_p_user__gte=2&_p_user__lte=2")), 1);
        assert_eq!(result_count(&log_list(&site, "")), 2);
    }

    #[test]
    fn test_deleted_objects_get_no_link() {
        let site = logged_site();
        site.log_store()
            .log(LogEntry::new(ActionFlag::Delete, 1, "").object("blog.article", "4", "Gone"));
        let mut view = log_list(&site, "");
        let entry = view.state::<ListState>().unwrap().results[0].clone();
        assert_eq!(view.result_item(&entry, LINK_COLUMN).unwrap().text, "");
    }

    #[test]
    fn test_user_settings_are_registered() {
        let site = logged_site();
        let admin = site.registry().get_registry("xadmin.usersettings").unwrap();
        assert_eq!(admin.options().get("hidden_menu"), Some(&json!(true)));
        assert!(site.registry().get_registry("xadmin.log").is_ok());
    }
}
