//! `DeleteAdminView`: confirms and performs the deletion of one object.

use serde_json::{json, Map, Value};
use xadmin_rs_core::text::escape_html;
use xadmin_rs_core::{AdminError, AdminResult};
use xadmin_rs_db::{ActionFlag, Record};
use xadmin_rs_http::{AdminResponse, MessageLevel};
use xadmin_rs_template::Context;

use crate::hooks::Hook;
use crate::view::AdminView;
use crate::view_type::{ViewHandler, ViewType};
use crate::views::model::MODEL_ADMIN_VIEW;

/// Removes the object from the store and logs the deletion.
pub static DELETE_MODEL: Hook<()> = Hook::new("delete_model");

/// The object under deletion.
#[derive(Debug, Clone)]
pub struct DeleteState {
    pub obj: Record,
}

pub(crate) struct DeleteHandler;

impl ViewHandler for DeleteHandler {
    fn block_names(&self) -> &'static [&'static str] {
        &["form_fields"]
    }

    fn init_request(&self, _vt: &'static ViewType, view: &mut AdminView) -> AdminResult<()> {
        MODEL_ADMIN_VIEW.init_request(view)?;
        let meta = view.opts()?;
        let object_id = view.args.first().cloned().unwrap_or_default();
        let obj = view.get_object(&object_id)?;

        if !view.has_delete_permission() {
            return Err(AdminError::PermissionDenied(format!(
                "{} may not delete {}",
                view.user.username, meta.verbose_name_plural
            )));
        }
        let Some(obj) = obj else {
            return Err(AdminError::NotFound(format!(
                "{} object with primary key '{}' does not exist.",
                meta.verbose_name,
                escape_html(&object_id)
            )));
        };
        view.insert_state(DeleteState { obj });
        Ok(())
    }

    fn get(&self, _vt: &'static ViewType, view: &mut AdminView) -> AdminResult<AdminResponse> {
        let context = view.get_context()?;
        view.get_response(context)
    }

    fn post(&self, _vt: &'static ViewType, view: &mut AdminView) -> AdminResult<AdminResponse> {
        let meta = view.opts()?;
        let obj = view.deleting()?;
        view.delete_model()?;

        view.message_user(
            format!(
                "The {} \"{}\" was deleted successfully.",
                meta.verbose_name,
                obj.display(&meta)
            ),
            MessageLevel::Success,
        );

        if let Some(target) = view.request.post().get("_redirect") {
            return Ok(AdminResponse::redirect(target));
        }
        let url = if view.has_view_permission() {
            view.model_admin_url("changelist", &[])?
        } else {
            view.get_admin_url("index", &[])?
        };
        Ok(AdminResponse::redirect(url))
    }

    fn get_context(&self, _vt: &'static ViewType, view: &mut AdminView) -> AdminResult<Context> {
        let mut context = MODEL_ADMIN_VIEW.get_context(view)?;
        let meta = view.opts()?;
        let obj = view.deleting()?;
        context.insert("title", "Are you sure?");
        context.insert("object", serde_json::to_value(&obj)?);
        context.insert("object_name", meta.verbose_name.clone());
        context.insert(
            "deleted_objects",
            json!([format!("{}: {}", meta.verbose_name, obj.display(&meta))]),
        );
        Ok(context)
    }

    fn get_breadcrumb(&self, _vt: &'static ViewType, view: &mut AdminView) -> AdminResult<Vec<Value>> {
        let mut crumbs = MODEL_ADMIN_VIEW.get_breadcrumb(view)?;
        let meta = view.opts()?;
        let obj = view.deleting()?;
        let mut item = Map::new();
        item.insert("title".into(), obj.display(&meta).into());
        if view.has_change_permission() {
            let pk = obj.pk_string(&meta).unwrap_or_default();
            item.insert("url".into(), view.model_admin_url("change", &[pk.as_str()])?.into());
        }
        crumbs.push(Value::Object(item));
        crumbs.push(json!({"title": "Delete"}));
        Ok(crumbs)
    }

    fn template_names(&self, _vt: &'static ViewType, view: &AdminView) -> Vec<String> {
        view.options
            .delete_confirmation_template
            .clone()
            .map_or_else(|| view.get_template_list("views/model_delete_confirm.html"), |t| vec![t])
    }
}

/// The deletion confirmation page.
pub static DELETE_VIEW: ViewType = ViewType::new("DeleteAdminView", Some(&MODEL_ADMIN_VIEW), &DeleteHandler);

impl AdminView {
    fn deleting(&self) -> AdminResult<Record> {
        self.state::<DeleteState>()
            .map(|s| s.obj.clone())
            .ok_or_else(|| AdminError::ImproperlyConfigured("no object loaded for deletion".into()))
    }

    /// Deletes the loaded object and logs it.
    pub fn delete_model(&mut self) -> AdminResult<()> {
        self.call_hook(&DELETE_MODEL, &(), |view, _| {
            let meta = view.opts()?;
            let obj = view.deleting()?;
            let pk = obj.pk_string(&meta).unwrap_or_default();
            if !view.store().delete(&meta, &pk)? {
                return Err(AdminError::NotFound(format!(
                    "{} object with primary key '{pk}' does not exist.",
                    meta.verbose_name
                )));
            }
            view.log_obj(ActionFlag::Delete, "Deleted.", Some(&obj))?;
            tracing::info!(model = %meta.label(), pk = %pk, "deleted object");
            Ok(())
        })
    }
}
