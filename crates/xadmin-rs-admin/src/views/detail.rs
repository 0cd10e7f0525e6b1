//! `DetailAdminView`: a read-only page of one object.

use serde::Serialize;
use serde_json::{Map, Value};
use xadmin_rs_core::text::escape_html;
use xadmin_rs_core::{AdminError, AdminResult};
use xadmin_rs_db::record::value_to_string;
use xadmin_rs_db::Record;
use xadmin_rs_http::AdminResponse;
use xadmin_rs_template::{Context, Media};

use crate::hooks::Hook;
use crate::view::AdminView;
use crate::view_type::{ViewHandler, ViewType};
use crate::views::list::EMPTY_CHANGELIST_VALUE;
use crate::views::model::MODEL_ADMIN_VIEW;

/// One field row of the detail page.
pub static GET_FIELD_RESULT: Hook<FieldResult, String> = Hook::new("get_field_result");

/// The object shown.
#[derive(Debug, Clone)]
pub struct DetailState {
    pub obj: Record,
}

/// A label and rendered value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldResult {
    pub field_name: String,
    pub label: String,
    pub text: String,
    pub allow_tags: bool,
    /// Format strings with a single `%s`, applied innermost first.
    pub wraps: Vec<String>,
    pub btns: Vec<String>,
}

impl FieldResult {
    /// The rendered value markup.
    pub fn val(&self) -> String {
        let mut text = if self.allow_tags {
            self.text.clone()
        } else {
            escape_html(&self.text)
        };
        for wrap in &self.wraps {
            text = wrap.replacen("%s", &text, 1);
        }
        text + &self.btns.concat()
    }
}

pub(crate) struct DetailHandler;

impl ViewHandler for DetailHandler {
    fn init_request(&self, _vt: &'static ViewType, view: &mut AdminView) -> AdminResult<()> {
        MODEL_ADMIN_VIEW.init_request(view)?;
        let meta = view.opts()?;
        let object_id = view.args.first().cloned().unwrap_or_default();
        let obj = view.get_object(&object_id)?;

        if !view.has_view_permission() {
            return Err(AdminError::PermissionDenied(format!(
                "{} may not view {}",
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
        view.insert_state(DetailState { obj });
        Ok(())
    }

    fn get(&self, _vt: &'static ViewType, view: &mut AdminView) -> AdminResult<AdminResponse> {
        let context = view.get_context()?;
        view.get_response(context)
    }

    fn get_context(&self, _vt: &'static ViewType, view: &mut AdminView) -> AdminResult<Context> {
        let mut context = MODEL_ADMIN_VIEW.get_context(view)?;
        let meta = view.opts()?;
        let obj = view.detail_object()?;
        let pk = obj.pk_string(&meta).unwrap_or_default();

        let mut rows = Vec::new();
        for name in view.detail_fields()? {
            let result = view.get_field_result(&name)?;
            let mut row = Map::new();
            row.insert("field_name".into(), result.field_name.clone().into());
            row.insert("label".into(), result.label.clone().into());
            row.insert("value".into(), result.val().into());
            rows.push(Value::Object(row));
        }

        let has_change_permission = view.has_change_permission();
        let has_delete_permission = view.has_delete_permission();
        context.insert("title", obj.display(&meta));
        context.insert("object", serde_json::to_value(&obj)?);
        context.insert("fields", rows);
        context.insert("has_change_permission", has_change_permission);
        context.insert("has_delete_permission", has_delete_permission);
        if has_change_permission {
            context.insert("change_url", view.model_admin_url("change", &[pk.as_str()])?);
        }
        if has_delete_permission {
            context.insert("delete_url", view.model_admin_url("delete", &[pk.as_str()])?);
        }
        Ok(context)
    }

    fn get_media(&self, _vt: &'static ViewType, view: &mut AdminView) -> AdminResult<Media> {
        let media = MODEL_ADMIN_VIEW.get_media(view)?;
        Ok(media + view.vendor(&["xadmin.page.form.js", "xadmin.form.css"])?)
    }

    fn get_breadcrumb(&self, _vt: &'static ViewType, view: &mut AdminView) -> AdminResult<Vec<Value>> {
        let mut crumbs = MODEL_ADMIN_VIEW.get_breadcrumb(view)?;
        let meta = view.opts()?;
        let obj = view.detail_object()?;
        let mut item = Map::new();
        item.insert("title".into(), obj.display(&meta).into());
        let pk = obj.pk_string(&meta).unwrap_or_default();
        item.insert("url".into(), view.model_admin_url("detail", &[pk.as_str()])?.into());
        crumbs.push(Value::Object(item));
        Ok(crumbs)
    }

    fn template_names(&self, _vt: &'static ViewType, view: &AdminView) -> Vec<String> {
        view.options
            .detail_template
            .clone()
            .map_or_else(|| view.get_template_list("views/model_detail.html"), |t| vec![t])
    }
}

/// The read-only object page.
pub static DETAIL_VIEW: ViewType = ViewType::new("DetailAdminView", Some(&MODEL_ADMIN_VIEW), &DetailHandler);

impl AdminView {
    fn detail_object(&self) -> AdminResult<Record> {
        self.state::<DetailState>()
            .map(|s| s.obj.clone())
            .ok_or_else(|| AdminError::ImproperlyConfigured("no object loaded for the detail page".into()))
    }

    /// Configured `fields`, else every non-key field, minus `exclude`.
    fn detail_fields(&self) -> AdminResult<Vec<String>> {
        let meta = self.opts()?;
        let names: Vec<String> = match &self.options.fields {
            Some(fields) => fields.clone(),
            None => meta
                .fields
                .iter()
                .filter(|f| !f.primary_key)
                .map(|f| f.name.clone())
                .collect(),
        };
        Ok(names
            .into_iter()
            .filter(|n| !self.options.exclude.contains(n))
            .collect())
    }

    /// The row of one field, with choice labels resolved.
    pub fn get_field_result(&mut self, field_name: &str) -> AdminResult<FieldResult> {
        self.call_hook(&GET_FIELD_RESULT, &field_name.to_string(), |view, field_name| {
            let meta = view.opts()?;
            let obj = view.detail_object()?;
            let field = meta.get_field(field_name);
            let label = field.map_or_else(|| field_name.clone(), |f| f.label());
            let text = match obj.get(field_name) {
                None | Some(Value::Null) => EMPTY_CHANGELIST_VALUE.to_string(),
                Some(value) => {
                    let raw = value_to_string(value);
                    field
                        .and_then(|f| f.choice_label(&raw))
                        .map_or(raw, str::to_string)
                }
            };
            Ok(FieldResult {
                field_name: field_name.clone(),
                label,
                text,
                allow_tags: false,
                wraps: Vec::new(),
                btns: Vec::new(),
            })
        })
    }
}
