//! Model form views: `ModelFormAdminView` and its create and update
//! children.
//!
//! Both children share one flow:
//!
//! 1. `init_request` checks permissions (and loads the object for update),
//!    then `prepare_form` builds the unbound form through `get_model_form`.
//! 2. `instance_forms` binds it with what `get_form_datas` returns.
//! 3. GET renders it. POST validates through `valid_forms`, then runs
//!    `save_forms`, `save_models`, `save_related` and `post_response`, or
//!    renders the form again with its errors.

use serde_json::{json, Map, Value};
use xadmin_rs_core::text::{escape_html, get_text_list};
use xadmin_rs_core::{AdminError, AdminResult};
use xadmin_rs_db::{ActionFlag, FieldDef, FieldType, Record};
use xadmin_rs_forms::{FormField, ModelForm, ModelFormConfig};
use xadmin_rs_http::{AdminResponse, MessageLevel, QueryDict};
use xadmin_rs_template::{Context, Media};

use crate::hooks::Hook;
use crate::view::AdminView;
use crate::view_type::{ViewHandler, ViewType};
use crate::views::list::LIST_QUERY_SESSION_KEY;
use crate::views::model::MODEL_ADMIN_VIEW;

/// The unbound form class of the view.
pub static GET_MODEL_FORM: Hook<ModelForm> = Hook::new("get_model_form");
/// One form field, given the model field it edits.
pub static FORMFIELD_FOR_DBFIELD: Hook<FormField, FieldDef> = Hook::new("formfield_for_dbfield");
/// Fields shown but never edited.
pub static GET_READONLY_FIELDS: Hook<Vec<String>> = Hook::new("get_readonly_fields");
/// Initial values, instance and submitted data for the form.
pub static GET_FORM_DATAS: Hook<FormDatas> = Hook::new("get_form_datas");
/// Binds the form.
pub static INSTANCE_FORMS: Hook<()> = Hook::new("instance_forms");
/// Whether the submitted forms are valid.
pub static VALID_FORMS: Hook<bool> = Hook::new("valid_forms");
/// Builds the new record from the cleaned form.
pub static SAVE_FORMS: Hook<()> = Hook::new("save_forms");
/// Persists the new record and logs the change.
pub static SAVE_MODELS: Hook<()> = Hook::new("save_models");
/// Persists related objects.
pub static SAVE_RELATED: Hook<()> = Hook::new("save_related");
/// Text of the admin log entry.
pub static CHANGE_MESSAGE: Hook<String> = Hook::new("change_message");
/// The response after a successful save.
pub static POST_RESPONSE: Hook<AdminResponse> = Hook::new("post_response");

/// Per-request form state.
#[derive(Debug, Clone, Default)]
pub struct FormState {
    /// The unbound form built by `get_model_form`.
    pub model_form: Option<ModelForm>,
    /// The bound form.
    pub form: Option<ModelForm>,
    /// The object being changed; `None` when adding.
    pub org_obj: Option<Record>,
    /// The object as saved.
    pub new_obj: Option<Record>,
}

/// What a form is bound with.
#[derive(Debug, Clone, Default)]
pub struct FormDatas {
    pub initial: Map<String, Value>,
    pub data: Option<QueryDict>,
    pub instance: Option<Record>,
}

pub(crate) struct ModelFormHandler;

impl ViewHandler for ModelFormHandler {
    fn block_names(&self) -> &'static [&'static str] {
        &["form_top", "after_fieldsets", "submit_line"]
    }

    fn get(&self, _vt: &'static ViewType, view: &mut AdminView) -> AdminResult<AdminResponse> {
        view.instance_forms()?;
        let context = view.get_context()?;
        view.get_response(context)
    }

    fn post(&self, _vt: &'static ViewType, view: &mut AdminView) -> AdminResult<AdminResponse> {
        view.instance_forms()?;
        if view.valid_forms()? {
            view.save_forms()?;
            view.save_models()?;
            view.save_related()?;
            view.post_response()
        } else {
            let context = view.get_context()?;
            view.get_response(context)
        }
    }

    fn get_context(&self, _vt: &'static ViewType, view: &mut AdminView) -> AdminResult<Context> {
        let mut context = MODEL_ADMIN_VIEW.get_context(view)?;
        let state = view.state::<FormState>().cloned().unwrap_or_default();
        let add = state.org_obj.is_none();
        let change = !add;

        let has_add_permission = view.has_add_permission();
        let has_change_permission = view.has_change_permission();
        let has_delete_permission = view.has_delete_permission();
        let save_as = view.options.save_as;

        let (form, errors) = match &state.form {
            Some(form) => {
                let mut errors: Vec<String> = Vec::new();
                if form.is_bound() {
                    errors.extend(form.errors().values().flatten().cloned());
                    errors.extend(form.non_field_errors().iter().cloned());
                }
                (form.to_context(), errors)
            }
            None => (Value::Null, Vec::new()),
        };
        let original = match &state.org_obj {
            Some(obj) => serde_json::to_value(obj)?,
            None => Value::Null,
        };

        let show_delete_link = has_delete_permission && change;
        context.insert("form", form);
        context.insert("original", original);
        context.insert("show_delete", change);
        context.insert("add", add);
        context.insert("change", change);
        context.insert("errors", errors);
        context.insert("has_add_permission", has_add_permission);
        context.insert("has_view_permission", view.has_view_permission());
        context.insert("has_change_permission", has_change_permission);
        context.insert("has_delete_permission", has_delete_permission);
        context.insert("form_url", "");
        context.insert("save_as", save_as);
        context.insert("save_on_top", view.options.save_on_top);

        context.insert("onclick_attrib", "");
        context.insert("show_delete_link", show_delete_link);
        context.insert("show_save_as_new", change && save_as);
        context.insert("show_save_and_add_another", has_add_permission && (!save_as || add));
        context.insert("show_save_and_continue", has_change_permission);
        context.insert("show_save", true);

        if show_delete_link {
            let meta = view.opts()?;
            if let Some(pk) = state.org_obj.as_ref().and_then(|o| o.pk_string(&meta)) {
                context.insert("delete_url", view.model_admin_url("delete", &[pk.as_str()])?);
            }
        }
        Ok(context)
    }

    fn get_media(&self, _vt: &'static ViewType, view: &mut AdminView) -> AdminResult<Media> {
        let media = MODEL_ADMIN_VIEW.get_media(view)?;
        Ok(media + view.vendor(&["xadmin.page.form.js", "xadmin.form.css"])?)
    }
}

/// Shared base of the create and update views.
pub static MODEL_FORM_VIEW: ViewType =
    ViewType::new("ModelFormAdminView", Some(&MODEL_ADMIN_VIEW), &ModelFormHandler);

// ── Create ───────────────────────────────────────────────────────────

pub(crate) struct CreateHandler;

impl ViewHandler for CreateHandler {
    fn init_request(&self, _vt: &'static ViewType, view: &mut AdminView) -> AdminResult<()> {
        MODEL_FORM_VIEW.init_request(view)?;
        view.insert_state(FormState::default());
        if !view.has_add_permission() {
            return Err(AdminError::PermissionDenied(format!(
                "{} may not add {}",
                view.user.username,
                view.opts()?.verbose_name_plural
            )));
        }
        view.prepare_form()
    }

    fn get_context(&self, _vt: &'static ViewType, view: &mut AdminView) -> AdminResult<Context> {
        let mut context = MODEL_FORM_VIEW.get_context(view)?;
        let meta = view.opts()?;
        context.insert("title", format!("Add {}", meta.verbose_name));
        Ok(context)
    }

    fn get_breadcrumb(&self, _vt: &'static ViewType, view: &mut AdminView) -> AdminResult<Vec<Value>> {
        let mut crumbs = MODEL_ADMIN_VIEW.get_breadcrumb(view)?;
        let meta = view.opts()?;
        let mut item = Map::new();
        item.insert("title".into(), format!("Add {}", meta.verbose_name).into());
        if view.has_add_permission() {
            item.insert("url".into(), view.model_admin_url("add", &[])?.into());
        }
        crumbs.push(Value::Object(item));
        Ok(crumbs)
    }

    fn template_names(&self, _vt: &'static ViewType, view: &AdminView) -> Vec<String> {
        view.options
            .add_form_template
            .clone()
            .map_or_else(|| view.get_template_list("views/model_form.html"), |t| vec![t])
    }
}

/// The add form.
pub static CREATE_VIEW: ViewType = ViewType::new("CreateAdminView", Some(&MODEL_FORM_VIEW), &CreateHandler);

// ── Update ───────────────────────────────────────────────────────────

pub(crate) struct UpdateHandler;

impl ViewHandler for UpdateHandler {
    fn init_request(&self, _vt: &'static ViewType, view: &mut AdminView) -> AdminResult<()> {
        MODEL_FORM_VIEW.init_request(view)?;
        let meta = view.opts()?;
        let object_id = view.args.first().cloned().unwrap_or_default();
        let org_obj = view.get_object(&object_id)?;

        if !view.has_change_permission() {
            return Err(AdminError::PermissionDenied(format!(
                "{} may not change {}",
                view.user.username, meta.verbose_name_plural
            )));
        }
        let Some(org_obj) = org_obj else {
            return Err(AdminError::NotFound(format!(
                "{} object with primary key '{}' does not exist.",
                meta.verbose_name,
                escape_html(&object_id)
            )));
        };
        view.insert_state(FormState {
            org_obj: Some(org_obj),
            ..FormState::default()
        });
        view.prepare_form()
    }

    fn post(&self, _vt: &'static ViewType, view: &mut AdminView) -> AdminResult<AdminResponse> {
        if view.request.post().contains_key("_saveasnew") {
            let site = std::sync::Arc::clone(view.site());
            let label = view.opts()?.label();
            let mut create = site.get_view(&CREATE_VIEW, Some(label.as_str()), view.request.clone(), Vec::new())?;
            return create.post();
        }
        MODEL_FORM_VIEW.post(view)
    }

    fn get_context(&self, _vt: &'static ViewType, view: &mut AdminView) -> AdminResult<Context> {
        let mut context = MODEL_FORM_VIEW.get_context(view)?;
        let meta = view.opts()?;
        if let Some(obj) = view.state::<FormState>().and_then(|s| s.org_obj.clone()) {
            context.insert("title", format!("Change {}", obj.display(&meta)));
            context.insert("object_id", obj.pk_string(&meta).unwrap_or_default());
        }
        Ok(context)
    }

    fn get_breadcrumb(&self, _vt: &'static ViewType, view: &mut AdminView) -> AdminResult<Vec<Value>> {
        let mut crumbs = MODEL_ADMIN_VIEW.get_breadcrumb(view)?;
        let meta = view.opts()?;
        if let Some(obj) = view.state::<FormState>().and_then(|s| s.org_obj.clone()) {
            let mut item = Map::new();
            item.insert("title".into(), obj.display(&meta).into());
            if view.has_change_permission() {
                let pk = obj.pk_string(&meta).unwrap_or_default();
                item.insert("url".into(), view.model_admin_url("change", &[pk.as_str()])?.into());
            }
            crumbs.push(Value::Object(item));
        }
        Ok(crumbs)
    }

    fn template_names(&self, _vt: &'static ViewType, view: &AdminView) -> Vec<String> {
        view.options
            .change_form_template
            .clone()
            .map_or_else(|| view.get_template_list("views/model_form.html"), |t| vec![t])
    }
}

/// The change form.
pub static UPDATE_VIEW: ViewType = ViewType::new("UpdateAdminView", Some(&MODEL_FORM_VIEW), &UpdateHandler);

// ── Base implementations ─────────────────────────────────────────────

fn base_model_form(view: &mut AdminView) -> AdminResult<ModelForm> {
    let meta = view.opts()?;
    let mut exclude = view.options.exclude.clone();
    exclude.extend(view.get_readonly_fields()?);
    let mut config = ModelFormConfig::new().exclude(exclude);
    if let Some(fields) = &view.options.fields {
        config = config.fields(fields.clone());
    }
    let mut form = ModelForm::for_model(&meta, &config)?;
    view.apply_formfield_hooks(&mut form)?;
    Ok(form)
}

fn base_form_datas(view: &mut AdminView) -> AdminResult<FormDatas> {
    let org_obj = view.state::<FormState>().and_then(|s| s.org_obj.clone());
    if let Some(instance) = org_obj {
        let data = (view.request_method == "post").then(|| view.request.post().clone());
        return Ok(FormDatas {
            instance: Some(instance),
            data,
            ..FormDatas::default()
        });
    }
    if view.request_method != "get" {
        return Ok(FormDatas {
            data: Some(view.request.post().clone()),
            ..FormDatas::default()
        });
    }

    // Initial values come from the query string. Many-to-many values are
    // comma-separated keys.
    let meta = view.opts()?;
    let prefix = view
        .state::<FormState>()
        .and_then(|s| s.model_form.as_ref())
        .map(|form| form.add_prefix(""))
        .unwrap_or_default();
    let mut initial = Map::new();
    for (key, value) in view.request.get().items() {
        initial.insert(key.to_string(), Value::String(value.to_string()));
    }
    for (key, value) in view.request.get().items() {
        let name = key.strip_prefix(prefix.as_str()).unwrap_or(key);
        let Some(field) = meta.get_field(name) else {
            continue;
        };
        let value = if field.field_type == FieldType::ManyToMany {
            Value::Array(value.split(',').map(|v| Value::String(v.to_string())).collect())
        } else {
            Value::String(value.to_string())
        };
        initial.insert(name.to_string(), value);
    }
    Ok(FormDatas {
        initial,
        ..FormDatas::default()
    })
}

fn create_post_response(view: &mut AdminView, obj: &Record) -> AdminResult<String> {
    let meta = view.opts()?;
    let pk = obj.pk_string(&meta).unwrap_or_default();
    let change_url = view.model_admin_url("change", &[pk.as_str()])?;
    let msg = format!(
        "The {} \"<a class='alert-link' href='{}'>{}</a>\" was added successfully.",
        escape_html(&meta.verbose_name),
        escape_html(&change_url),
        escape_html(&obj.display(&meta))
    );
    let post = view.request.post();

    if post.contains_key("_continue") {
        if view.has_change_permission() {
            view.message_user(format!("{msg} You may edit it again below."), MessageLevel::Success);
            return Ok(change_url);
        }
        return view.model_admin_url("detail", &[pk.as_str()]);
    }
    if post.contains_key("_addanother") {
        view.message_user(
            format!("{msg} You may add another {} below.", escape_html(&meta.verbose_name)),
            MessageLevel::Success,
        );
        return Ok(view.request.path().to_string());
    }
    view.message_user(msg, MessageLevel::Success);
    if let Some(target) = post.get("_redirect").or_else(|| view.request.get().get("_redirect")) {
        return Ok(target.to_string());
    }
    if view.has_view_permission() {
        view.model_admin_url("changelist", &[])
    } else {
        view.get_admin_url("index", &[])
    }
}

fn update_post_response(view: &mut AdminView, obj: &Record) -> AdminResult<String> {
    let meta = view.opts()?;
    let pk = obj.pk_string(&meta).unwrap_or_default();
    let msg = format!(
        "The {} \"{}\" was changed successfully.",
        meta.verbose_name,
        obj.display(&meta)
    );
    let post = view.request.post();

    if post.contains_key("_continue") {
        if view.has_change_permission() {
            view.message_user(format!("{msg} You may edit it again below."), MessageLevel::Success);
            return Ok(view.request.path().to_string());
        }
        return view.model_admin_url("detail", &[pk.as_str()]);
    }
    if post.contains_key("_addanother") {
        view.message_user(
            format!("{msg} You may add another {} below.", meta.verbose_name),
            MessageLevel::Success,
        );
        return view.model_admin_url("add", &[]);
    }
    view.message_user(msg, MessageLevel::Success);
    if let Some(target) = post.get("_redirect") {
        return Ok(target.to_string());
    }
    if !view.has_view_permission() {
        return view.get_admin_url("index", &[]);
    }
    let mut url = view.model_admin_url("changelist", &[])?;
    if let Some(Value::Array(saved)) = view.request.session().get(LIST_QUERY_SESSION_KEY) {
        let same_model = saved.first() == Some(&json!([meta.app_label, meta.model_name]));
        match saved.get(1).and_then(Value::as_str) {
            Some(query) if same_model && !query.is_empty() => {
                url.push('?');
                url.push_str(query);
            }
            _ => {}
        }
    }
    Ok(url)
}

impl AdminView {
    /// Builds the unbound form for this request.
    pub fn prepare_form(&mut self) -> AdminResult<()> {
        let model_form = self.get_model_form()?;
        if let Some(state) = self.state_mut::<FormState>() {
            state.model_form = Some(model_form);
        } else {
            self.insert_state(FormState {
                model_form: Some(model_form),
                ..FormState::default()
            });
        }
        Ok(())
    }

    /// The unbound form: configured fields minus `exclude` and readonly
    /// fields.
    pub fn get_model_form(&mut self) -> AdminResult<ModelForm> {
        self.call_hook(&GET_MODEL_FORM, &(), |view, _| base_model_form(view))
    }

    /// The form field for `db_field`. Plugins decorate it here.
    pub fn formfield_for_dbfield(&mut self, formfield: FormField, db_field: &FieldDef) -> AdminResult<FormField> {
        self.call_hook(&FORMFIELD_FOR_DBFIELD, db_field, |_, _| Ok(formfield.clone()))
    }

    /// Passes every field of `form` through `formfield_for_dbfield`.
    pub fn apply_formfield_hooks(&mut self, form: &mut ModelForm) -> AdminResult<()> {
        let meta = self.opts()?;
        for formfield in form.fields().to_vec() {
            let Some(db_field) = meta.get_field(&formfield.name) else {
                continue;
            };
            let formfield = self.formfield_for_dbfield(formfield, db_field)?;
            form.set_field(formfield);
        }
        Ok(())
    }

    pub fn get_readonly_fields(&mut self) -> AdminResult<Vec<String>> {
        self.call_hook(&GET_READONLY_FIELDS, &(), |view, _| Ok(view.options.readonly_fields.clone()))
    }

    /// What the form is bound with. Changing binds the object and, on
    /// POST, the submitted data. Adding binds POST data, or takes initial
    /// values from the query string on GET.
    pub fn get_form_datas(&mut self) -> AdminResult<FormDatas> {
        self.call_hook(&GET_FORM_DATAS, &(), |view, _| base_form_datas(view))
    }

    /// Binds the prepared form.
    pub fn instance_forms(&mut self) -> AdminResult<()> {
        self.call_hook(&INSTANCE_FORMS, &(), |view, _| {
            let datas = view.get_form_datas()?;
            let state = view
                .state_mut::<FormState>()
                .ok_or_else(|| AdminError::ImproperlyConfigured("the form was never prepared".into()))?;
            let model_form = state
                .model_form
                .clone()
                .ok_or_else(|| AdminError::ImproperlyConfigured("the form was never prepared".into()))?;
            let mut form = model_form.with_initial(datas.initial);
            if let Some(instance) = datas.instance {
                form = form.with_instance(instance);
            }
            if let Some(data) = datas.data {
                form = form.bind(data);
            }
            state.form = Some(form);
            Ok(())
        })
    }

    pub fn valid_forms(&mut self) -> AdminResult<bool> {
        self.call_hook(&VALID_FORMS, &(), |view, _| {
            Ok(view
                .state_mut::<FormState>()
                .and_then(|s| s.form.as_mut())
                .map_or(false, ModelForm::is_valid))
        })
    }

    /// Builds `new_obj` from the cleaned form without persisting it.
    pub fn save_forms(&mut self) -> AdminResult<()> {
        self.call_hook(&SAVE_FORMS, &(), |view, _| {
            let state = view
                .state_mut::<FormState>()
                .ok_or_else(|| AdminError::ImproperlyConfigured("no form to save".into()))?;
            let form = state
                .form
                .as_mut()
                .ok_or_else(|| AdminError::ImproperlyConfigured("no form to save".into()))?;
            state.new_obj = Some(form.save()?);
            Ok(())
        })
    }

    /// Inserts or updates `new_obj` and logs the action.
    pub fn save_models(&mut self) -> AdminResult<()> {
        self.call_hook(&SAVE_MODELS, &(), |view, _| {
            let meta = view.opts()?;
            let state = view.state::<FormState>().cloned().unwrap_or_default();
            let Some(new_obj) = state.new_obj else {
                return Err(AdminError::ImproperlyConfigured("save_forms produced no object".into()));
            };
            let store = view.store();
            let (saved, flag) = match state.org_obj.as_ref().and_then(|o| o.pk_string(&meta)) {
                Some(pk) => (store.update(&meta, &pk, new_obj)?, ActionFlag::Change),
                None => (store.insert(&meta, new_obj)?, ActionFlag::Create),
            };
            if let Some(state) = view.state_mut::<FormState>() {
                state.new_obj = Some(saved.clone());
            }
            let message = view.change_message()?;
            view.log_obj(flag, message, Some(&saved))?;
            tracing::info!(model = %meta.label(), pk = ?saved.pk_string(&meta), action = %flag, "saved object");
            Ok(())
        })
    }

    /// Related objects are stored inline with the record; nothing to do
    /// unless a plugin adds it.
    pub fn save_related(&mut self) -> AdminResult<()> {
        self.call_hook(&SAVE_RELATED, &(), |_, _| Ok(()))
    }

    /// `Added.`, `Changed a and b.` or `No fields changed.`
    pub fn change_message(&mut self) -> AdminResult<String> {
        self.call_hook(&CHANGE_MESSAGE, &(), |view, _| {
            let state = view.state::<FormState>().cloned().unwrap_or_default();
            if state.org_obj.is_none() {
                return Ok("Added.".to_string());
            }
            let changed = state.form.map(|f| f.changed_data()).unwrap_or_default();
            Ok(if changed.is_empty() {
                "No fields changed.".to_string()
            } else {
                format!("Changed {}.", get_text_list(&changed, "and"))
            })
        })
    }

    /// Flashes the outcome and redirects according to `_continue`,
    /// `_addanother` and `_redirect`.
    pub fn post_response(&mut self) -> AdminResult<AdminResponse> {
        self.call_hook(&POST_RESPONSE, &(), |view, _| {
            let state = view.state::<FormState>().cloned().unwrap_or_default();
            let obj = state.new_obj.unwrap_or_default();
            let url = if state.org_obj.is_some() {
                update_post_response(view, &obj)?
            } else {
                create_post_response(view, &obj)?
            };
            Ok(AdminResponse::redirect(url))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xadmin_rs_db::{LogEntryStore, ModelStore};
    use xadmin_rs_test::{assert_redirects, assert_status, fixtures};

    use crate::views::testing::{admin, blog_site};

    const ARTICLE: &str = "blog.article";

    fn unchanged_article() -> [(&'static str, &'static str); 3] {
        [("title", "Hello"), ("status", "draft"), ("author", "1")]
    }

    fn bound_view(vt: &'static ViewType, url: &str, form: &[(&str, &str)], args: &[&str]) -> AdminView {
        let site = blog_site();
        let args = args.iter().map(ToString::to_string).collect();
        let mut view = site.get_view(vt, Some(ARTICLE), admin().post(url, form), args).unwrap();
        view.instance_forms().unwrap();
        assert!(view.valid_forms().unwrap());
        view
    }

    // ── Change messages ──────────────────────────────────────────────

    #[test]
    fn test_change_message_added() {
        let mut view = bound_view(&CREATE_VIEW, "/xadmin/blog/article/add/", &unchanged_article(), &[]);
        assert_eq!(view.change_message().unwrap(), "Added.");
    }

    #[test]
    fn test_change_message_lists_changed_fields() {
        let form = [("title", "Bonjour"), ("status", "published"), ("author", "1")];
        let mut view = bound_view(&UPDATE_VIEW, "/xadmin/blog/article/1/update/", &form, &["1"]);
        assert_eq!(view.change_message().unwrap(), "Changed title and status.");
    }

    #[test]
    fn test_change_message_without_changes() {
        let mut view = bound_view(&UPDATE_VIEW, "/xadmin/blog/article/1/update/", &unchanged_article(), &["1"]);
        assert_eq!(view.change_message().unwrap(), "No fields changed.");
    }

    #[test]
    fn test_saved_change_is_logged_with_message() {
        let site = blog_site();
        let form = [("title", "Bonjour"), ("status", "draft"), ("author", "1")];
        let response = site.handle(admin().post("/xadmin/blog/article/1/update/", &form));
        assert_status(&response, 302);
        let entries = site.log_store().get_for_object(ARTICLE, "1");
        assert_eq!(entries[0].message, "Changed title.");
    }

    // ── Create responses ─────────────────────────────────────────────

    #[test]
    fn test_create_continue_goes_to_change_form() {
        let site = blog_site();
        let factory = admin();
        let mut form = unchanged_article().to_vec();
        form.push(("_continue", "1"));
        let response = site.handle(factory.post("/xadmin/blog/article/add/", &form));
        assert_redirects(&response, "/xadmin/blog/article/6/update/");
        let messages = factory.session_handle().messages();
        assert!(messages[0].text.ends_with("You may edit it again below."));
    }

    #[test]
    fn test_create_add_another_returns_to_add_form() {
        let site = blog_site();
        let mut form = unchanged_article().to_vec();
        form.push(("_addanother", "1"));
        let response = site.handle(admin().post("/xadmin/blog/article/add/", &form));
        assert_redirects(&response, "/xadmin/blog/article/add/");
    }

    #[test]
    fn test_create_honours_redirect() {
        let site = blog_site();
        let mut form = unchanged_article().to_vec();
        form.push(("_redirect", "/xadmin/blog/"));
        let response = site.handle(admin().post("/xadmin/blog/article/add/", &form));
        assert_redirects(&response, "/xadmin/blog/");
    }

    #[test]
    fn test_create_defaults_to_changelist() {
        let site = blog_site();
        let response = site.handle(admin().post("/xadmin/blog/article/add/", &unchanged_article()));
        assert_redirects(&response, "/xadmin/blog/article/");
    }

    // ── Update responses ─────────────────────────────────────────────

    #[test]
    fn test_update_continue_stays_on_form() {
        let site = blog_site();
        let mut form = unchanged_article().to_vec();
        form.push(("_continue", "1"));
        let response = site.handle(admin().post("/xadmin/blog/article/1/update/", &form));
        assert_redirects(&response, "/xadmin/blog/article/1/update/");
    }

    #[test]
    fn test_update_add_another_goes_to_add_form() {
        let site = blog_site();
        let mut form = unchanged_article().to_vec();
        form.push(("_addanother", "1"));
        let response = site.handle(admin().post("/xadmin/blog/article/1/update/", &form));
        assert_redirects(&response, "/xadmin/blog/article/add/");
    }

    #[test]
    fn test_update_honours_redirect() {
        let site = blog_site();
        let mut form = unchanged_article().to_vec();
        form.push(("_redirect", "/xadmin/"));
        let response = site.handle(admin().post("/xadmin/blog/article/1/update/", &form));
        assert_redirects(&response, "/xadmin/");
    }

    #[test]
    fn test_save_as_new_creates_a_copy() {
        let site = blog_site();
        let meta = fixtures::article_meta();
        let form = [("title", "Copy"), ("status", "draft"), ("author", "1"), ("_saveasnew", "1")];
        let response = site.handle(admin().post("/xadmin/blog/article/1/update/", &form));
        assert_redirects(&response, "/xadmin/blog/article/");

        let store = site.store();
        let copy = store.get(&meta, "6").unwrap().unwrap();
        assert_eq!(copy.get("title"), Some(&json!("Copy")));
        let original = store.get(&meta, "1").unwrap().unwrap();
        assert_eq!(original.get("title"), Some(&json!("Hello")));
    }

    #[test]
    fn test_update_restores_saved_list_query() {
        let site = blog_site();
        let factory = admin();
        factory.session_handle().set(
            LIST_QUERY_SESSION_KEY,
            json!([["blog", "article"], "_p_status__exact=draft&o=title"]),
        );
        let response = site.handle(factory.post("/xadmin/blog/article/1/update/", &unchanged_article()));
        assert_redirects(&response, "/xadmin/blog/article/?_p_status__exact=draft&o=title");
    }

    #[test]
    fn test_saved_query_of_another_model_is_ignored() {
        let site = blog_site();
        let factory = admin();
        factory
            .session_handle()
            .set(LIST_QUERY_SESSION_KEY, json!([["blog", "author"], "q=ada"]));
        let response = site.handle(factory.post("/xadmin/blog/article/1/update/", &unchanged_article()));
        assert_redirects(&response, "/xadmin/blog/article/");
    }

    // ── Missing objects ──────────────────────────────────────────────

    #[test]
    fn test_update_missing_object_is_404() {
        let site = blog_site();
        let response = site.handle(admin().get("/xadmin/blog/article/99/update/"));
        assert_status(&response, 404);

        let err = site
            .get_view(&UPDATE_VIEW, Some(ARTICLE), admin().get("/"), vec!["99".into()])
            .unwrap_err();
        assert!(matches!(err, AdminError::NotFound(_)));
    }
}
