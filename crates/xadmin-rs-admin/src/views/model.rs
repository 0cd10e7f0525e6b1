//! `ModelAdminView`: everything bound to one model.

use serde_json::{json, Map, Value};
use xadmin_rs_auth::{check_permission, Action};
use xadmin_rs_core::AdminResult;
use xadmin_rs_db::{ActionFlag, LogEntry, QuerySet, Record};
use xadmin_rs_http::AdminResponse;
use xadmin_rs_template::Context;

use crate::hooks::Hook;
use crate::view::AdminView;
use crate::view_type::{ViewHandler, ViewType};
use crate::views::comm::COMM_ADMIN_VIEW;

/// The base queryset of the model.
pub static QUERYSET: Hook<QuerySet> = Hook::new("queryset");
/// Loads a record by primary key; `None` when it does not exist.
pub static GET_OBJECT: Hook<Option<Record>, String> = Hook::new("get_object");
/// The URL an object links to, if the user may open it.
pub static GET_OBJECT_URL: Hook<Option<String>, Record> = Hook::new("get_object_url");
/// Turns the finished context into the page response.
pub static GET_RESPONSE: Hook<AdminResponse, Context> = Hook::new("get_response");
/// Writes an admin log entry for an edited object.
pub static LOG_OBJ: Hook<LogEntry, LogArgs> = Hook::new("log_obj");

/// Arguments of [`LOG_OBJ`].
#[derive(Debug, Clone)]
pub struct LogArgs {
    pub flag: ActionFlag,
    pub message: String,
    pub obj: Option<Record>,
}

pub(crate) struct ModelHandler;

impl ViewHandler for ModelHandler {
    fn get_context(&self, _vt: &'static ViewType, view: &mut AdminView) -> AdminResult<Context> {
        let mut context = COMM_ADMIN_VIEW.get_context(view)?;
        let meta = view.opts()?;
        let icon = view.get_model_icon(&meta.label())?;
        context.insert("opts", serde_json::to_value(meta.as_ref())?);
        context.insert("app_label", meta.app_label.clone());
        context.insert("model_name", meta.model_name.clone());
        context.insert("verbose_name", meta.verbose_name.clone());
        context.insert("model_icon", icon);
        Ok(context)
    }

    fn get_breadcrumb(&self, _vt: &'static ViewType, view: &mut AdminView) -> AdminResult<Vec<Value>> {
        let mut crumbs = COMM_ADMIN_VIEW.get_breadcrumb(view)?;
        let meta = view.opts()?;
        let mut item = Map::new();
        item.insert("title".into(), meta.verbose_name_plural.clone().into());
        if view.has_view_permission() {
            if let Ok(url) = view.model_admin_url("changelist", &[]) {
                item.insert("url".into(), url.into());
            }
        }
        crumbs.push(Value::Object(item));
        Ok(crumbs)
    }
}

/// Base of every view bound to a model.
pub static MODEL_ADMIN_VIEW: ViewType =
    ViewType::new("ModelAdminView", Some(&COMM_ADMIN_VIEW), &ModelHandler);

impl AdminView {
    /// All records of the model, unfiltered.
    pub fn queryset(&mut self) -> AdminResult<QuerySet> {
        self.call_hook(&QUERYSET, &(), |view, _| Ok(QuerySet::new(view.opts()?.label())))
    }

    /// Loads a record by primary key.
    pub fn get_object(&mut self, object_id: &str) -> AdminResult<Option<Record>> {
        self.call_hook(&GET_OBJECT, &object_id.to_string(), |view, pk| {
            let meta = view.opts()?;
            view.store().get(&meta, pk)
        })
    }

    /// The change page if the user may change the object, else its detail
    /// page if they may view it.
    pub fn get_object_url(&mut self, obj: &Record) -> AdminResult<Option<String>> {
        self.call_hook(&GET_OBJECT_URL, obj, |view, obj| {
            let meta = view.opts()?;
            let Some(pk) = obj.pk_string(&meta) else {
                return Ok(None);
            };
            if view.has_change_permission() {
                view.model_admin_url("change", &[pk.as_str()]).map(Some)
            } else if view.has_view_permission() {
                view.model_admin_url("detail", &[pk.as_str()]).map(Some)
            } else {
                Ok(None)
            }
        })
    }

    /// Records an action on an object of this model.
    pub fn log_obj(&mut self, flag: ActionFlag, message: impl Into<String>, obj: Option<&Record>) -> AdminResult<LogEntry> {
        let args = LogArgs {
            flag,
            message: message.into(),
            obj: obj.cloned(),
        };
        self.call_hook(&LOG_OBJ, &args, |view, args| {
            Ok(view.log(args.flag, args.message.clone(), args.obj.as_ref()))
        })
    }

    /// Renders the page with the view type's templates.
    pub fn get_response(&mut self, context: Context) -> AdminResult<AdminResponse> {
        self.call_hook(&GET_RESPONSE, &context, |view, context| {
            let templates = view.view_type().template_names(view);
            view.template_response(templates, context.clone())
        })
    }

    /// Reverses one of this model's named views.
    pub fn model_admin_url(&self, name: &str, args: &[&str]) -> AdminResult<String> {
        let meta = self.opts()?;
        self.get_model_url(&meta, name, args)
    }

    /// Configured ordering, else the model's default ordering.
    pub fn get_ordering(&self) -> Vec<String> {
        match (&self.options.ordering, &self.model) {
            (Some(ordering), _) => ordering.clone(),
            (None, Some(meta)) => meta.ordering.clone(),
            (None, None) => Vec::new(),
        }
    }

    /// `xadmin/<app>/<model>/<name>`, `xadmin/<app>/<name>`, `xadmin/<name>`.
    pub fn get_template_list(&self, name: &str) -> Vec<String> {
        match &self.model {
            Some(meta) => vec![
                format!("xadmin/{}/{}/{name}", meta.app_label, meta.object_name.to_lowercase()),
                format!("xadmin/{}/{name}", meta.app_label),
                format!("xadmin/{name}"),
            ],
            None => vec![format!("xadmin/{name}")],
        }
    }

    /// Whether this admin grants `action` to the current user. Actions in
    /// `remove_permissions` are never granted.
    pub fn has_auth_permission(&self, action: &Action) -> bool {
        if self.options.remove_permissions.iter().any(|p| p == action.as_str()) {
            return false;
        }
        self.model
            .as_deref()
            .map_or(false, |meta| check_permission(&self.user, meta, action))
    }

    pub fn has_view_permission(&self) -> bool {
        self.has_auth_permission(&Action::View)
    }

    pub fn has_add_permission(&self) -> bool {
        self.has_auth_permission(&Action::Add)
    }

    pub fn has_change_permission(&self) -> bool {
        self.has_auth_permission(&Action::Change)
    }

    pub fn has_delete_permission(&self) -> bool {
        self.has_auth_permission(&Action::Delete)
    }

    /// The four standard permissions as a JSON object.
    pub fn get_model_perms(&self) -> Value {
        json!({
            "view": self.has_view_permission(),
            "add": self.has_add_permission(),
            "change": self.has_change_permission(),
            "delete": self.has_delete_permission(),
        })
    }
}
