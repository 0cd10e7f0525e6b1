//! Forms embedded in other pages over ajax.
//!
//! An ajax GET of an add or change form (or any request with `_ajax`)
//! renders the bare quick form template. `_field=a,b` restricts the form to
//! those fields and prefills them from same-named query parameters. Input
//! names are prefixed with `quickform-<app>-<model>-<hash>` so the embedded
//! form cannot clash with the page around it.
//!
//! [`QuickFormFormSetPlugin`] reads that prefix back when an embedded form
//! is posted over ajax, and [`QuickAddBtnPlugin`] puts the buttons opening
//! such forms next to relation inputs.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use xadmin_rs_auth::Action;
use xadmin_rs_core::{AdminError, AdminResult};
use xadmin_rs_db::{FieldDef, FieldType};
use xadmin_rs_forms::{FieldButton, FormField, ModelForm, ModelFormConfig};
use xadmin_rs_http::QueryDict;
use xadmin_rs_template::{Context, Media};

use crate::hooks::{Handler, Next};
use crate::plugin::{AdminPlugin, PluginClass};
use crate::plugins::filters::SEARCH_VAR;
use crate::plugins::{related_meta, related_pk};
use crate::view::AdminView;
use crate::views::base::{GET_CONTEXT, GET_MEDIA};
use crate::views::edit::{FormDatas, FormState, FORMFIELD_FOR_DBFIELD, GET_FORM_DATAS, GET_MODEL_FORM};

/// Set by the first load of a quick form.
pub const QUICKFORM_0_VAR: &str = "_qfrm0";
/// Comma-separated fields the quick form is restricted to.
pub const FIELD_VAR: &str = "_field";

const QUICK_FORM_TEMPLATE: &str = "xadmin/views/quick_form.html";
const HASH_LEN: usize = 5;

static GENERIC_PREFIX: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^(\w+[-_]\d+)-\w+$").ok());

/// The quick form plugin.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuickFormPlugin {
    /// The prefix of this request's form inputs.
    #[serde(skip)]
    pub prefix: String,
    /// Whether `prefix` was read back from submitted input names.
    #[serde(skip)]
    pub resolved: bool,
}

impl AdminPlugin for QuickFormPlugin {
    fn init_request(&mut self, view: &mut AdminView) -> AdminResult<bool> {
        let params = view.request.get();
        let embedded = view.request_method == "get"
            && !params.contains_key(SEARCH_VAR)
            && !params.contains_key(QUICKFORM_0_VAR)
            && view.request.is_ajax();
        Ok(embedded || params.get("_ajax").is_some_and(|v| !v.is_empty()))
    }

    fn setup(&mut self, view: &mut AdminView) -> AdminResult<()> {
        view.options.add_form_template = Some(QUICK_FORM_TEMPLATE.to_string());
        view.options.change_form_template = Some(QUICK_FORM_TEMPLATE.to_string());

        let meta = view.opts()?;
        let name = format!("quickform-{}-{}", meta.app_label, meta.model_name);
        let keys: Vec<&str> = view.request.get().keys().chain(view.request.post().keys()).collect();
        match resolve_prefix(&name, &keys)? {
            Some(prefix) => {
                self.prefix = prefix;
                self.resolved = true;
            }
            None => {
                let hash = uuid::Uuid::new_v4().simple().to_string();
                self.prefix = format!("{name}-{}", &hash[..HASH_LEN]);
            }
        }
        tracing::debug!(prefix = %self.prefix, resolved = self.resolved, "quick form");
        Ok(())
    }
}

pub(crate) fn plugin_class() -> AdminResult<PluginClass> {
    PluginClass::builder("quickform", |settings| settings.deserialize::<QuickFormPlugin>())
        .hook(&GET_MODEL_FORM, Handler::Wrap(get_model_form))
        .hook(&GET_FORM_DATAS, Handler::Filter(get_form_datas))
        .hook(&GET_CONTEXT, Handler::Filter(get_context))
        .build()
}

/// Finds the prefix of submitted input names: `<name>-<hash>` first, then
/// any `<word>-<digits>-<field>` shaped name.
fn resolve_prefix(name: &str, keys: &[&str]) -> AdminResult<Option<String>> {
    let own = Regex::new(&format!("^({}-[a-z0-9]+)", regex::escape(name)))
        .map_err(|e| AdminError::ImproperlyConfigured(e.to_string()))?;
    let found = keys
        .iter()
        .find_map(|key| own.captures(key))
        .or_else(|| {
            let generic = GENERIC_PREFIX.as_ref()?;
            keys.iter().find_map(|key| generic.captures(key))
        })
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());
    Ok(found)
}

/// Field names without the input prefix.
fn clean_fields<'a>(prefix: &str, fields: &'a str) -> Vec<&'a str> {
    fields
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(|f| f.strip_prefix(prefix).map_or(f, |rest| rest.trim_start_matches('-')))
        .collect()
}

fn requested_fields(view: &AdminView) -> Option<String> {
    view.request.get().get(FIELD_VAR).map(str::to_string)
}

fn get_model_form(
    plugin: &QuickFormPlugin,
    view: &mut AdminView,
    _: &(),
    next: Next<'_, ModelForm, ()>,
) -> AdminResult<ModelForm> {
    let Some(fields) = requested_fields(view) else {
        return Ok(next.call(view)?.with_prefix(plugin.prefix.clone()));
    };
    let meta = view.opts()?;
    let config = ModelFormConfig::new().fields(clean_fields(&plugin.prefix, &fields));
    let mut form = ModelForm::for_model(&meta, &config)?;
    view.apply_formfield_hooks(&mut form)?;
    Ok(if plugin.resolved {
        form.with_prefix(plugin.prefix.clone())
    } else {
        form
    })
}

fn get_form_datas(
    _plugin: &QuickFormPlugin,
    view: &mut AdminView,
    mut datas: FormDatas,
    _: &(),
) -> AdminResult<FormDatas> {
    if view.request_method != "get" {
        return Ok(datas);
    }
    let Some(fields) = requested_fields(view) else {
        return Ok(datas);
    };
    let meta = view.opts()?;
    let form_prefix = view
        .state::<FormState>()
        .and_then(|s| s.model_form.as_ref())
        .map(|form| form.add_prefix(""))
        .unwrap_or_default();

    for key in fields.split(',').map(str::trim) {
        let name = key.strip_prefix(form_prefix.as_str()).unwrap_or(key);
        let Some(field) = meta.get_field(name) else {
            continue;
        };
        let Some(raw) = view.request.get().get(key) else {
            continue;
        };
        let value = if field.field_type == FieldType::ManyToMany {
            Value::Array(raw.split(',').map(|v| Value::String(v.to_string())).collect())
        } else {
            Value::String(raw.to_string())
        };
        datas.initial.insert(name.to_string(), value);
    }
    Ok(datas)
}

fn get_context(
    _plugin: &QuickFormPlugin,
    view: &mut AdminView,
    mut context: Context,
    _: &(),
) -> AdminResult<Context> {
    context.insert("form_url", view.request.path().to_string());
    Ok(context)
}

// ── Formset prefixes ─────────────────────────────────────────────────

/// Applies the submitted quick form prefix to forms posted over ajax, so
/// an embedded form saves even when it was loaded without `_ajax`.
#[derive(Debug, Clone, Default)]
pub struct QuickFormFormSetPlugin;

impl AdminPlugin for QuickFormFormSetPlugin {
    fn init_request(&mut self, view: &mut AdminView) -> AdminResult<bool> {
        let params = view.request.get();
        let embedded = !params.contains_key(QUICKFORM_0_VAR) && view.request.is_ajax();
        Ok(embedded || params.get("_ajax").is_some_and(|v| !v.is_empty()))
    }
}

pub(crate) fn formset_class() -> AdminResult<PluginClass> {
    PluginClass::builder("quickformset", |_| Ok(QuickFormFormSetPlugin))
        .hook(&GET_MODEL_FORM, Handler::Filter(formset_model_form))
        .build()
}

fn formset_model_form(
    _plugin: &QuickFormFormSetPlugin,
    view: &mut AdminView,
    form: ModelForm,
    _: &(),
) -> AdminResult<ModelForm> {
    if view.request_method != "post" {
        return Ok(form);
    }
    let meta = view.opts()?;
    let name = format!("quickform-{}-{}", meta.app_label, meta.model_name);
    let keys: Vec<&str> = view.request.post().keys().collect();
    Ok(match resolve_prefix(&name, &keys)? {
        Some(prefix) => form.with_prefix(prefix),
        None => form,
    })
}

// ── Add and change buttons ───────────────────────────────────────────

/// Adds buttons opening quick forms next to relation inputs: one creating
/// a related object, and for fields in `quick_changebtn_db_fields` one
/// changing the selected object.
#[derive(Debug, Clone, Deserialize)]
pub struct QuickAddBtnPlugin {
    /// Field names left alone.
    pub quick_addbtn_fields_exclude: Vec<String>,
    /// Field types left alone.
    pub quick_addbtn_db_fields_exclude: Vec<FieldType>,
    /// Foreign keys that also get a change button.
    pub quick_changebtn_db_fields: Vec<String>,
    pub quick_addbtn_enabled: bool,
}

impl AdminPlugin for QuickAddBtnPlugin {
    fn init_request(&mut self, _view: &mut AdminView) -> AdminResult<bool> {
        Ok(self.quick_addbtn_enabled)
    }
}

pub(crate) fn add_btn_class() -> AdminResult<PluginClass> {
    PluginClass::builder("quick_addbtn", |settings| settings.deserialize::<QuickAddBtnPlugin>())
        .setting("quick_addbtn_fields_exclude", json!([]))
        .setting("quick_addbtn_db_fields_exclude", json!([]))
        .setting("quick_changebtn_db_fields", json!([]))
        .setting("quick_addbtn_enabled", true)
        .hook(&FORMFIELD_FOR_DBFIELD, Handler::Filter(formfield_for_dbfield))
        .hook(&GET_MEDIA, Handler::Filter(add_btn_media))
        .build()
}

/// `<url>?_field=<name>&<name>=`, reloading just this input.
fn refresh_url(url: &str, name: &str) -> String {
    format!("{url}?{}", QueryDict::from_pairs([(FIELD_VAR, name), (name, "")]).urlencode())
}

fn formfield_for_dbfield(
    plugin: &QuickAddBtnPlugin,
    view: &mut AdminView,
    mut formfield: FormField,
    db_field: &FieldDef,
) -> AdminResult<FormField> {
    if plugin.quick_addbtn_fields_exclude.contains(&db_field.name)
        || plugin.quick_addbtn_db_fields_exclude.contains(&db_field.field_type)
        || !db_field.is_relation()
    {
        return Ok(formfield);
    }
    let Some(rel_meta) = related_meta(view, db_field) else {
        return Ok(formfield);
    };
    let meta = view.opts()?;

    let mut buttons = Vec::new();
    let single = matches!(db_field.field_type, FieldType::ForeignKey | FieldType::OneToOne);
    if single
        && plugin.quick_changebtn_db_fields.contains(&db_field.name)
        && view.has_model_perm(&rel_meta, &Action::Change)
    {
        let org_obj = view.state::<FormState>().and_then(|s| s.org_obj.clone());
        let pks = org_obj.and_then(|obj| {
            let pk = obj.pk_string(&meta)?;
            let rel_pk = obj.get(&db_field.name).and_then(|v| related_pk(v, &rel_meta))?;
            Some((pk, rel_pk))
        });
        if let Some((pk, rel_pk)) = pks {
            buttons.push(FieldButton {
                action: "change".into(),
                title: format!("Change {}", rel_meta.verbose_name),
                editable_url: view.get_model_url(&rel_meta, "change", &[rel_pk.as_str()])?,
                refresh_url: refresh_url(&view.get_model_url(&meta, "change", &[pk.as_str()])?, &db_field.name),
                icon: "fa fa-edit".into(),
            });
        }
    }
    if view.has_model_perm(&rel_meta, &Action::Add) {
        buttons.push(FieldButton {
            action: "add".into(),
            title: format!("Create New {}", rel_meta.verbose_name),
            editable_url: view.get_model_url(&rel_meta, "add", &[])?,
            refresh_url: refresh_url(&view.get_model_url(&meta, "add", &[])?, &db_field.name),
            icon: "fa fa-plus".into(),
        });
    }
    formfield.buttons.extend(buttons);
    Ok(formfield)
}

fn add_btn_media(_: &QuickAddBtnPlugin, view: &mut AdminView, media: Media, _: &()) -> AdminResult<Media> {
    let has_buttons = view
        .state::<FormState>()
        .and_then(|s| s.model_form.as_ref())
        .is_some_and(|form| form.fields().iter().any(|f| !f.buttons.is_empty()));
    if has_buttons {
        Ok(media + view.vendor(&["xadmin.plugin.quick-form.js"])?)
    } else {
        Ok(media)
    }
}
