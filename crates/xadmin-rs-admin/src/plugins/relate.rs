//! Navigation between related models.
//!
//! [`RelateMenuPlugin`] adds a "related objects" column to the change list
//! with links to the lists of models pointing at each row. Those links
//! carry a `_rel_<lookup>=<value>` parameter, which the display plugins
//! pick up: the list is narrowed to the related objects, the add form is
//! prefilled, and redirects after saving or deleting keep the parameter.

use std::sync::Arc;

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use xadmin_rs_auth::Action;
use xadmin_rs_core::text::escape_html;
use xadmin_rs_core::{AdminError, AdminResult};
use xadmin_rs_db::lookups::{parse_lookup, LOOKUP_SEP};
use xadmin_rs_db::{FieldDef, FieldType, ModelMeta, QuerySet, Record};
use xadmin_rs_http::AdminResponse;
use xadmin_rs_template::Context;

use crate::hooks::Handler;
use crate::plugin::{AdminPlugin, PluginClass};
use crate::plugins::{related_meta, render_fragment};
use crate::view::AdminView;
use crate::views::base::GET_CONTEXT;
use crate::views::edit::{FormDatas, FormState, GET_FORM_DATAS, POST_RESPONSE};
use crate::views::list::{
    ItemArgs, ResultHeader, ResultItem, GET_LIST_DISPLAY, GET_LIST_QUERYSET, RESULT_HEADER, RESULT_ITEM,
    URL_FOR_RESULT,
};

/// Prefix of the relation parameter in the query string.
pub const RELATE_PREFIX: &str = "_rel_";

const RELATED_LINK: &str = "related_link";

// ── Related menu ─────────────────────────────────────────────────────

/// A model with a relation field pointing at the listed model.
#[derive(Debug, Clone)]
struct RelatedEntry {
    meta: Arc<ModelMeta>,
    field_name: String,
    view_perm: bool,
    add_perm: bool,
}

/// The related objects menu of the change list.
#[derive(Debug, Clone, Deserialize)]
pub struct RelateMenuPlugin {
    /// Labels of the models offered; empty offers all of them.
    pub related_list: Vec<String>,
    pub use_related_menu: bool,
    #[serde(skip)]
    related: Vec<RelatedEntry>,
}

impl AdminPlugin for RelateMenuPlugin {
    fn init_request(&mut self, _view: &mut AdminView) -> AdminResult<bool> {
        Ok(self.use_related_menu)
    }

    fn setup(&mut self, view: &mut AdminView) -> AdminResult<()> {
        let label = view.opts()?.label();
        let site = Arc::clone(view.site());
        for admin in site.registry().models() {
            let meta = admin.meta();
            if !self.related_list.is_empty() && !self.related_list.contains(&meta.label()) {
                continue;
            }
            let view_perm = view.has_model_perm(meta, &Action::View);
            let add_perm = view.has_model_perm(meta, &Action::Add);
            if !(view_perm || add_perm) {
                continue;
            }
            for field in meta.relations_to(&label) {
                self.related.push(RelatedEntry {
                    meta: Arc::clone(meta),
                    field_name: field.name.clone(),
                    view_perm,
                    add_perm,
                });
            }
        }
        Ok(())
    }
}

pub(crate) fn relate_menu_class() -> AdminResult<PluginClass> {
    PluginClass::builder("relate_menu", |settings| settings.deserialize::<RelateMenuPlugin>())
        .setting("related_list", json!([]))
        .setting("use_related_menu", true)
        .hook(&GET_LIST_DISPLAY, Handler::Filter(menu_list_display))
        .hook(&RESULT_HEADER, Handler::Filter(menu_result_header))
        .hook(&RESULT_ITEM, Handler::Filter(menu_result_item))
        .build()
}

fn menu_list_display(
    plugin: &RelateMenuPlugin,
    _view: &mut AdminView,
    mut list_display: Vec<String>,
    _: &(),
) -> AdminResult<Vec<String>> {
    if !plugin.related.is_empty() {
        list_display.push(RELATED_LINK.to_string());
    }
    Ok(list_display)
}

fn menu_result_header(
    _plugin: &RelateMenuPlugin,
    _view: &mut AdminView,
    mut header: ResultHeader,
    field_name: &String,
) -> AdminResult<ResultHeader> {
    if field_name == RELATED_LINK {
        header.text = "Related Objects".to_string();
        header.sortable = false;
        header.classes.push("related-links".to_string());
    }
    Ok(header)
}

#[derive(Debug, Serialize)]
struct MenuLink {
    title: String,
    view_url: Option<String>,
    add_url: Option<String>,
}

fn menu_result_item(
    plugin: &RelateMenuPlugin,
    view: &mut AdminView,
    mut item: ResultItem,
    args: &ItemArgs,
) -> AdminResult<ResultItem> {
    if args.field_name != RELATED_LINK {
        return Ok(item);
    }
    let meta = view.opts()?;
    let Some(pk) = args.record.pk_string(&meta) else {
        return Ok(item);
    };

    let mut links = Vec::with_capacity(plugin.related.len());
    for entry in &plugin.related {
        let query = format!(
            "?{RELATE_PREFIX}{}{LOOKUP_SEP}{}{LOOKUP_SEP}exact={}",
            entry.field_name,
            meta.pk_name,
            encode(&pk)
        );
        let view_url = if entry.view_perm {
            Some(view.get_model_url(&entry.meta, "changelist", &[])? + &query)
        } else {
            None
        };
        let add_url = if entry.add_perm {
            Some(view.get_model_url(&entry.meta, "add", &[])? + &query)
        } else {
            None
        };
        links.push(MenuLink {
            title: entry.meta.verbose_name_plural.clone(),
            view_url,
            add_url,
        });
    }

    let context = Context::new().with("menu_links", serde_json::to_value(&links)?);
    item.text = render_fragment(view, "xadmin/plugins/related_links.html", &context, || {
        menu_html(&links)
    })?;
    item.allow_tags = true;
    Ok(item)
}

fn menu_html(links: &[MenuLink]) -> String {
    let mut html = String::from(
        r#"<div class="dropdown related_menu pull-right"><a title="Related Objects" class="relate_menu dropdown-toggle" data-toggle="dropdown"><i class="icon fa fa-list"></i></a><ul class="dropdown-menu" role="menu">"#,
    );
    for link in links {
        html.push_str("<li class=\"with_menu_btn\">");
        match &link.view_url {
            Some(url) => html.push_str(&format!(
                r#"<a href="{}" class="section"><i class="icon fa fa-chevron-right"></i> {}</a>"#,
                escape_html(url),
                escape_html(&link.title)
            )),
            None => html.push_str(&format!(
                r#"<span class="section">{}</span>"#,
                escape_html(&link.title)
            )),
        }
        if let Some(url) = &link.add_url {
            html.push_str(&format!(
                r#"<a class="add_link dropdown-menu-btn" href="{}"><i class="icon fa fa-plus pull-right"></i></a>"#,
                escape_html(url)
            ));
        }
        html.push_str("</li>");
    }
    html.push_str("</ul></div>");
    html
}

// ── Relate object ────────────────────────────────────────────────────

/// The relation a request is narrowed to: `lookup` on the listed model
/// equals `value`.
#[derive(Debug, Clone)]
pub struct RelateObject {
    /// The lookup without the prefix, e.g. `author__id__exact`.
    pub lookup: String,
    pub value: String,
    /// The relation field the lookup starts with.
    pub field: FieldDef,
    pub to_meta: Arc<ModelMeta>,
    pub is_m2m: bool,
    /// The related objects the value selects.
    pub to_objs: Vec<Record>,
    verbose_name_plural: String,
}

impl RelateObject {
    /// Resolves `lookup` against the view's model and loads the objects on
    /// the other side.
    pub fn new(view: &AdminView, lookup: &str, value: &str) -> AdminResult<Self> {
        let meta = view.opts()?;
        let mut parts = lookup.split(LOOKUP_SEP);
        let first = parts.next().unwrap_or_default();
        let field = meta
            .get_field(first)
            .filter(|f| f.is_relation())
            .cloned()
            .ok_or_else(|| {
                AdminError::BadRequest(format!("Relate lookup field must be a related field: '{lookup}'"))
            })?;
        let to_meta = related_meta(view, &field).ok_or_else(|| {
            AdminError::BadRequest(format!(
                "{} points at an unregistered model",
                field.name
            ))
        })?;

        let rest: Vec<&str> = parts.collect();
        let rel_name = if rest.is_empty() {
            to_meta.pk_name.clone()
        } else {
            rest.join(LOOKUP_SEP)
        };
        let to_qs = QuerySet::new(to_meta.label()).filter(parse_lookup(&rel_name, Value::String(value.to_string()))?);
        let to_objs = view.store().fetch(&to_meta, &to_qs)?;

        Ok(Self {
            lookup: lookup.to_string(),
            value: value.to_string(),
            is_m2m: field.field_type == FieldType::ManyToMany,
            field,
            to_meta,
            to_objs,
            verbose_name_plural: meta.verbose_name_plural.clone(),
        })
    }

    /// Reads the first `_rel_` parameter of the query string.
    pub fn from_request(view: &AdminView) -> AdminResult<Option<Self>> {
        let found = view.request.get().items().find_map(|(k, v)| {
            k.strip_prefix(RELATE_PREFIX)
                .map(|lookup| (lookup.to_string(), v.to_string()))
        });
        match found {
            Some((lookup, value)) => Self::new(view, &lookup, &value).map(Some),
            None => Ok(None),
        }
    }

    /// Narrows a queryset of the listed model.
    pub fn filter(&self, queryset: QuerySet) -> AdminResult<QuerySet> {
        Ok(queryset.filter(parse_lookup(&self.lookup, Value::String(self.value.clone()))?))
    }

    /// Heading of the narrowed list.
    pub fn brand_name(&self) -> String {
        let to_name = match self.to_objs.as_slice() {
            [obj] => obj.display(&self.to_meta),
            _ => self.to_meta.verbose_name.clone(),
        };
        format!(
            "<span class='rel-brand'>{} <i class='fa fa-caret-right'></i></span> {}",
            escape_html(&to_name),
            escape_html(&self.verbose_name_plural)
        )
    }

    fn param_name(&self) -> String {
        format!("{RELATE_PREFIX}{}", self.lookup)
    }

    /// `url` with the relation parameter appended.
    pub fn get_url(&self, url: &str) -> String {
        let sep = if url.find('?').is_some_and(|i| i > 0) { '&' } else { '?' };
        format!("{url}{sep}{}={}", self.param_name(), encode(&self.value))
    }

    /// The relation parameter as a hidden form field.
    pub fn get_input(&self) -> String {
        format!(
            r#"<input type="hidden" name="{}" value="{}" />"#,
            escape_html(&self.param_name()),
            escape_html(&self.value)
        )
    }
}

fn encode(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}

/// Activates a display plugin when the request carries a relation.
fn activate(slot: &mut Option<RelateObject>, view: &mut AdminView) -> AdminResult<bool> {
    *slot = RelateObject::from_request(view)?;
    if let Some(obj) = slot {
        tracing::debug!(lookup = %obj.lookup, value = %obj.value, "relate filter active");
        view.insert_state(obj.clone());
    }
    Ok(slot.is_some())
}

/// Appends the relation to a redirect, except one to the dashboard.
fn keep_relation(obj: &RelateObject, view: &AdminView, response: AdminResponse) -> AdminResult<AdminResponse> {
    let Some(url) = response.redirect_url() else {
        return Ok(response);
    };
    if url == view.get_admin_url("index", &[])? {
        return Ok(response);
    }
    Ok(AdminResponse::redirect(obj.get_url(url)))
}

// ── List ─────────────────────────────────────────────────────────────

/// Narrows the change list to the objects related to one object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListRelateDisplayPlugin {
    #[serde(skip)]
    pub relate_obj: Option<RelateObject>,
}

impl AdminPlugin for ListRelateDisplayPlugin {
    fn init_request(&mut self, view: &mut AdminView) -> AdminResult<bool> {
        activate(&mut self.relate_obj, view)
    }
}

pub(crate) fn list_relate_class() -> AdminResult<PluginClass> {
    PluginClass::builder("list_relate_display", |settings| {
        settings.deserialize::<ListRelateDisplayPlugin>()
    })
    .hook(&GET_LIST_QUERYSET, Handler::Filter(list_queryset))
    .hook(&URL_FOR_RESULT, Handler::Filter(list_url_for_result))
    .hook(&GET_CONTEXT, Handler::Filter(list_context))
    .hook(&GET_LIST_DISPLAY, Handler::Filter(list_display))
    .build()
}

fn list_queryset(
    plugin: &ListRelateDisplayPlugin,
    _view: &mut AdminView,
    queryset: QuerySet,
    _: &(),
) -> AdminResult<QuerySet> {
    match &plugin.relate_obj {
        Some(obj) => obj.filter(queryset),
        None => Ok(queryset),
    }
}

fn list_url_for_result(
    plugin: &ListRelateDisplayPlugin,
    _view: &mut AdminView,
    url: Option<String>,
    _: &Record,
) -> AdminResult<Option<String>> {
    Ok(match (&plugin.relate_obj, url) {
        (Some(obj), Some(url)) => Some(obj.get_url(&url)),
        (_, url) => url,
    })
}

fn list_context(
    plugin: &ListRelateDisplayPlugin,
    _view: &mut AdminView,
    mut context: Context,
    _: &(),
) -> AdminResult<Context> {
    let Some(obj) = &plugin.relate_obj else {
        return Ok(context);
    };
    context.insert("brand_name", obj.brand_name());
    context.insert("rel_objs", serde_json::to_value(&obj.to_objs)?);
    if let [rel_obj] = obj.to_objs.as_slice() {
        context.insert("rel_obj", serde_json::to_value(rel_obj)?);
    }
    if let Some(add_url) = context.get_str("add_url").map(|url| obj.get_url(url)) {
        context.insert("add_url", add_url);
    }
    Ok(context)
}

fn list_display(
    plugin: &ListRelateDisplayPlugin,
    _view: &mut AdminView,
    mut list_display: Vec<String>,
    _: &(),
) -> AdminResult<Vec<String>> {
    if let Some(obj) = plugin.relate_obj.as_ref().filter(|obj| !obj.is_m2m) {
        list_display.retain(|name| *name != obj.field.name);
    }
    Ok(list_display)
}

// ── Edit ─────────────────────────────────────────────────────────────

/// Prefills the relation on the add form and keeps it across saves.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EditRelateDisplayPlugin {
    #[serde(skip)]
    pub relate_obj: Option<RelateObject>,
}

impl AdminPlugin for EditRelateDisplayPlugin {
    fn init_request(&mut self, view: &mut AdminView) -> AdminResult<bool> {
        activate(&mut self.relate_obj, view)
    }
}

pub(crate) fn edit_relate_class() -> AdminResult<PluginClass> {
    PluginClass::builder("edit_relate_display", |settings| {
        settings.deserialize::<EditRelateDisplayPlugin>()
    })
    .hook(&GET_FORM_DATAS, Handler::Filter(edit_form_datas))
    .hook(&POST_RESPONSE, Handler::Filter(edit_post_response))
    .hook(&GET_CONTEXT, Handler::Filter(edit_context))
    .block("after_fieldsets", edit_after_fieldsets)
    .build()
}

fn edit_form_datas(
    plugin: &EditRelateDisplayPlugin,
    view: &mut AdminView,
    mut datas: FormDatas,
    _: &(),
) -> AdminResult<FormDatas> {
    let Some(obj) = &plugin.relate_obj else {
        return Ok(datas);
    };
    let adding = view.state::<FormState>().map_or(true, |s| s.org_obj.is_none());
    if adding && view.request_method == "get" {
        datas
            .initial
            .insert(obj.field.name.clone(), Value::String(obj.value.clone()));
    }
    Ok(datas)
}

fn edit_post_response(
    plugin: &EditRelateDisplayPlugin,
    view: &mut AdminView,
    response: AdminResponse,
    _: &(),
) -> AdminResult<AdminResponse> {
    match &plugin.relate_obj {
        Some(obj) => keep_relation(obj, view, response),
        None => Ok(response),
    }
}

fn edit_context(
    plugin: &EditRelateDisplayPlugin,
    _view: &mut AdminView,
    mut context: Context,
    _: &(),
) -> AdminResult<Context> {
    if let Some(obj) = &plugin.relate_obj {
        if let Some(url) = context.get_str("delete_url").map(|url| obj.get_url(url)) {
            context.insert("delete_url", url);
        }
    }
    Ok(context)
}

fn edit_after_fieldsets(
    plugin: &EditRelateDisplayPlugin,
    _view: &mut AdminView,
    _context: &Context,
    _nodes: &mut Vec<String>,
) -> AdminResult<Option<String>> {
    Ok(plugin.relate_obj.as_ref().map(RelateObject::get_input))
}

// ── Delete ───────────────────────────────────────────────────────────

/// Keeps the relation across a deletion.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeleteRelateDisplayPlugin {
    #[serde(skip)]
    pub relate_obj: Option<RelateObject>,
}

impl AdminPlugin for DeleteRelateDisplayPlugin {
    fn init_request(&mut self, view: &mut AdminView) -> AdminResult<bool> {
        activate(&mut self.relate_obj, view)
    }
}

pub(crate) fn delete_relate_class() -> AdminResult<PluginClass> {
    PluginClass::builder("delete_relate_display", |settings| {
        settings.deserialize::<DeleteRelateDisplayPlugin>()
    })
    .hook(&POST_RESPONSE, Handler::Filter(delete_post_response))
    .block("form_fields", delete_form_fields)
    .build()
}

fn delete_post_response(
    plugin: &DeleteRelateDisplayPlugin,
    view: &mut AdminView,
    response: AdminResponse,
    _: &(),
) -> AdminResult<AdminResponse> {
    match &plugin.relate_obj {
        Some(obj) => keep_relation(obj, view, response),
        None => Ok(response),
    }
}

fn delete_form_fields(
    plugin: &DeleteRelateDisplayPlugin,
    _view: &mut AdminView,
    _context: &Context,
    _nodes: &mut Vec<String>,
) -> AdminResult<Option<String>> {
    Ok(plugin.relate_obj.as_ref().map(RelateObject::get_input))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relate_obj(lookup: &str, value: &str) -> RelateObject {
        let to_meta = Arc::new(ModelMeta::new("blog", "Author"));
        RelateObject {
            lookup: lookup.to_string(),
            value: value.to_string(),
            field: FieldDef::new("author", FieldType::ForeignKey).related_model("blog.author"),
            to_meta,
            is_m2m: false,
            to_objs: Vec::new(),
            verbose_name_plural: "articles".to_string(),
        }
    }

    #[test]
    fn test_get_url_appends_parameter() {
        let obj = relate_obj("author__id__exact", "3");
        assert_eq!(
            obj.get_url("/xadmin/blog/article/"),
            "/xadmin/blog/article/?_rel_author__id__exact=3"
        );
        assert_eq!(
            obj.get_url("/xadmin/blog/article/?p=2"),
            "/xadmin/blog/article/?p=2&_rel_author__id__exact=3"
        );
    }

    #[test]
    fn test_get_url_encodes_value() {
        let obj = relate_obj("author__name__exact", "a b&c");
        assert_eq!(obj.get_url("/x/"), "/x/?_rel_author__name__exact=a%20b%26c");
    }

    #[test]
    fn test_get_input() {
        let obj = relate_obj("author__id__exact", "3");
        assert_eq!(
            obj.get_input(),
            r#"<input type="hidden" name="_rel_author__id__exact" value="3" />"#
        );
    }

    #[test]
    fn test_filter_predicate() {
        let obj = relate_obj("author__id__exact", "3");
        let qs = obj.filter(QuerySet::new("blog.article")).unwrap();
        assert_eq!(qs.predicates(), vec!["author.id = '3'".to_string()]);
    }

    #[test]
    fn test_brand_name_single_object() {
        let mut obj = relate_obj("author__id__exact", "3");
        assert!(obj.brand_name().contains("author <i"));
        obj.to_objs.push(Record::new().with("id", 3).with("name", "Ann"));
        assert!(obj.brand_name().ends_with(" articles"));
    }
}
