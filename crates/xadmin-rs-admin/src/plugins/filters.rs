//! List filters and keyword search.
//!
//! Query parameters prefixed with `_p_` are lookups applied to the list
//! queryset (`_p_status__exact=published`, `_p_author__id__in=1,2`). The
//! `_q_` parameter searches the configured `search_fields`: every word must
//! match at least one field.
//!
//! Search field prefixes:
//!
//! | prefix | lookup |
//! |---|---|
//! | `^` | `istartswith` |
//! | `=` | `iexact` |
//! | `@` | `search` |
//! | none | `icontains` |
//!
//! Settings:
//!
//! - `list_filter`: field paths offered as filters in the menu.
//! - `search_fields`: fields searched by `_q_`.
//! - `free_query_filter`: when `false`, only lookups on `list_filter`
//!   paths (or a model's own fields) are accepted.

use std::sync::Arc;

use chrono::{Datelike, Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use xadmin_rs_core::text::escape_html;
use xadmin_rs_core::{AdminError, AdminResult};
use xadmin_rs_db::lookups::{parse_lookup, split_lookup, Lookup, Q, LOOKUP_SEP};
use xadmin_rs_db::{FieldDef, FieldType, ModelMeta, QuerySet};
use xadmin_rs_http::MessageLevel;
use xadmin_rs_template::{Context, Media};

use crate::hooks::Handler;
use crate::plugin::{AdminPlugin, PluginClass};
use crate::plugins::{related_meta, render_fragment};
use crate::view::AdminView;
use crate::views::base::{GET_CONTEXT, GET_MEDIA};
use crate::views::list::GET_LIST_QUERYSET;

/// Prefix of filter lookups in the query string.
pub const FILTER_PREFIX: &str = "_p_";
/// The search parameter.
pub const SEARCH_VAR: &str = "_q_";

/// The filter plugin. Its fields are its settings.
#[derive(Debug, Clone, Deserialize)]
pub struct FilterPlugin {
    pub list_filter: Vec<String>,
    pub search_fields: Vec<String>,
    pub free_query_filter: bool,
}

impl AdminPlugin for FilterPlugin {}

/// How a filter is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    Boolean,
    Choices,
    Related,
    Date,
    Number,
    Text,
}

/// One selectable entry of a filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterChoice {
    pub display: String,
    pub selected: bool,
    /// `?query` selecting this entry.
    pub query_string: String,
}

/// One filter offered in the menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterSpec {
    pub field_path: String,
    pub title: String,
    pub kind: FilterKind,
    /// Query parameters this filter reads, prefix included.
    pub lookup_params: Vec<String>,
    /// Current values of `lookup_params`, in the same order.
    pub values: Vec<Option<String>>,
    pub is_used: bool,
    pub choices: Vec<FilterChoice>,
}

/// What the filter plugin learned about the request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FilterState {
    pub has_filters: bool,
    pub has_query_param: bool,
    /// The current query without any filter.
    pub clean_query_url: String,
    pub search_query: String,
    pub used_filter_num: usize,
    pub filter_specs: Vec<FilterSpec>,
}

pub(crate) fn plugin_class() -> AdminResult<PluginClass> {
    PluginClass::builder("filter", |settings| settings.deserialize::<FilterPlugin>())
        .setting("list_filter", json!([]))
        .setting("search_fields", json!([]))
        .setting("free_query_filter", true)
        .hook(&GET_LIST_QUERYSET, Handler::Filter(get_list_queryset))
        .hook(&GET_CONTEXT, Handler::Filter(get_context))
        .hook(&GET_MEDIA, Handler::Filter(get_media))
        .block("nav_menu", block_nav_menu)
        .block("nav_form", block_nav_form)
        .build()
}

// ── Queryset ─────────────────────────────────────────────────────────

fn get_list_queryset(
    plugin: &FilterPlugin,
    view: &mut AdminView,
    queryset: QuerySet,
    _: &(),
) -> AdminResult<QuerySet> {
    let meta = view.opts()?;
    let lookup_params: Vec<(String, Value)> = view
        .request
        .get()
        .items()
        .filter(|(_, v)| !v.is_empty())
        .filter_map(|(k, v)| {
            let key = k.strip_prefix(FILTER_PREFIX)?;
            let value = if v == "False" {
                Value::Bool(false)
            } else {
                Value::String(v.to_string())
            };
            Some((key.to_string(), value))
        })
        .collect();
    let clean_query_url = view.get_query_string(&[], &[FILTER_PREFIX])?;

    if !plugin.free_query_filter {
        let site = Arc::clone(view.site());
        for (key, _) in &lookup_params {
            let allowed = lookup_allowed(&plugin.list_filter, &meta, key, |label| {
                site.registry().get_registry(label).ok().map(|m| Arc::clone(m.meta()))
            });
            if !allowed {
                return Err(AdminError::SuspiciousOperation(format!("Filtering by {key} not allowed")));
            }
        }
    }

    let mut filter_specs = Vec::with_capacity(plugin.list_filter.len());
    for path in &plugin.list_filter {
        filter_specs.push(build_spec(view, &meta, path)?);
    }

    let mut queryset = queryset;
    let mut use_distinct = false;
    let has_query_param = !lookup_params.is_empty();
    for (key, value) in lookup_params {
        let (path, op) = split_lookup(&key);
        let first = path.split(LOOKUP_SEP).next().unwrap_or_default();
        let Some(field) = meta.get_field(first) else {
            return Err(AdminError::IncorrectLookupParameters(format!(
                "{} has no field named '{first}'",
                meta.object_name
            )));
        };
        if path == field.name {
            if let Err(message) = validate_value(field, op, &value) {
                view.message_user(format!("<b>Filtering error:</b> {message}"), MessageLevel::Error);
                continue;
            }
        }
        use_distinct |= field.field_type == FieldType::ManyToMany;
        queryset = queryset.filter(parse_lookup(&key, value)?);
    }

    let search_query = view.request.get().get(SEARCH_VAR).unwrap_or_default().trim().to_string();
    if !plugin.search_fields.is_empty() && !search_query.is_empty() {
        for bit in search_query.split_whitespace() {
            let any_field = plugin
                .search_fields
                .iter()
                .map(|field| construct_search(field, bit))
                .reduce(|a, b| a | b);
            if let Some(q) = any_field {
                queryset = queryset.filter(q);
            }
        }
        use_distinct |= plugin.search_fields.iter().any(|f| {
            let name = f.trim_start_matches(['^', '=', '@']);
            let first = name.split(LOOKUP_SEP).next().unwrap_or_default();
            meta.get_field(first)
                .map_or(false, |f| f.field_type == FieldType::ManyToMany)
        });
    }

    let used_filter_num = filter_specs.iter().filter(|s| s.is_used).count();
    tracing::debug!(
        model = %meta.label(),
        filters = used_filter_num,
        search = %search_query,
        "applied list filters"
    );
    view.insert_state(FilterState {
        has_filters: !filter_specs.is_empty(),
        has_query_param,
        clean_query_url,
        search_query,
        used_filter_num,
        filter_specs,
    });

    Ok(if use_distinct { queryset.distinct() } else { queryset })
}

/// The lookup of one search field for one word.
pub fn construct_search(field_name: &str, bit: &str) -> Q {
    if let Some(name) = field_name.strip_prefix('^') {
        Q::filter(name, Lookup::IStartsWith(bit.to_string()))
    } else if let Some(name) = field_name.strip_prefix('=') {
        Q::filter(name, Lookup::IExact(bit.to_string()))
    } else if let Some(name) = field_name.strip_prefix('@') {
        Q::filter(name, Lookup::Search(bit.to_string()))
    } else {
        Q::filter(field_name, Lookup::IContains(bit.to_string()))
    }
}

/// Whether a lookup may be used when free query filtering is off.
///
/// Lookups on a single field of the model are allowed. Paths through
/// relations must be listed in `list_filter`; a trailing primary key of the
/// related model is implied (`author__id` is allowed by `author`).
pub fn lookup_allowed(
    list_filter: &[String],
    meta: &ModelMeta,
    lookup: &str,
    related: impl Fn(&str) -> Option<Arc<ModelMeta>>,
) -> bool {
    let (path, _) = split_lookup(lookup);
    let mut parts: Vec<&str> = path.split(LOOKUP_SEP).collect();

    let mut current = Arc::new(meta.clone());
    let mut rel_name: Option<String> = None;
    for part in &parts[..parts.len().saturating_sub(1)] {
        let Some(field) = current.get_field(part).cloned() else {
            // Unknown fields are rejected when the lookup is applied.
            return true;
        };
        match field.related_model.as_deref().and_then(&related) {
            Some(target) => {
                rel_name = Some(target.pk_name.clone());
                current = target;
            }
            None if field.is_relation() => rel_name = Some("id".to_string()),
            None => rel_name = None,
        }
    }
    if parts.len() > 1 && rel_name.as_deref() == parts.last().copied() {
        parts.pop();
    }
    if parts.len() == 1 {
        return true;
    }
    let clean_lookup = parts.join(LOOKUP_SEP);
    list_filter.iter().any(|f| *f == clean_lookup)
}

/// Checks a filter value against the type of the field it targets.
fn validate_value(field: &FieldDef, op: &str, value: &Value) -> Result<(), String> {
    let Value::String(raw) = value else {
        return Ok(());
    };
    let values: Vec<&str> = if matches!(op, "in" | "range") {
        raw.split(',').collect()
    } else if matches!(op, "exact" | "gt" | "gte" | "lt" | "lte") {
        vec![raw.as_str()]
    } else {
        return Ok(());
    };
    for v in values {
        let ok = match field.field_type {
            FieldType::Auto | FieldType::Integer => v.trim().parse::<i64>().is_ok(),
            FieldType::Float => v.trim().parse::<f64>().is_ok(),
            FieldType::Boolean => matches!(v, "1" | "0" | "true" | "false" | "True" | "False"),
            FieldType::Date | FieldType::DateTime => {
                v.get(..10).map_or(false, |d| NaiveDate::parse_from_str(d, "%Y-%m-%d").is_ok())
            }
            _ => true,
        };
        if !ok {
            return Err(format!("'{}' is not a valid value for {}.", v, field.verbose_name));
        }
    }
    Ok(())
}

// ── Filter specs ─────────────────────────────────────────────────────

fn build_spec(view: &AdminView, meta: &Arc<ModelMeta>, path: &str) -> AdminResult<FilterSpec> {
    let mut current = Arc::clone(meta);
    let mut chain: Vec<FieldDef> = Vec::new();
    for part in path.split(LOOKUP_SEP) {
        let field = current.get_field(part).cloned().ok_or_else(|| {
            AdminError::ImproperlyConfigured(format!(
                "list_filter '{path}' refers to a missing field of {}",
                current.object_name
            ))
        })?;
        if let Some(target) = related_meta(view, &field) {
            current = target;
        }
        chain.push(field);
    }
    let Some(field) = chain.last().cloned() else {
        return Err(AdminError::ImproperlyConfigured("empty list_filter entry".into()));
    };

    let mut title = field.label();
    if chain.len() > 1 {
        let parent = &chain[chain.len() - 2];
        title = format!("{} <i class=\"fa fa-caret-right\"></i> {title}", parent.label());
    }

    let field_prefix = format!("{FILTER_PREFIX}{path}__");
    let param = |op: &str| format!("{field_prefix}{op}");

    let spec = match field.field_type {
        FieldType::Boolean => {
            let options = vec![("1".to_string(), "Yes".to_string()), ("0".to_string(), "No".to_string())];
            choice_spec(view, path, title, FilterKind::Boolean, &param("exact"), options)?
        }
        _ if !field.choices.is_empty() => {
            choice_spec(view, path, title, FilterKind::Choices, &param("exact"), field.choices.clone())?
        }
        _ if field.is_relation() => {
            let options = match related_meta(view, &field) {
                Some(target) => {
                    let qs = QuerySet::new(target.label()).order_by(target.ordering.clone());
                    view.store()
                        .fetch(&target, &qs)?
                        .iter()
                        .filter_map(|r| Some((r.pk_string(&target)?, r.display(&target))))
                        .collect()
                }
                None => Vec::new(),
            };
            let lookup = format!("{path}__id__exact");
            let related_param = format!("{FILTER_PREFIX}{lookup}");
            choice_spec(view, path, title, FilterKind::Related, &related_param, options)?
        }
        FieldType::Date | FieldType::DateTime => date_spec(view, path, title, &field_prefix)?,
        FieldType::Auto | FieldType::Integer | FieldType::Float => {
            input_spec(view, path, title, FilterKind::Number, vec![param("gte"), param("lte")])
        }
        _ => input_spec(view, path, title, FilterKind::Text, vec![param("icontains")]),
    };
    Ok(spec)
}

fn current_values(view: &AdminView, params: &[String]) -> Vec<Option<String>> {
    params
        .iter()
        .map(|p| {
            view.request
                .get()
                .get(p)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        })
        .collect()
}

fn choice_spec(
    view: &AdminView,
    path: &str,
    title: String,
    kind: FilterKind,
    param: &str,
    options: Vec<(String, String)>,
) -> AdminResult<FilterSpec> {
    let field_prefix = format!("{FILTER_PREFIX}{path}__");
    let values = current_values(view, &[param.to_string()]);
    let current = values[0].clone();

    let mut choices = Vec::with_capacity(options.len() + 1);
    choices.push(FilterChoice {
        display: "All".to_string(),
        selected: current.is_none(),
        query_string: view.get_query_string(&[], &[field_prefix.as_str()])?,
    });
    for (value, display) in options {
        choices.push(FilterChoice {
            selected: current.as_deref() == Some(value.as_str()),
            query_string: view.get_query_string(&[(param, Some(value.as_str()))], &[field_prefix.as_str()])?,
            display,
        });
    }
    Ok(FilterSpec {
        field_path: path.to_string(),
        title,
        kind,
        lookup_params: vec![param.to_string()],
        is_used: current.is_some(),
        values,
        choices,
    })
}

fn date_spec(view: &AdminView, path: &str, title: String, field_prefix: &str) -> AdminResult<FilterSpec> {
    let since = format!("{field_prefix}gte");
    let until = format!("{field_prefix}lt");
    let params = vec![since.clone(), until.clone()];
    let values = current_values(view, &params);

    let today = Local::now().date_naive();
    let tomorrow = today + Duration::days(1);
    let month_start = today.with_day(1).unwrap_or(today);
    let year_start = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);
    let ranges = [
        ("Today", today),
        ("Past 7 days", today - Duration::days(7)),
        ("This month", month_start),
        ("This year", year_start),
    ];

    let mut choices = vec![FilterChoice {
        display: "Any date".to_string(),
        selected: values.iter().all(Option::is_none),
        query_string: view.get_query_string(&[], &[field_prefix])?,
    }];
    let until_value = tomorrow.format("%Y-%m-%d").to_string();
    for (display, start) in ranges {
        let since_value = start.format("%Y-%m-%d").to_string();
        choices.push(FilterChoice {
            display: display.to_string(),
            selected: values[0].as_deref() == Some(since_value.as_str())
                && values[1].as_deref() == Some(until_value.as_str()),
            query_string: view.get_query_string(
                &[(since.as_str(), Some(since_value.as_str())), (until.as_str(), Some(until_value.as_str()))],
                &[field_prefix],
            )?,
        });
    }
    Ok(FilterSpec {
        field_path: path.to_string(),
        title,
        kind: FilterKind::Date,
        is_used: values.iter().any(Option::is_some),
        lookup_params: params,
        values,
        choices,
    })
}

fn input_spec(view: &AdminView, path: &str, title: String, kind: FilterKind, params: Vec<String>) -> FilterSpec {
    let values = current_values(view, &params);
    FilterSpec {
        field_path: path.to_string(),
        title,
        kind,
        is_used: values.iter().any(Option::is_some),
        lookup_params: params,
        values,
        choices: Vec::new(),
    }
}

// ── Context, media and blocks ────────────────────────────────────────

fn get_context(_: &FilterPlugin, view: &mut AdminView, mut context: Context, _: &()) -> AdminResult<Context> {
    if let Some(state) = view.state::<FilterState>() {
        context.insert("has_filters", state.has_filters);
        context.insert("has_query_param", state.has_query_param);
        context.insert("clean_query_url", state.clean_query_url.clone());
        context.insert("search_query", state.search_query.clone());
        context.insert("used_filter_num", state.used_filter_num);
        context.insert("filter_specs", serde_json::to_value(&state.filter_specs)?);
    }
    context.insert("search_var", SEARCH_VAR);
    Ok(context)
}

fn get_media(_: &FilterPlugin, view: &mut AdminView, media: Media, _: &()) -> AdminResult<Media> {
    Ok(media + view.vendor(&["xadmin.plugin.filters.js"])?)
}

fn block_nav_menu(
    _: &FilterPlugin,
    view: &mut AdminView,
    context: &Context,
    nodes: &mut Vec<String>,
) -> AdminResult<Option<String>> {
    let Some(state) = view.state::<FilterState>().cloned() else {
        return Ok(None);
    };
    if !state.has_filters {
        return Ok(None);
    }
    let mut context = context.clone();
    context.insert("filter_specs", serde_json::to_value(&state.filter_specs)?);
    context.insert("clean_query_url", state.clean_query_url.clone());
    context.insert("has_query_param", state.has_query_param);
    let html = render_fragment(view, "xadmin/blocks/model_list.nav_menu.filters.html", &context, || {
        filters_menu_html(&state)
    })?;
    nodes.push(html);
    Ok(None)
}

fn filters_menu_html(state: &FilterState) -> String {
    let mut html = String::from(
        "<li class=\"dropdown\"><a class=\"dropdown-toggle\" data-toggle=\"dropdown\" href=\"#\">\
         <i class=\"fa fa-filter\"></i> Filters",
    );
    if state.used_filter_num > 0 {
        html.push_str(&format!(" <span class=\"badge badge-success\">{}</span>", state.used_filter_num));
    }
    html.push_str("</a><ul class=\"dropdown-menu\">");
    if state.has_query_param {
        html.push_str(&format!(
            "<li><a href=\"{}\"><i class=\"fa fa-trash\"></i> Clean Filters</a></li>",
            escape_html(&state.clean_query_url)
        ));
    }
    for spec in &state.filter_specs {
        html.push_str(&format!("<li class=\"dropdown-header\">{}</li>", escape_html(&spec.title)));
        for choice in &spec.choices {
            let class = if choice.selected { " class=\"active\"" } else { "" };
            html.push_str(&format!(
                "<li{class}><a href=\"{}\">{}</a></li>",
                escape_html(&choice.query_string),
                escape_html(&choice.display)
            ));
        }
    }
    html.push_str("</ul></li>");
    html
}

fn block_nav_form(
    plugin: &FilterPlugin,
    view: &mut AdminView,
    context: &Context,
    nodes: &mut Vec<String>,
) -> AdminResult<Option<String>> {
    if plugin.search_fields.is_empty() {
        return Ok(None);
    }
    let remove_search_url = view.get_query_string(&[], &[SEARCH_VAR])?;
    let search_form_params = view.get_form_params(&[], &[SEARCH_VAR])?;
    let search_query = view.request.get().get(SEARCH_VAR).unwrap_or_default().to_string();

    let mut context = context.clone();
    context.insert("search_var", SEARCH_VAR);
    context.insert("remove_search_url", remove_search_url.clone());
    context.insert("search_form_params", search_form_params.clone());
    context.insert("search_query", search_query.clone());
    let html = render_fragment(view, "xadmin/blocks/model_list.nav_form.search_form.html", &context, || {
        format!(
            "<form class=\"navbar-form navbar-left\" method=\"get\">{search_form_params}\
             <input type=\"text\" class=\"form-control\" name=\"{SEARCH_VAR}\" value=\"{}\" placeholder=\"Search\"/>\
             <a href=\"{}\" class=\"remove-search\"><i class=\"fa fa-times\"></i></a></form>",
            escape_html(&search_query),
            escape_html(&remove_search_url)
        )
    })?;
    nodes.push(html);
    Ok(None)
}
