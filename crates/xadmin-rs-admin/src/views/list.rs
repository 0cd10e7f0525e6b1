//! `ListAdminView`: the change list of a model.
//!
//! Request flow:
//!
//! 1. `init_request` checks the view permission, resolves the displayed
//!    columns and stores the query string in the session for the edit
//!    views to return to.
//! 2. `get` builds the result list: `get_list_queryset`, ordering from the
//!    `o` parameter, pagination from `p` and `all`.
//! 3. Rows and cells are produced through `result_row` and `result_item`,
//!    which plugins extend to add columns or decorate cells.
//! 4. `get_response` renders the context.
//!
//! An [`AdminError::IncorrectLookupParameters`] raised while building the
//! queryset redirects to `?e=1`, and a request already carrying `e` shows
//! the invalid-setup page instead.

use serde::Serialize;
use serde_json::{json, Value};
use xadmin_rs_core::text::{capfirst, escape_html, title};
use xadmin_rs_core::{AdminError, AdminResult};
use xadmin_rs_db::record::value_to_string;
use xadmin_rs_db::{QuerySet, Record};
use xadmin_rs_http::AdminResponse;
use xadmin_rs_template::{Context, Media};

use crate::hooks::Hook;
use crate::view::AdminView;
use crate::view_type::{ViewHandler, ViewType};
use crate::views::model::MODEL_ADMIN_VIEW;

pub const ORDER_VAR: &str = "o";
pub const PAGE_VAR: &str = "p";
pub const ALL_VAR: &str = "all";
pub const ERROR_FLAG: &str = "e";
/// Session key remembering the last list query of a model.
pub const LIST_QUERY_SESSION_KEY: &str = "LIST_QUERY";
/// Text of an empty cell.
pub const EMPTY_CHANGELIST_VALUE: &str = "-";

/// The queryset the list shows, before ordering and pagination.
pub static GET_LIST_QUERYSET: Hook<QuerySet> = Hook::new("get_list_queryset");
/// Displayed columns.
pub static GET_LIST_DISPLAY: Hook<Vec<String>> = Hook::new("get_list_display");
/// Columns linking to the object.
pub static GET_LIST_DISPLAY_LINKS: Hook<Vec<String>> = Hook::new("get_list_display_links");
/// The effective ordering.
pub static GET_LIST_ORDERING: Hook<Vec<String>> = Hook::new("get_list_ordering");
/// One column header.
pub static RESULT_HEADER: Hook<ResultHeader, String> = Hook::new("result_header");
/// One row.
pub static RESULT_ROW: Hook<ResultRow, Record> = Hook::new("result_row");
/// One cell.
pub static RESULT_ITEM: Hook<ResultItem, ItemArgs> = Hook::new("result_item");
/// The link of a display-link cell.
pub static URL_FOR_RESULT: Hook<Option<String>, Record> = Hook::new("url_for_result");

/// Per-request list state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ListState {
    pub list_display: Vec<String>,
    pub list_display_links: Vec<String>,
    pub ordering: Vec<String>,
    pub page_num: usize,
    pub num_pages: usize,
    pub per_page: usize,
    pub show_all: bool,
    pub can_show_all: bool,
    pub multi_page: bool,
    pub result_count: usize,
    pub full_result_count: usize,
    #[serde(skip)]
    pub results: Vec<Record>,
}

/// A column header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultHeader {
    pub field_name: String,
    pub text: String,
    pub sortable: bool,
    /// `Some(true)` ascending, `Some(false)` descending.
    pub sorted: Option<bool>,
    /// The query string toggling this column's ordering.
    pub url: Option<String>,
    pub classes: Vec<String>,
}

/// Arguments of [`RESULT_ITEM`].
#[derive(Debug, Clone)]
pub struct ItemArgs {
    pub record: Record,
    pub field_name: String,
}

/// A rendered cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultItem {
    pub field_name: String,
    pub text: String,
    /// Whether `text` is markup that must not be escaped.
    pub allow_tags: bool,
    pub url: Option<String>,
    pub is_display_link: bool,
    /// Relation target label, for related-field cells.
    pub related_model: Option<String>,
    /// Format strings with a single `%s`, applied innermost first.
    pub wraps: Vec<String>,
    /// Extra markup appended after the text.
    pub btns: Vec<String>,
    pub classes: Vec<String>,
}

impl ResultItem {
    /// An empty cell for `field_name`.
    pub fn new(field_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            text: String::new(),
            allow_tags: false,
            url: None,
            is_display_link: false,
            related_model: None,
            wraps: Vec::new(),
            btns: Vec::new(),
            classes: Vec::new(),
        }
    }

    /// The cell's inner markup.
    pub fn label(&self) -> String {
        let mut text = if self.allow_tags {
            self.text.clone()
        } else {
            escape_html(&self.text)
        };
        for wrap in &self.wraps {
            text = wrap.replacen("%s", &text, 1);
        }
        if let Some(url) = &self.url {
            text = format!(r#"<a href="{}">{text}</a>"#, escape_html(url));
        }
        text + &self.btns.concat()
    }
}

/// A rendered row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultRow {
    pub pk: Option<String>,
    pub object: Record,
    pub cells: Vec<ResultItem>,
}

pub(crate) struct ListHandler;

impl ViewHandler for ListHandler {
    fn block_names(&self) -> &'static [&'static str] {
        &["nav_menu", "nav_form", "results_top", "results_bottom"]
    }

    fn init_request(&self, _vt: &'static ViewType, view: &mut AdminView) -> AdminResult<()> {
        MODEL_ADMIN_VIEW.init_request(view)?;
        if !view.has_view_permission() {
            return Err(AdminError::PermissionDenied(format!(
                "{} may not view {}",
                view.user.username,
                view.opts()?.verbose_name_plural
            )));
        }
        let list_display = view.get_list_display()?;
        let list_display_links = view.get_list_display_links()?;
        let meta = view.opts()?;
        view.request.session().set(
            LIST_QUERY_SESSION_KEY,
            json!([[meta.app_label, meta.model_name], view.request.query_string()]),
        );
        view.insert_state(ListState {
            list_display,
            list_display_links,
            ..ListState::default()
        });
        Ok(())
    }

    fn get(&self, _vt: &'static ViewType, view: &mut AdminView) -> AdminResult<AdminResponse> {
        match view.make_result_list() {
            Ok(()) => {}
            Err(AdminError::IncorrectLookupParameters(message)) => {
                tracing::debug!(error = %message, "incorrect lookup parameters");
                if view.request.get().contains_key(ERROR_FLAG) {
                    let context = Context::new().with("title", "Database error");
                    return Ok(AdminResponse::template(
                        vec!["xadmin/views/invalid_setup.html".to_string()],
                        context,
                    ));
                }
                return Ok(AdminResponse::redirect(format!(
                    "{}?{ERROR_FLAG}=1",
                    view.request.path()
                )));
            }
            Err(e) => return Err(e),
        }
        let context = view.get_context()?;
        view.get_response(context)
    }

    fn get_context(&self, _vt: &'static ViewType, view: &mut AdminView) -> AdminResult<Context> {
        let mut context = MODEL_ADMIN_VIEW.get_context(view)?;
        let meta = view.opts()?;
        let state = view.state::<ListState>().cloned().unwrap_or_default();

        let mut headers = Vec::with_capacity(state.list_display.len());
        for field in &state.list_display {
            headers.push(view.result_header(field)?);
        }
        let mut rows = Vec::with_capacity(state.results.len());
        for record in &state.results {
            rows.push(view.result_row(record)?);
        }

        let title_text = view
            .options
            .title
            .clone()
            .unwrap_or_else(|| format!("{} List", capfirst(&meta.verbose_name)));
        let has_add_permission = view.has_add_permission();
        let add_url = if has_add_permission {
            view.model_admin_url("add", &[]).ok()
        } else {
            None
        };

        context.insert("title", title_text);
        context.insert("result_headers", serde_json::to_value(&headers)?);
        context.insert("results", serde_json::to_value(&rows)?);
        context.insert("cl", serde_json::to_value(&state)?);
        context.insert("result_count", state.result_count);
        context.insert("has_add_permission", has_add_permission);
        context.insert("add_url", add_url);
        context.insert("model_perms", view.get_model_perms());
        Ok(context)
    }

    fn get_media(&self, _vt: &'static ViewType, view: &mut AdminView) -> AdminResult<Media> {
        let media = MODEL_ADMIN_VIEW.get_media(view)?;
        Ok(media + view.vendor(&["xadmin.page.list.js"])?)
    }

    fn template_names(&self, _vt: &'static ViewType, view: &AdminView) -> Vec<String> {
        view.options
            .object_list_template
            .clone()
            .map_or_else(|| view.get_template_list("views/model_list.html"), |t| vec![t])
    }
}

/// The change list.
pub static LIST_VIEW: ViewType = ViewType::new("ListAdminView", Some(&MODEL_ADMIN_VIEW), &ListHandler);

// ── Base implementations ─────────────────────────────────────────────

fn ordering_from_params(view: &AdminView) -> AdminResult<Vec<String>> {
    let meta = view.opts()?;
    let Some(raw) = view.request.get().get(ORDER_VAR) else {
        return Ok(Vec::new());
    };
    Ok(raw
        .split('.')
        .filter(|part| !part.is_empty())
        .filter(|part| meta.get_field(part.trim_start_matches('-')).is_some())
        .map(str::to_string)
        .collect())
}

fn base_result_header(view: &mut AdminView, field_name: &str) -> AdminResult<ResultHeader> {
    let meta = view.opts()?;
    let ordering = view
        .state::<ListState>()
        .map(|s| s.ordering.clone())
        .unwrap_or_default();
    let mut header = ResultHeader {
        field_name: field_name.to_string(),
        text: String::new(),
        sortable: false,
        sorted: None,
        url: None,
        classes: Vec::new(),
    };
    if field_name == "__str__" {
        header.text = capfirst(&meta.verbose_name);
        return Ok(header);
    }
    let Some(field) = meta.get_field(field_name) else {
        header.text = title(&field_name.replace('_', " "));
        return Ok(header);
    };
    header.text = field.label();
    header.sortable = true;
    header.classes.push("sortable".to_string());

    let sorted = ordering.iter().find_map(|o| match o.strip_prefix('-') {
        Some(name) if name == field_name => Some(false),
        None if o == field_name => Some(true),
        _ => None,
    });
    header.sorted = sorted;
    let toggled = match sorted {
        Some(true) => format!("-{field_name}"),
        _ => field_name.to_string(),
    };
    match sorted {
        Some(true) => header.classes.push("sorted ascending".to_string()),
        Some(false) => header.classes.push("sorted descending".to_string()),
        None => {}
    }
    header.url = Some(view.get_query_string(&[(ORDER_VAR, Some(toggled.as_str()))], &[PAGE_VAR])?);
    Ok(header)
}

fn base_result_item(view: &mut AdminView, args: &ItemArgs) -> AdminResult<ResultItem> {
    let meta = view.opts()?;
    let state = view.state::<ListState>().cloned().unwrap_or_default();
    let mut item = ResultItem::new(&args.field_name);

    if args.field_name == "__str__" {
        item.text = args.record.display(&meta);
    } else if let Some(field) = meta.get_field(&args.field_name) {
        item.related_model = field.related_model.clone();
        item.text = match args.record.get(&field.name) {
            None | Some(Value::Null) => EMPTY_CHANGELIST_VALUE.to_string(),
            Some(value) => {
                let raw = value_to_string(value);
                field.choice_label(&raw).map_or(raw, str::to_string)
            }
        };
    }

    let is_link = if state.list_display_links.is_empty() {
        state.list_display.first() == Some(&args.field_name)
    } else {
        state.list_display_links.contains(&args.field_name)
    };
    if is_link {
        item.is_display_link = true;
        item.url = view.url_for_result(&args.record)?;
    }
    Ok(item)
}

impl AdminView {
    /// Columns to display.
    pub fn get_list_display(&mut self) -> AdminResult<Vec<String>> {
        self.call_hook(&GET_LIST_DISPLAY, &(), |view, _| Ok(view.options.list_display.clone()))
    }

    /// Columns linking to the object.
    pub fn get_list_display_links(&mut self) -> AdminResult<Vec<String>> {
        self.call_hook(&GET_LIST_DISPLAY_LINKS, &(), |view, _| {
            Ok(view.options.list_display_links.clone())
        })
    }

    /// The queryset the list shows.
    pub fn get_list_queryset(&mut self) -> AdminResult<QuerySet> {
        self.call_hook(&GET_LIST_QUERYSET, &(), |view, _| view.queryset())
    }

    /// Ordering from the `o` parameter, else the configured ordering.
    pub fn get_list_ordering(&mut self) -> AdminResult<Vec<String>> {
        self.call_hook(&GET_LIST_ORDERING, &(), |view, _| {
            let requested = ordering_from_params(view)?;
            Ok(if requested.is_empty() {
                view.get_ordering()
            } else {
                requested
            })
        })
    }

    /// One column header.
    pub fn result_header(&mut self, field_name: &str) -> AdminResult<ResultHeader> {
        self.call_hook(&RESULT_HEADER, &field_name.to_string(), |view, field_name| {
            base_result_header(view, field_name)
        })
    }

    /// One row with a cell per displayed column.
    pub fn result_row(&mut self, record: &Record) -> AdminResult<ResultRow> {
        self.call_hook(&RESULT_ROW, record, |view, record| {
            let meta = view.opts()?;
            let columns = view
                .state::<ListState>()
                .map(|s| s.list_display.clone())
                .unwrap_or_default();
            let mut cells = Vec::with_capacity(columns.len());
            for field_name in columns {
                cells.push(view.result_item(record, &field_name)?);
            }
            Ok(ResultRow {
                pk: record.pk_string(&meta),
                object: record.clone(),
                cells,
            })
        })
    }

    /// One cell.
    pub fn result_item(&mut self, record: &Record, field_name: &str) -> AdminResult<ResultItem> {
        let args = ItemArgs {
            record: record.clone(),
            field_name: field_name.to_string(),
        };
        self.call_hook(&RESULT_ITEM, &args, base_result_item)
    }

    /// The link of a display-link cell.
    pub fn url_for_result(&mut self, record: &Record) -> AdminResult<Option<String>> {
        self.call_hook(&URL_FOR_RESULT, record, |view, record| view.get_object_url(record))
    }

    /// Runs the queryset, counts and paginates it, and stores the page in
    /// [`ListState`].
    pub fn make_result_list(&mut self) -> AdminResult<()> {
        let meta = self.opts()?;
        let queryset = self.get_list_queryset()?;
        let ordering = self.get_list_ordering()?;
        let queryset = if ordering.is_empty() {
            queryset
        } else {
            queryset.order_by(ordering.clone())
        };

        let store = self.store();
        let result_count = store.count(&meta, &queryset.clone().unsliced())?;
        let full_result_count = store.count(&meta, &self.queryset()?)?;

        let per_page = self.options.list_per_page.max(1);
        let can_show_all = result_count <= self.options.list_max_show_all;
        let show_all = can_show_all && self.request.get().contains_key(ALL_VAR);
        let num_pages = result_count.div_ceil(per_page).max(1);
        let page_num = match self.request.get().get(PAGE_VAR) {
            None => 0,
            Some(raw) => raw.parse::<usize>().map_err(|_| {
                AdminError::IncorrectLookupParameters(format!("Invalid page number '{raw}'"))
            })?,
        };
        if page_num >= num_pages && page_num > 0 {
            return Err(AdminError::IncorrectLookupParameters(format!(
                "Page {page_num} out of range"
            )));
        }

        let page = if show_all {
            queryset
        } else {
            queryset.slice(page_num * per_page, Some(per_page))
        };
        let results = store.fetch(&meta, &page)?;
        tracing::debug!(
            model = %meta.label(),
            result_count,
            page = page_num,
            "built result list"
        );

        let mut state = self.state::<ListState>().cloned().unwrap_or_default();
        state.ordering = ordering;
        state.page_num = page_num;
        state.num_pages = num_pages;
        state.per_page = per_page;
        state.show_all = show_all;
        state.can_show_all = can_show_all;
        state.multi_page = result_count > per_page;
        state.result_count = result_count;
        state.full_result_count = full_result_count;
        state.results = results;
        self.insert_state(state);
        Ok(())
    }
}
