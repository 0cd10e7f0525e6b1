//! Admin registrations for the blog, plus a plugin summarizing the listed
//! rows by one field.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{json, Value};
use xadmin_rs_admin::hooks::Handler;
use xadmin_rs_admin::views::base::GET_CONTEXT;
use xadmin_rs_admin::views::LIST_VIEW;
use xadmin_rs_admin::{AdminOptions, AdminPlugin, AdminView, PluginClass, Registry, RegistryBuilder};
use xadmin_rs_core::AdminResult;
use xadmin_rs_db::record::value_to_string;
use xadmin_rs_template::Context;

use crate::models;

/// Counts the listed rows per value of `summary_field`. Inactive unless
/// the model's options name a field.
#[derive(Debug, Clone, Deserialize)]
pub struct SummaryPlugin {
    pub summary_field: Option<String>,
}

impl AdminPlugin for SummaryPlugin {
    fn init_request(&mut self, _view: &mut AdminView) -> AdminResult<bool> {
        Ok(self.summary_field.is_some())
    }
}

pub fn summary_plugin() -> AdminResult<PluginClass> {
    PluginClass::builder("summary", |settings| settings.deserialize::<SummaryPlugin>())
        .order(50)
        .setting("summary_field", Value::Null)
        .hook(&GET_CONTEXT, Handler::Filter(summary_context))
        .build()
}

fn summary_context(plugin: &SummaryPlugin, view: &mut AdminView, mut context: Context, _: &()) -> AdminResult<Context> {
    let Some(field) = plugin.summary_field.as_deref() else {
        return Ok(context);
    };
    let meta = view.opts()?;
    let queryset = view.get_list_queryset()?;
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for record in view.store().fetch(&meta, &queryset)? {
        let key = record.get(field).map(value_to_string).unwrap_or_default();
        *counts.entry(key).or_default() += 1;
    }
    context.insert("summary", json!(counts));
    Ok(context)
}

/// The blog's registry.
pub fn registry() -> AdminResult<Registry> {
    let mut builder = RegistryBuilder::with_defaults()?;
    builder.register_site_models()?;
    builder.register_plugin(summary_plugin()?, &LIST_VIEW)?;

    builder.register(
        models::author(),
        AdminOptions::new("AuthorAdmin")
            .attr("list_display", json!(["name", "email"]))
            .attr("search_fields", json!(["name"]))
            .attr("model_icon", "fa fa-user"),
    )?;
    builder.register(
        models::post(),
        AdminOptions::new("PostAdmin")
            .attr("list_display", json!(["title", "status", "author"]))
            .attr("list_filter", json!(["status"]))
            .attr("search_fields", json!(["title", "body"]))
            .attr("list_per_page", 20)
            .attr("summary_field", "status"),
    )?;
    builder.register(
        models::comment(),
        AdminOptions::new("CommentAdmin").attr("list_display", json!(["post", "text"])),
    )?;
    builder.register_settings(
        "CommAdminView",
        AdminOptions::new("BlogSite")
            .attr("site_title", "Blog Admin")
            .attr("site_footer", "xadmin-rs blog demo"),
    )?;
    Ok(builder.build())
}
