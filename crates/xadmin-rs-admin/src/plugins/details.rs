//! Detail buttons next to related objects in the change list.
//!
//! A relation cell gets an info button opening the related object's detail
//! page when the user may view that model. Fields listed in
//! `show_detail_fields` get a button for the row's own object.

use serde::Deserialize;
use serde_json::json;
use xadmin_rs_auth::Action;
use xadmin_rs_core::text::escape_html;
use xadmin_rs_core::{AdminError, AdminResult};
use xadmin_rs_template::Media;

use crate::hooks::Handler;
use crate::plugin::{AdminPlugin, PluginClass};
use crate::plugins::{related_meta, related_pk};
use crate::view::AdminView;
use crate::views::base::GET_MEDIA;
use crate::views::list::{ItemArgs, ResultItem, RESULT_ITEM};

/// The details plugin. Its fields are its settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DetailsPlugin {
    pub show_detail_fields: Vec<String>,
    pub show_all_rel_details: bool,
}

impl AdminPlugin for DetailsPlugin {}

pub(crate) fn plugin_class() -> AdminResult<PluginClass> {
    PluginClass::builder("details", |settings| settings.deserialize::<DetailsPlugin>())
        .setting("show_detail_fields", json!([]))
        .setting("show_all_rel_details", true)
        .hook(&RESULT_ITEM, Handler::Filter(result_item))
        .hook(&GET_MEDIA, Handler::Filter(get_media))
        .build()
}

fn result_item(plugin: &DetailsPlugin, view: &mut AdminView, mut item: ResultItem, args: &ItemArgs) -> AdminResult<ResultItem> {
    let listed = plugin.show_detail_fields.contains(&args.field_name);
    if !plugin.show_all_rel_details && !listed {
        return Ok(item);
    }
    let meta = view.opts()?;

    let field = meta.get_field(&args.field_name).cloned();
    let target = match field.as_ref().filter(|f| f.is_relation()) {
        Some(field) => related_meta(view, field).and_then(|rel_meta| {
            let pk = args.record.get(&field.name).and_then(|v| related_pk(v, &rel_meta))?;
            Some((rel_meta, pk))
        }),
        None if listed => args.record.pk_string(&meta).map(|pk| (meta.clone(), pk)),
        None => None,
    };
    let Some((rel_meta, pk)) = target else {
        return Ok(item);
    };
    if !view.has_model_perm(&rel_meta, &Action::View) {
        return Ok(item);
    }

    let detail_url = match view.get_model_url(&rel_meta, "detail", &[pk.as_str()]) {
        Ok(url) => url,
        Err(AdminError::NoReverseMatch(_)) => return Ok(item),
        Err(e) => return Err(e),
    };
    let edit_url = if view.has_model_perm(&rel_meta, &Action::Change) {
        view.get_model_url(&rel_meta, "change", &[pk.as_str()]).unwrap_or_default()
    } else {
        String::new()
    };
    let display = view
        .store()
        .get(&rel_meta, &pk)?
        .map_or_else(|| pk.clone(), |obj| obj.display(&rel_meta));

    item.btns.push(format!(
        r##"<a data-res-uri="{}" href="#" data-edit-uri="{}" class="details-handler" rel="tooltip" title="Details of {}"><i class="fa fa-info-circle"></i></a>"##,
        escape_html(&detail_url),
        escape_html(&edit_url),
        escape_html(&display)
    ));
    Ok(item)
}

fn get_media(plugin: &DetailsPlugin, view: &mut AdminView, media: Media, _: &()) -> AdminResult<Media> {
    if plugin.show_all_rel_details || !plugin.show_detail_fields.is_empty() {
        Ok(media + view.vendor(&["xadmin.plugin.details.js", "xadmin.form.css"])?)
    } else {
        Ok(media)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use xadmin_rs_db::ModelMeta;

    #[test]
    fn test_related_pk_shapes() {
        let meta = ModelMeta::new("blog", "Author");
        assert_eq!(related_pk(&json!(3), &meta), Some("3".to_string()));
        assert_eq!(related_pk(&json!({"id": 7, "name": "Ann"}), &meta), Some("7".to_string()));
        assert_eq!(related_pk(&Value::Null, &meta), None);
        assert_eq!(related_pk(&json!([1, 2]), &meta), None);
    }
}
