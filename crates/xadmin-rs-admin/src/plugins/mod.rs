//! Built-in plugins.
//!
//! | plugin | id | view types |
//! |---|---|---|
//! | [`filters`] | `filter` | list |
//! | [`details`] | `details` | list |
//! | [`relate`] | `relate_menu`, `list_relate_display` | list |
//! | [`relate`] | `edit_relate_display` | create, update |
//! | [`relate`] | `delete_relate_display` | delete |
//! | [`quickform`] | `quickform`, `quickformset`, `quick_addbtn` | model form |
//!
//! Plugins are registered in this order, which decides the nesting of
//! plugins sharing an order value.

pub mod details;
pub mod filters;
pub mod quickform;
pub mod relate;

use std::sync::Arc;

use serde_json::Value;
use xadmin_rs_core::AdminResult;
use xadmin_rs_db::record::value_to_string;
use xadmin_rs_db::{FieldDef, ModelMeta};
use xadmin_rs_template::Context;

use crate::registry::RegistryBuilder;
use crate::view::AdminView;
use crate::views::{CREATE_VIEW, DELETE_VIEW, LIST_VIEW, MODEL_FORM_VIEW, UPDATE_VIEW};

pub use details::DetailsPlugin;
pub use filters::{FilterPlugin, FilterSpec, FilterState};
pub use quickform::{QuickAddBtnPlugin, QuickFormFormSetPlugin, QuickFormPlugin};
pub use relate::{
    DeleteRelateDisplayPlugin, EditRelateDisplayPlugin, ListRelateDisplayPlugin, RelateMenuPlugin,
    RelateObject,
};

impl RegistryBuilder {
    /// Attaches the built-in plugins to the built-in views.
    pub fn register_builtin_plugins(&mut self) -> AdminResult<()> {
        self.register_plugin(filters::plugin_class()?, &LIST_VIEW)?;
        self.register_plugin(details::plugin_class()?, &LIST_VIEW)?;
        self.register_plugin(relate::relate_menu_class()?, &LIST_VIEW)?;
        self.register_plugin(relate::list_relate_class()?, &LIST_VIEW)?;

        let edit_relate = Arc::new(relate::edit_relate_class()?);
        self.register_plugin(Arc::clone(&edit_relate), &CREATE_VIEW)?;
        self.register_plugin(edit_relate, &UPDATE_VIEW)?;
        self.register_plugin(relate::delete_relate_class()?, &DELETE_VIEW)?;

        self.register_plugin(quickform::plugin_class()?, &MODEL_FORM_VIEW)?;
        self.register_plugin(quickform::formset_class()?, &MODEL_FORM_VIEW)?;
        self.register_plugin(quickform::add_btn_class()?, &MODEL_FORM_VIEW)?;
        Ok(())
    }
}

/// Renders `template` when the site's renderer has it, else `fallback`.
pub(crate) fn render_fragment(
    view: &AdminView,
    template: &str,
    context: &Context,
    fallback: impl FnOnce() -> String,
) -> AdminResult<String> {
    let renderer = view.site().renderer();
    if renderer.has_template(template) {
        renderer.render_template(template, context)
    } else {
        Ok(fallback())
    }
}

/// The registered model a relation field points at.
pub(crate) fn related_meta(view: &AdminView, field: &FieldDef) -> Option<Arc<ModelMeta>> {
    let label = field.related_model.as_deref()?;
    view.site()
        .registry()
        .get_registry(label)
        .ok()
        .map(|admin| Arc::clone(admin.meta()))
}

/// The primary key of a related value: a scalar key or an embedded object.
pub(crate) fn related_pk(value: &Value, meta: &ModelMeta) -> Option<String> {
    match value {
        Value::Null | Value::Array(_) => None,
        Value::Object(map) => map.get(&meta.pk_name).map(value_to_string),
        other => Some(value_to_string(other)),
    }
}
