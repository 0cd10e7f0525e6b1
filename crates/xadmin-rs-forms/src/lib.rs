//! # xadmin-rs-forms
//!
//! Forms generated from [`ModelMeta`](xadmin_rs_db::ModelMeta). The edit
//! views build a [`ModelForm`] through the `get_model_form` extension point,
//! bind it to POST data, validate it, and merge the cleaned values into a
//! [`Record`](xadmin_rs_db::Record).
//!
//! ## Modules
//!
//! - [`fields`] - [`FormField`], [`Widget`], and per-type cleaning
//! - [`model_form`] - [`ModelFormConfig`] and the bound/unbound [`ModelForm`]

pub mod fields;
pub mod model_form;

pub use fields::{clean_field_value, FieldButton, FormField, Widget};
pub use model_form::{ModelForm, ModelFormConfig};
