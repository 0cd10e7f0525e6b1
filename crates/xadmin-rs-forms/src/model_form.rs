//! Forms generated from model metadata.
//!
//! [`ModelFormConfig`] chooses which model fields a form edits.
//! [`ModelForm::for_model`] derives one [`FormField`] per editable model
//! field. A form is unbound until [`bind`](ModelForm::bind) gives it POST
//! data; only a bound, valid form can be [`save`](ModelForm::save)d.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};
use xadmin_rs_core::{AdminError, AdminResult, ValidationError};
use xadmin_rs_db::record::value_to_string;
use xadmin_rs_db::{ModelMeta, Record};
use xadmin_rs_http::QueryDict;

use crate::fields::FormField;

/// Which model fields a form edits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelFormConfig {
    /// Explicit field list, in display order. `None` means every editable field.
    pub fields: Option<Vec<String>>,
    /// Fields left out.
    pub exclude: Vec<String>,
}

impl ModelFormConfig {
    /// Every editable field.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the form to these fields, in this order.
    #[must_use]
    pub fn fields<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Leaves these fields out.
    #[must_use]
    pub fn exclude<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.exclude.extend(fields.into_iter().map(Into::into));
        self
    }
}

/// A form editing one record of a model.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use xadmin_rs_db::{FieldDef, FieldType, ModelMeta, Record};
/// use xadmin_rs_forms::{ModelForm, ModelFormConfig};
/// use xadmin_rs_http::QueryDict;
///
/// let meta = ModelMeta::new("blog", "Article")
///     .field(FieldDef::new("title", FieldType::Char).max_length(100))
///     .field(FieldDef::new("views", FieldType::Integer).default_value(0));
///
/// let instance = Record::new().with("id", 1).with("title", "Old").with("views", 3);
/// let mut form = ModelForm::for_model(&meta, &ModelFormConfig::new())
///     .unwrap()
///     .with_instance(instance)
///     .bind(QueryDict::parse("title=New&views=3"));
///
/// assert!(form.is_valid());
/// assert_eq!(form.changed_data(), vec!["title"]);
/// let saved = form.save().unwrap();
/// assert_eq!(saved.get("title"), Some(&json!("New")));
/// assert_eq!(saved.get("id"), Some(&json!(1)));
/// ```
#[derive(Debug, Clone)]
pub struct ModelForm {
    model: String,
    fields: Vec<FormField>,
    prefix: Option<String>,
    initial: Map<String, Value>,
    instance: Option<Record>,
    data: Option<QueryDict>,
    cleaned_data: Map<String, Value>,
    errors: BTreeMap<String, Vec<String>>,
    non_field_errors: Vec<String>,
    validated: bool,
}

impl ModelForm {
    /// Builds an unbound form for `meta`.
    ///
    /// # Errors
    ///
    /// [`AdminError::ImproperlyConfigured`] when the config names fields the
    /// model does not have or that are not editable.
    pub fn for_model(meta: &ModelMeta, config: &ModelFormConfig) -> AdminResult<Self> {
        let editable: Vec<_> = meta.editable_fields().collect();
        let chosen: Vec<FormField> = match &config.fields {
            Some(names) => {
                let unknown: Vec<&str> = names
                    .iter()
                    .filter(|n| !editable.iter().any(|f| &f.name == *n))
                    .map(String::as_str)
                    .collect();
                if !unknown.is_empty() {
                    return Err(AdminError::ImproperlyConfigured(format!(
                        "Unknown field(s) ({}) specified for {}",
                        unknown.join(", "),
                        meta.object_name
                    )));
                }
                names
                    .iter()
                    .filter(|n| !config.exclude.contains(n))
                    .filter_map(|n| editable.iter().find(|f| &f.name == n))
                    .map(|f| FormField::from_model_field(f))
                    .collect()
            }
            None => editable
                .iter()
                .filter(|f| !config.exclude.contains(&f.name))
                .map(|f| FormField::from_model_field(f))
                .collect(),
        };
        Ok(Self {
            model: meta.label(),
            fields: chosen,
            prefix: None,
            initial: Map::new(),
            instance: None,
            data: None,
            cleaned_data: Map::new(),
            errors: BTreeMap::new(),
            non_field_errors: Vec::new(),
            validated: false,
        })
    }

    /// Edits an existing record; its values become the initial values.
    #[must_use]
    pub fn with_instance(mut self, instance: Record) -> Self {
        self.instance = Some(instance);
        self
    }

    /// Sets initial values, taking precedence over the instance.
    #[must_use]
    pub fn with_initial(mut self, initial: Map<String, Value>) -> Self {
        self.initial = initial;
        self
    }

    /// Namespaces input names as `<prefix>-<field>`.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Binds submitted data.
    #[must_use]
    pub fn bind(mut self, data: QueryDict) -> Self {
        self.data = Some(data);
        self.validated = false;
        self
    }

    /// Keeps only fields for which `keep` returns `true`.
    pub fn retain_fields(&mut self, keep: impl Fn(&FormField) -> bool) {
        self.fields.retain(|f| keep(f));
        self.validated = false;
    }

    /// Replaces a field definition with the same name, or appends it.
    pub fn set_field(&mut self, field: FormField) {
        if let Some(slot) = self.fields.iter_mut().find(|f| f.name == field.name) {
            *slot = field;
        } else {
            self.fields.push(field);
        }
        self.validated = false;
    }

    /// The `app.model` label of the edited model.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The form's fields, in display order.
    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    /// Looks up a field.
    pub fn field(&self, name: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Field names, in display order.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// The record being edited, if any.
    pub const fn instance(&self) -> Option<&Record> {
        self.instance.as_ref()
    }

    /// Returns `true` once data has been bound.
    pub const fn is_bound(&self) -> bool {
        self.data.is_some()
    }

    /// The input name of a field, including the prefix.
    pub fn add_prefix(&self, name: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}-{name}"),
            None => name.to_string(),
        }
    }

    /// The value a field starts with: explicit initial data, then the
    /// instance, then null.
    pub fn initial_for(&self, name: &str) -> Value {
        self.initial
            .get(name)
            .or_else(|| self.instance.as_ref().and_then(|r| r.get(name)))
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Validates bound data once. Unbound forms are never valid.
    pub fn is_valid(&mut self) -> bool {
        if !self.is_bound() {
            return false;
        }
        if !self.validated {
            self.full_clean();
        }
        self.errors.is_empty() && self.non_field_errors.is_empty()
    }

    fn full_clean(&mut self) {
        self.cleaned_data.clear();
        self.errors.clear();
        self.non_field_errors.clear();
        let Some(data) = &self.data else {
            return;
        };
        for field in &self.fields {
            let raw = data.get_list(&self.add_prefix(&field.name));
            match field.clean(raw) {
                Ok(value) => {
                    self.cleaned_data.insert(field.name.clone(), value);
                }
                Err(messages) => {
                    self.errors.insert(field.name.clone(), messages);
                }
            }
        }
        self.validated = true;
        tracing::trace!(
            model = %self.model,
            errors = self.errors.len(),
            "form cleaned"
        );
    }

    /// Records an error. `None` adds a form-wide error; a named field loses
    /// its cleaned value.
    pub fn add_error(&mut self, field: Option<&str>, message: impl Into<String>) {
        match field {
            Some(name) => {
                self.cleaned_data.remove(name);
                self.errors
                    .entry(name.to_string())
                    .or_default()
                    .push(message.into());
            }
            None => self.non_field_errors.push(message.into()),
        }
    }

    /// Per-field errors.
    pub const fn errors(&self) -> &BTreeMap<String, Vec<String>> {
        &self.errors
    }

    /// Form-wide errors.
    pub fn non_field_errors(&self) -> &[String] {
        &self.non_field_errors
    }

    /// Values that passed cleaning.
    pub const fn cleaned_data(&self) -> &Map<String, Value> {
        &self.cleaned_data
    }

    /// The errors as a [`ValidationError`].
    pub fn validation_error(&self) -> ValidationError {
        let mut field_errors = self.errors.clone();
        if !self.non_field_errors.is_empty() {
            field_errors.insert("__all__".to_string(), self.non_field_errors.clone());
        }
        ValidationError::with_field_errors(field_errors)
    }

    /// Names of fields whose submitted value differs from the initial value.
    pub fn changed_data(&self) -> Vec<String> {
        let Some(data) = &self.data else {
            return Vec::new();
        };
        self.fields
            .iter()
            .filter(|field| {
                let initial = self.initial_for(&field.name);
                let submitted = self.cleaned_data.get(&field.name).cloned().unwrap_or_else(|| {
                    Value::String(
                        data.get(&self.add_prefix(&field.name))
                            .unwrap_or_default()
                            .to_string(),
                    )
                });
                value_to_string(&initial) != value_to_string(&submitted)
            })
            .map(|f| f.name.clone())
            .collect()
    }

    /// The instance with cleaned values applied.
    ///
    /// # Errors
    ///
    /// [`AdminError::ValidationError`] unless the form is bound and valid.
    pub fn save(&mut self) -> AdminResult<Record> {
        if !self.is_valid() {
            return Err(AdminError::ValidationError(self.validation_error()));
        }
        let mut record = self.instance.clone().unwrap_or_default();
        for (k, v) in &self.cleaned_data {
            record.set(k.clone(), v.clone());
        }
        Ok(record)
    }

    /// The current value shown in a field's input.
    pub fn value(&self, name: &str) -> Value {
        match &self.data {
            Some(data) => {
                let raw = data.get_list(&self.add_prefix(name));
                match raw.len() {
                    0 => Value::Null,
                    1 => Value::String(raw[0].clone()),
                    _ => Value::Array(raw.iter().cloned().map(Value::String).collect()),
                }
            }
            None => self.initial_for(name),
        }
    }

    /// A JSON description for templates.
    pub fn to_context(&self) -> Value {
        let fields: Vec<Value> = self
            .fields
            .iter()
            .map(|f| {
                json!({
                    "name": f.name,
                    "html_name": self.add_prefix(&f.name),
                    "label": f.label,
                    "field_type": f.field_type,
                    "widget": f.widget,
                    "required": f.required,
                    "help_text": f.help_text,
                    "choices": f.choices,
                    "buttons": f.buttons,
                    "value": self.value(&f.name),
                    "errors": self.errors.get(&f.name).cloned().unwrap_or_default(),
                })
            })
            .collect();
        json!({
            "model": self.model,
            "is_bound": self.is_bound(),
            "fields": fields,
            "errors": self.errors,
            "non_field_errors": self.non_field_errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xadmin_rs_db::{FieldDef, FieldType};

    fn meta() -> ModelMeta {
        ModelMeta::new("blog", "Article")
            .field(FieldDef::new("title", FieldType::Char).max_length(10))
            .field(FieldDef::new("body", FieldType::Text).optional())
            .field(FieldDef::new("created", FieldType::DateTime).not_editable())
    }

    #[test]
    fn test_fields_skip_pk_and_non_editable() {
        let form = ModelForm::for_model(&meta(), &ModelFormConfig::new()).unwrap();
        assert_eq!(form.field_names(), vec!["title", "body"]);
    }

    #[test]
    fn test_explicit_fields_and_exclude() {
        let config = ModelFormConfig::new().fields(["body", "title"]).exclude(["title"]);
        let form = ModelForm::for_model(&meta(), &config).unwrap();
        assert_eq!(form.field_names(), vec!["body"]);
    }

    #[test]
    fn test_unknown_field_is_configuration_error() {
        let config = ModelFormConfig::new().fields(["nope", "created"]);
        let err = ModelForm::for_model(&meta(), &config).unwrap_err();
        assert!(
            matches!(err, AdminError::ImproperlyConfigured(ref m) if m.contains("(nope, created)"))
        );
    }

    #[test]
    fn test_unbound_is_never_valid() {
        let mut form = ModelForm::for_model(&meta(), &ModelFormConfig::new()).unwrap();
        assert!(!form.is_valid());
        assert!(form.save().is_err());
    }

    #[test]
    fn test_errors_collected() {
        let mut form = ModelForm::for_model(&meta(), &ModelFormConfig::new())
            .unwrap()
            .bind(QueryDict::parse("title=much+too+long+title"));
        assert!(!form.is_valid());
        assert_eq!(form.errors().len(), 1);
        let err = form.validation_error();
        assert_eq!(err.field_errors["title"].len(), 1);
    }

    #[test]
    fn test_add_error_invalidates() {
        let mut form = ModelForm::for_model(&meta(), &ModelFormConfig::new())
            .unwrap()
            .bind(QueryDict::parse("title=ok"));
        assert!(form.is_valid());
        form.add_error(None, "Duplicate.");
        assert!(!form.is_valid());
        assert_eq!(form.non_field_errors(), ["Duplicate."]);
    }

    #[test]
    fn test_prefix() {
        let mut form = ModelForm::for_model(&meta(), &ModelFormConfig::new())
            .unwrap()
            .with_prefix("quick")
            .bind(QueryDict::parse("quick-title=Hi"));
        assert!(form.is_valid());
        assert_eq!(form.cleaned_data()["title"], json!("Hi"));
    }

    #[test]
    fn test_changed_data_for_new_record() {
        let mut form = ModelForm::for_model(&meta(), &ModelFormConfig::new())
            .unwrap()
            .bind(QueryDict::parse("title=Hi&body="));
        assert!(form.is_valid());
        assert_eq!(form.changed_data(), vec!["title"]);
    }

    #[test]
    fn test_initial_precedence_and_context() {
        let mut initial = Map::new();
        initial.insert("title".into(), json!("From GET"));
        let form = ModelForm::for_model(&meta(), &ModelFormConfig::new())
            .unwrap()
            .with_instance(Record::new().with("title", "Stored"))
            .with_initial(initial);
        assert_eq!(form.value("title"), json!("From GET"));
        let ctx = form.to_context();
        assert_eq!(ctx["fields"][0]["value"], json!("From GET"));
        assert_eq!(ctx["is_bound"], json!(false));
    }

    #[test]
    fn test_retain_fields() {
        let mut form = ModelForm::for_model(&meta(), &ModelFormConfig::new()).unwrap();
        form.retain_fields(|f| f.name == "body");
        assert_eq!(form.field_names(), vec!["body"]);
    }
}
