//! Form fields and value cleaning.
//!
//! A [`FormField`] is derived from a model [`FieldDef`] and knows how to turn
//! the raw strings of a POST body into a typed JSON value.
//! [`clean_field_value`] performs, in order, the required check, type
//! coercion, and the length and choice constraints.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use xadmin_rs_core::ValidationError;
use xadmin_rs_db::{FieldDef, FieldType};

/// The input kind a template should render for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Widget {
    /// `<input type="text">`
    TextInput,
    /// `<textarea>`
    Textarea,
    /// `<input type="email">`
    EmailInput,
    /// `<input type="number">`
    NumberInput,
    /// `<input type="checkbox">`
    CheckboxInput,
    /// `<input type="date">`
    DateInput,
    /// `<input type="datetime-local">`
    DateTimeInput,
    /// `<select>`
    Select,
    /// `<select multiple>`
    SelectMultiple,
    /// `<input type="hidden">`
    HiddenInput,
}

impl Widget {
    /// The default widget for a model field.
    pub fn for_field(field: &FieldDef) -> Self {
        if !field.choices.is_empty() {
            return Self::Select;
        }
        match field.field_type {
            FieldType::Text => Self::Textarea,
            FieldType::Email => Self::EmailInput,
            FieldType::Integer | FieldType::Float => Self::NumberInput,
            FieldType::Boolean => Self::CheckboxInput,
            FieldType::Date => Self::DateInput,
            FieldType::DateTime => Self::DateTimeInput,
            FieldType::ForeignKey | FieldType::OneToOne => Self::Select,
            FieldType::ManyToMany => Self::SelectMultiple,
            FieldType::Auto => Self::HiddenInput,
            FieldType::Char => Self::TextInput,
        }
    }
}

/// A button rendered next to a relation widget, opening a related form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldButton {
    /// `"add"` or `"change"`.
    pub action: String,
    /// Tooltip text.
    pub title: String,
    /// Where the related form is loaded from.
    pub editable_url: String,
    /// Where the widget is reloaded from once the related form is saved.
    pub refresh_url: String,
    /// Icon css class.
    pub icon: String,
}

/// An extra check run on a cleaned, non-null value.
pub type Validator = Arc<dyn Fn(&Value) -> Result<(), ValidationError> + Send + Sync>;

/// A form field.
#[derive(Clone, Serialize)]
pub struct FormField {
    /// The model attribute this field edits.
    pub name: String,
    /// The capitalized label.
    pub label: String,
    /// The model storage type.
    pub field_type: FieldType,
    /// Rejects empty input when set.
    pub required: bool,
    /// Maximum number of characters for text fields.
    pub max_length: Option<usize>,
    /// Allowed `(value, label)` pairs.
    pub choices: Vec<(String, String)>,
    /// Help text shown next to the input.
    pub help_text: String,
    /// How the field is rendered.
    pub widget: Widget,
    /// The related model for relation fields.
    pub related_model: Option<String>,
    /// Value used when an optional field is left empty.
    pub empty_value: Value,
    /// Buttons rendered after the widget.
    pub buttons: Vec<FieldButton>,
    #[serde(skip)]
    validators: Vec<Validator>,
}

impl FormField {
    /// Derives a form field from a model field.
    pub fn from_model_field(field: &FieldDef) -> Self {
        let required = field.required && field.default.is_none() && field.field_type != FieldType::Boolean;
        Self {
            name: field.name.clone(),
            label: field.label(),
            field_type: field.field_type,
            required,
            max_length: field.max_length,
            choices: field.choices.clone(),
            help_text: field.help_text.clone(),
            widget: Widget::for_field(field),
            related_model: field.related_model.clone(),
            empty_value: field.default.clone().unwrap_or(if field.field_type == FieldType::ManyToMany {
                json!([])
            } else {
                Value::Null
            }),
            buttons: Vec::new(),
            validators: Vec::new(),
        }
    }

    /// Overrides the widget.
    #[must_use]
    pub const fn widget(mut self, widget: Widget) -> Self {
        self.widget = widget;
        self
    }

    /// Overrides the label.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets whether the field is required.
    #[must_use]
    pub const fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Adds a validator.
    #[must_use]
    pub fn validator(
        mut self,
        check: impl Fn(&Value) -> Result<(), ValidationError> + Send + Sync + 'static,
    ) -> Self {
        self.validators.push(Arc::new(check));
        self
    }

    /// Cleans raw input for this field.
    pub fn clean(&self, raw: &[String]) -> Result<Value, Vec<String>> {
        clean_field_value(self, raw)
    }
}

impl fmt::Debug for FormField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormField")
            .field("name", &self.name)
            .field("field_type", &self.field_type)
            .field("required", &self.required)
            .field("widget", &self.widget)
            .field("validators", &self.validators.len())
            .finish_non_exhaustive()
    }
}

static EMAIL_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());

/// Cleans the raw values submitted for `field`.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use xadmin_rs_db::{FieldDef, FieldType};
/// use xadmin_rs_forms::{clean_field_value, FormField};
///
/// let age = FormField::from_model_field(&FieldDef::new("age", FieldType::Integer));
/// assert_eq!(clean_field_value(&age, &["42".into()]), Ok(json!(42)));
/// assert_eq!(
///     clean_field_value(&age, &["x".into()]),
///     Err(vec!["Enter a whole number.".to_string()])
/// );
/// assert_eq!(
///     clean_field_value(&age, &[]),
///     Err(vec!["This field is required.".to_string()])
/// );
/// ```
pub fn clean_field_value(field: &FormField, raw: &[String]) -> Result<Value, Vec<String>> {
    if field.field_type == FieldType::ManyToMany {
        return clean_many(field, raw);
    }
    let text = raw.last().map_or("", |s| s.trim());

    if text.is_empty() && field.field_type != FieldType::Boolean {
        if field.required {
            return Err(vec!["This field is required.".to_string()]);
        }
        return Ok(field.empty_value.clone());
    }

    let mut errors = Vec::new();
    let value = match field.field_type {
        FieldType::Char | FieldType::Text | FieldType::Email => {
            if let Some(max) = field.max_length {
                let len = text.chars().count();
                if len > max {
                    errors.push(format!(
                        "Ensure this value has at most {max} characters (it has {len})."
                    ));
                }
            }
            if field.field_type == FieldType::Email
                && !EMAIL_RE.as_ref().is_some_and(|re| re.is_match(text))
            {
                errors.push("Enter a valid email address.".to_string());
            }
            Value::String(text.to_string())
        }
        FieldType::Integer | FieldType::Auto => text.parse::<i64>().map_or_else(
            |_| {
                errors.push("Enter a whole number.".to_string());
                Value::Null
            },
            Value::from,
        ),
        FieldType::Float => text.parse::<f64>().map_or_else(
            |_| {
                errors.push("Enter a number.".to_string());
                Value::Null
            },
            Value::from,
        ),
        FieldType::Date => match chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d") {
            Ok(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            Err(_) => {
                errors.push("Enter a valid date.".to_string());
                Value::Null
            }
        },
        FieldType::DateTime => {
            let parsed = chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S")
                .or_else(|_| chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M"))
                .or_else(|_| chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S"))
                .or_else(|_| chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M"));
            match parsed {
                Ok(dt) => Value::String(dt.format("%Y-%m-%dT%H:%M:%S").to_string()),
                Err(_) => {
                    errors.push("Enter a valid date/time.".to_string());
                    Value::Null
                }
            }
        }
        FieldType::Boolean => Value::Bool(matches!(
            text.to_lowercase().as_str(),
            "true" | "1" | "on" | "yes"
        )),
        FieldType::ForeignKey | FieldType::OneToOne | FieldType::ManyToMany => pk_value(text),
    };

    if errors.is_empty() && !field.choices.is_empty() && !field.choices.iter().any(|(v, _)| v == text) {
        errors.push(format!(
            "Select a valid choice. {text} is not one of the available choices."
        ));
    }
    if errors.is_empty() {
        run_validators(field, &value, &mut errors);
    }
    if errors.is_empty() {
        Ok(value)
    } else {
        Err(errors)
    }
}

fn clean_many(field: &FormField, raw: &[String]) -> Result<Value, Vec<String>> {
    let keys: Vec<Value> = raw
        .iter()
        .flat_map(|s| s.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(pk_value)
        .collect();
    if keys.is_empty() && field.required {
        return Err(vec!["This field is required.".to_string()]);
    }
    let value = Value::Array(keys);
    let mut errors = Vec::new();
    run_validators(field, &value, &mut errors);
    if errors.is_empty() {
        Ok(value)
    } else {
        Err(errors)
    }
}

fn run_validators(field: &FormField, value: &Value, errors: &mut Vec<String>) {
    for check in &field.validators {
        if let Err(e) = check(value) {
            errors.extend(e.messages());
        }
    }
}

/// Relation keys are stored as integers when they look like one.
fn pk_value(text: &str) -> Value {
    text.parse::<i64>()
        .map_or_else(|_| Value::String(text.to_string()), Value::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(def: FieldDef) -> FormField {
        FormField::from_model_field(&def)
    }

    fn raw(s: &str) -> Vec<String> {
        vec![s.to_string()]
    }

    #[test]
    fn test_char_max_length() {
        let f = field(FieldDef::new("title", FieldType::Char).max_length(3));
        assert_eq!(f.clean(&raw("abc")), Ok(json!("abc")));
        assert!(f.clean(&raw("abcd")).unwrap_err()[0].contains("at most 3"));
    }

    #[test]
    fn test_optional_empty_uses_default() {
        let f = field(FieldDef::new("status", FieldType::Char).default_value("draft"));
        assert!(!f.required);
        assert_eq!(f.clean(&raw("")), Ok(json!("draft")));
        let g = field(FieldDef::new("subtitle", FieldType::Char).optional());
        assert_eq!(g.clean(&[]), Ok(Value::Null));
    }

    #[test]
    fn test_boolean_never_required() {
        let f = field(FieldDef::new("published", FieldType::Boolean));
        assert!(!f.required);
        assert_eq!(f.clean(&[]), Ok(json!(false)));
        assert_eq!(f.clean(&raw("on")), Ok(json!(true)));
    }

    #[test]
    fn test_email() {
        let f = field(FieldDef::new("email", FieldType::Email));
        assert!(f.clean(&raw("a@b.io")).is_ok());
        assert_eq!(
            f.clean(&raw("nope")),
            Err(vec!["Enter a valid email address.".to_string()])
        );
    }

    #[test]
    fn test_choices() {
        let f = field(
            FieldDef::new("status", FieldType::Char)
                .choices([("draft", "Draft"), ("published", "Published")]),
        );
        assert_eq!(f.widget, Widget::Select);
        assert!(f.clean(&raw("published")).is_ok());
        assert!(f.clean(&raw("archived")).unwrap_err()[0].starts_with("Select a valid choice."));
    }

    #[test]
    fn test_foreign_key_and_many_to_many() {
        let fk = field(FieldDef::new("author", FieldType::ForeignKey).related_model("blog.author"));
        assert_eq!(fk.clean(&raw("7")), Ok(json!(7)));
        assert_eq!(fk.clean(&raw("abc")), Ok(json!("abc")));
        let m2m = field(FieldDef::new("tags", FieldType::ManyToMany).optional());
        assert_eq!(m2m.clean(&["1".into(), "2,3".into()]), Ok(json!([1, 2, 3])));
        assert_eq!(m2m.clean(&[]), Ok(json!([])));
    }

    #[test]
    fn test_dates() {
        let d = field(FieldDef::new("day", FieldType::Date));
        assert_eq!(d.clean(&raw("2024-02-29")), Ok(json!("2024-02-29")));
        assert!(d.clean(&raw("2023-02-29")).is_err());
        let dt = field(FieldDef::new("at", FieldType::DateTime));
        assert_eq!(dt.clean(&raw("2024-01-02 03:04")), Ok(json!("2024-01-02T03:04:00")));
    }

    #[test]
    fn test_custom_validator() {
        let f = field(FieldDef::new("n", FieldType::Integer)).validator(|v| {
            if v.as_i64().unwrap_or(0) % 2 == 0 {
                Ok(())
            } else {
                Err(ValidationError::new("Must be even.", "even"))
            }
        });
        assert!(f.clean(&raw("4")).is_ok());
        assert_eq!(f.clean(&raw("3")), Err(vec!["Must be even.".to_string()]));
    }
}
