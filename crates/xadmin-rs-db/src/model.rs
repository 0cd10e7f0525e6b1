//! Model metadata.
//!
//! [`ModelMeta`] is everything the admin site needs to know about a model to
//! build screens for it: names, verbose names, the primary key, default
//! ordering, and the list of [`FieldDef`]s. It plays the role of a model's
//! `_meta` options without any ORM behind it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The storage type of a model field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Auto-incrementing integer primary key.
    Auto,
    /// Short string.
    Char,
    /// Long text.
    Text,
    /// Email address.
    Email,
    /// Integer.
    Integer,
    /// Floating point number.
    Float,
    /// Boolean.
    Boolean,
    /// ISO date (`YYYY-MM-DD`).
    Date,
    /// ISO date-time.
    DateTime,
    /// Many-to-one relation stored as the target's primary key.
    ForeignKey,
    /// One-to-one relation stored as the target's primary key.
    OneToOne,
    /// Many-to-many relation stored as a list of target primary keys.
    ManyToMany,
}

impl FieldType {
    /// Returns `true` for the relation types.
    pub const fn is_relation(self) -> bool {
        matches!(self, Self::ForeignKey | Self::OneToOne | Self::ManyToMany)
    }

    /// Returns `true` for types whose values are text.
    pub const fn is_text(self) -> bool {
        matches!(self, Self::Char | Self::Text | Self::Email)
    }
}

/// Describes a single field on a model.
///
/// # Examples
///
/// ```
/// use xadmin_rs_db::model::{FieldDef, FieldType};
///
/// let field = FieldDef::new("author", FieldType::ForeignKey)
///     .related_model("blog.author")
///     .verbose_name("written by");
/// assert!(field.is_relation());
/// assert_eq!(field.label(), "Written by");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    /// The attribute name.
    pub name: String,
    /// Storage type.
    pub field_type: FieldType,
    /// Human-readable name. Defaults to the attribute name with `_` as spaces.
    pub verbose_name: String,
    /// Whether an empty value is rejected by forms.
    pub required: bool,
    /// Whether the store accepts `null`.
    pub null: bool,
    /// Whether forms include this field.
    pub editable: bool,
    /// Whether this is the primary key.
    pub primary_key: bool,
    /// Maximum length for text fields.
    pub max_length: Option<usize>,
    /// Allowed `(value, label)` pairs.
    pub choices: Vec<(String, String)>,
    /// Target model label (`app.model`) for relation fields.
    pub related_model: Option<String>,
    /// Help text shown next to form inputs.
    pub help_text: String,
    /// Default value for new records.
    pub default: Option<Value>,
}

impl FieldDef {
    /// Creates a required, editable field.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        let verbose_name = name.replace('_', " ");
        Self {
            name,
            field_type,
            verbose_name,
            required: !matches!(field_type, FieldType::Boolean | FieldType::ManyToMany),
            null: false,
            editable: field_type != FieldType::Auto,
            primary_key: field_type == FieldType::Auto,
            max_length: None,
            choices: Vec::new(),
            related_model: None,
            help_text: String::new(),
            default: None,
        }
    }

    /// Sets the verbose name.
    #[must_use]
    pub fn verbose_name(mut self, name: impl Into<String>) -> Self {
        self.verbose_name = name.into();
        self
    }

    /// Marks the field optional (`blank=True, null=True`).
    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.required = false;
        self.null = true;
        self
    }

    /// Marks the field read-only in forms.
    #[must_use]
    pub const fn not_editable(mut self) -> Self {
        self.editable = false;
        self
    }

    /// Marks the field as the primary key.
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Sets the maximum length.
    #[must_use]
    pub const fn max_length(mut self, len: usize) -> Self {
        self.max_length = Some(len);
        self
    }

    /// Sets the allowed choices.
    #[must_use]
    pub fn choices<V: Into<String>, L: Into<String>>(
        mut self,
        choices: impl IntoIterator<Item = (V, L)>,
    ) -> Self {
        self.choices = choices
            .into_iter()
            .map(|(v, l)| (v.into(), l.into()))
            .collect();
        self
    }

    /// Sets the relation target.
    #[must_use]
    pub fn related_model(mut self, label: impl Into<String>) -> Self {
        self.related_model = Some(label.into());
        self
    }

    /// Sets the help text.
    #[must_use]
    pub fn help_text(mut self, text: impl Into<String>) -> Self {
        self.help_text = text.into();
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Returns `true` for relation fields.
    pub const fn is_relation(&self) -> bool {
        self.field_type.is_relation()
    }

    /// The capitalized verbose name used as a column header or form label.
    pub fn label(&self) -> String {
        xadmin_rs_core::text::capfirst(&self.verbose_name)
    }

    /// Returns the label of a choice value, if the field has choices.
    pub fn choice_label(&self, value: &str) -> Option<&str> {
        self.choices
            .iter()
            .find(|(v, _)| v == value)
            .map(|(_, l)| l.as_str())
    }
}

/// Metadata describing a model.
///
/// # Examples
///
/// ```
/// use xadmin_rs_db::model::{FieldDef, FieldType, ModelMeta};
///
/// let meta = ModelMeta::new("blog", "BlogPost")
///     .field(FieldDef::new("title", FieldType::Char).max_length(200))
///     .display_field("title");
/// assert_eq!(meta.label(), "blog.blogpost");
/// assert_eq!(meta.verbose_name, "blog post");
/// assert_eq!(meta.verbose_name_plural, "blog posts");
/// assert!(meta.get_field("id").is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMeta {
    /// The owning application's label.
    pub app_label: String,
    /// Lowercased model name.
    pub model_name: String,
    /// The model's class name.
    pub object_name: String,
    /// Singular human-readable name.
    pub verbose_name: String,
    /// Plural human-readable name.
    pub verbose_name_plural: String,
    /// Abstract models cannot be registered with the admin.
    pub abstract_model: bool,
    /// Name of the primary key field.
    pub pk_name: String,
    /// Default ordering (`-` prefix for descending).
    pub ordering: Vec<String>,
    /// Field used as the record's string representation.
    pub display_field: Option<String>,
    /// Fields, in declaration order. Includes the primary key.
    pub fields: Vec<FieldDef>,
}

impl ModelMeta {
    /// Creates metadata with an auto `id` primary key.
    pub fn new(app_label: impl Into<String>, object_name: impl Into<String>) -> Self {
        let object_name = object_name.into();
        let verbose_name = camel_case_to_spaces(&object_name);
        Self {
            app_label: app_label.into(),
            model_name: object_name.to_lowercase(),
            verbose_name_plural: format!("{verbose_name}s"),
            verbose_name,
            object_name,
            abstract_model: false,
            pk_name: "id".to_string(),
            ordering: Vec::new(),
            display_field: None,
            fields: vec![FieldDef::new("id", FieldType::Auto).verbose_name("ID")],
        }
    }

    /// Appends a field.
    #[must_use]
    pub fn field(mut self, field: FieldDef) -> Self {
        if field.primary_key {
            self.fields.retain(|f| !f.primary_key);
            self.pk_name.clone_from(&field.name);
        }
        self.fields.push(field);
        self
    }

    /// Sets the singular verbose name.
    #[must_use]
    pub fn verbose_name(mut self, name: impl Into<String>) -> Self {
        self.verbose_name = name.into();
        self
    }

    /// Sets the plural verbose name.
    #[must_use]
    pub fn verbose_name_plural(mut self, name: impl Into<String>) -> Self {
        self.verbose_name_plural = name.into();
        self
    }

    /// Sets the default ordering.
    #[must_use]
    pub fn ordering<S: Into<String>>(mut self, ordering: impl IntoIterator<Item = S>) -> Self {
        self.ordering = ordering.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the field used as the string representation.
    #[must_use]
    pub fn display_field(mut self, name: impl Into<String>) -> Self {
        self.display_field = Some(name.into());
        self
    }

    /// Marks the model abstract.
    #[must_use]
    pub const fn abstract_model(mut self, value: bool) -> Self {
        self.abstract_model = value;
        self
    }

    /// The `app_label.model_name` key used throughout the site.
    pub fn label(&self) -> String {
        format!("{}.{}", self.app_label, self.model_name)
    }

    /// Looks up a field by name. `pk` resolves to the primary key.
    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        let name = if name == "pk" { self.pk_name.as_str() } else { name };
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns the primary key field.
    pub fn pk_field(&self) -> Option<&FieldDef> {
        self.get_field(&self.pk_name)
    }

    /// Fields shown in forms.
    pub fn editable_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.editable && !f.primary_key)
    }

    /// Relation fields pointing at `target` (`app.model`).
    pub fn relations_to<'a>(&'a self, target: &'a str) -> impl Iterator<Item = &'a FieldDef> + 'a {
        self.fields
            .iter()
            .filter(move |f| f.related_model.as_deref() == Some(target))
    }
}

/// `"BlogPost"` -> `"blog post"`.
fn camel_case_to_spaces(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for c in name.chars() {
        if c.is_uppercase() && prev_lower {
            out.push(' ');
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        out.extend(c.to_lowercase());
    }
    out.trim().to_string()
}
