//! Error types for the admin site.
//!
//! [`AdminError`] covers registration-time configuration mistakes, plugin
//! protocol violations, authorization and lookup failures raised while serving
//! a request, and the collaborator failures (store, templates, IO) underneath.
//! Every variant maps to an HTTP status via [`AdminError::status_code`], which
//! is what the request boundary uses to turn an error into a response.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// A validation failure with optional per-field error lists.
///
/// Form cleaning and filter lookups report problems through this type. It is
/// shown to the end user as part of a normal response rather than treated as
/// a fault.
///
/// # Examples
///
/// ```
/// use xadmin_rs_core::error::ValidationError;
///
/// let err = ValidationError::new("This field is required.", "required");
/// assert_eq!(err.to_string(), "This field is required.");
///
/// let err = ValidationError::for_field("title", "Ensure this value has at most 5 characters.", "max_length");
/// assert_eq!(err.field_errors["title"].len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The primary error message.
    pub message: String,
    /// A short code identifying the failure (e.g. "required", "invalid").
    pub code: String,
    /// Per-field messages, keyed by field name.
    pub field_errors: BTreeMap<String, Vec<String>>,
}

impl ValidationError {
    /// Creates a new `ValidationError` with a message and code.
    pub fn new(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            field_errors: BTreeMap::new(),
        }
    }

    /// Creates a `ValidationError` holding a single field error.
    pub fn for_field(
        field: impl Into<String>,
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        let mut field_errors = BTreeMap::new();
        field_errors.insert(field.into(), vec![message.into()]);
        Self {
            message: String::new(),
            code: code.into(),
            field_errors,
        }
    }

    /// Creates a `ValidationError` from a map of per-field errors.
    pub fn with_field_errors(field_errors: BTreeMap<String, Vec<String>>) -> Self {
        Self {
            message: String::new(),
            code: "invalid".to_string(),
            field_errors,
        }
    }

    /// Returns every message carried by this error, field errors last.
    pub fn messages(&self) -> Vec<String> {
        let mut out = Vec::new();
        if !self.message.is_empty() {
            out.push(self.message.clone());
        }
        for errors in self.field_errors.values() {
            out.extend(errors.iter().cloned());
        }
        out
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.message.is_empty() {
            return write!(f, "{}", self.message);
        }
        let mut first = true;
        for (field, errors) in &self.field_errors {
            for error in errors {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{field}: {error}")?;
                first = false;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// The error type for every xadmin-rs crate.
#[derive(Error, Debug)]
pub enum AdminError {
    // ── Registration ─────────────────────────────────────────────────

    /// A malformed registration call, or a registration after the site froze.
    #[error("Improperly configured: {0}")]
    ImproperlyConfigured(String),

    /// The model, option bundle or plugin is already registered.
    #[error("Already registered: {0}")]
    AlreadyRegistered(String),

    /// The model, option bundle or plugin is not registered.
    #[error("Not registered: {0}")]
    NotRegistered(String),

    // ── Plugin protocol ──────────────────────────────────────────────

    /// A plugin handler does not match the contract of the hook it was
    /// registered for.
    #[error("Incorrect plugin argument: {0}")]
    IncorrectPluginArg(String),

    // ── Request handling ─────────────────────────────────────────────

    /// HTTP 400 Bad Request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// HTTP 403 Forbidden.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// HTTP 404 Not Found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// HTTP 405 Method Not Allowed.
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    /// A changelist filter refers to a field or lookup that does not exist.
    #[error("Incorrect lookup parameters: {0}")]
    IncorrectLookupParameters(String),

    /// A request tried something that should never come from the admin UI.
    #[error("Suspicious operation: {0}")]
    SuspiciousOperation(String),

    /// No URL pattern matches the given name and arguments.
    #[error("No reverse match: {0}")]
    NoReverseMatch(String),

    // ── Validation ───────────────────────────────────────────────────

    /// One or more fields failed validation.
    #[error("Validation error: {0}")]
    ValidationError(ValidationError),

    // ── Collaborators ────────────────────────────────────────────────

    /// The record store failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// None of the candidate templates exist.
    #[error("Template does not exist: {0}")]
    TemplateDoesNotExist(String),

    /// A template failed to compile or render.
    #[error("Template error: {0}")]
    TemplateError(String),

    /// A configuration file or value could not be read.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// An error occurred during serialization or deserialization.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AdminError {
    /// Returns the HTTP status code associated with this error.
    ///
    /// - `BadRequest`, `ValidationError`, `IncorrectLookupParameters` -> 400
    /// - `PermissionDenied`, `SuspiciousOperation` -> 403
    /// - `NotFound` -> 404
    /// - `MethodNotAllowed` -> 405
    /// - Everything else -> 500
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) | Self::ValidationError(_) | Self::IncorrectLookupParameters(_) => {
                400
            }
            Self::PermissionDenied(_) | Self::SuspiciousOperation(_) => 403,
            Self::NotFound(_) => 404,
            Self::MethodNotAllowed(_) => 405,
            Self::ImproperlyConfigured(_)
            | Self::AlreadyRegistered(_)
            | Self::NotRegistered(_)
            | Self::IncorrectPluginArg(_)
            | Self::NoReverseMatch(_)
            | Self::DatabaseError(_)
            | Self::TemplateDoesNotExist(_)
            | Self::TemplateError(_)
            | Self::ConfigurationError(_)
            | Self::SerializationError(_)
            | Self::IoError(_) => 500,
        }
    }

    /// Returns `true` for errors that describe the request rather than a
    /// fault in the site. These are not logged as errors at the boundary.
    pub const fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}

impl From<ValidationError> for AdminError {
    fn from(err: ValidationError) -> Self {
        Self::ValidationError(err)
    }
}

impl From<serde_json::Error> for AdminError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// A convenience type alias for `Result<T, AdminError>`.
pub type AdminResult<T> = Result<T, AdminError>;
