//! The abstract view result.
//!
//! Views return an [`AdminResponse`] describing what to send; the serving
//! layer renders templates and serializes it. Keeping templates unrendered
//! until the edge lets tests inspect the template names and context a view
//! chose.

use http::{header, StatusCode};
use serde_json::Value;
use xadmin_rs_core::{AdminError, AdminResult};
use xadmin_rs_template::{Context, TemplateRenderer};

/// What a view produced.
///
/// # Examples
///
/// ```
/// use xadmin_rs_http::AdminResponse;
/// use xadmin_rs_template::Context;
///
/// let page = AdminResponse::template(
///     vec!["xadmin/views/model_list.html".to_string()],
///     Context::new().with("title", "Articles"),
/// );
/// assert_eq!(page.status_code(), 200);
/// assert_eq!(page.context().unwrap().get_str("title"), Some("Articles"));
///
/// let redirect = AdminResponse::redirect("/xadmin/");
/// assert_eq!(redirect.status_code(), 302);
/// assert_eq!(redirect.redirect_url(), Some("/xadmin/"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum AdminResponse {
    /// A page rendered from the first existing template.
    Template {
        /// Candidate template names, most specific first.
        templates: Vec<String>,
        /// Template variables.
        context: Context,
        /// HTTP status.
        status: u16,
    },
    /// A `302 Found` redirect to a path.
    Redirect(String),
    /// A structured payload.
    Json(Value),
    /// A fully formed body.
    Content {
        /// HTTP status.
        status: u16,
        /// `Content-Type` header value.
        content_type: String,
        /// The body.
        body: String,
    },
}

impl AdminResponse {
    /// A `200` template response.
    pub fn template(templates: Vec<String>, context: Context) -> Self {
        Self::Template {
            templates,
            context,
            status: 200,
        }
    }

    /// A redirect.
    pub fn redirect(url: impl Into<String>) -> Self {
        Self::Redirect(url.into())
    }

    /// A JSON payload.
    pub fn json(value: Value) -> Self {
        Self::Json(value)
    }

    /// A plain-text body.
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::Content {
            status,
            content_type: "text/plain; charset=utf-8".to_string(),
            body: body.into(),
        }
    }

    /// An HTML body.
    pub fn html(body: impl Into<String>) -> Self {
        Self::Content {
            status: 200,
            content_type: "text/html; charset=utf-8".to_string(),
            body: body.into(),
        }
    }

    /// The plain-text response for an error escaping a view.
    pub fn from_error(err: &AdminError) -> Self {
        let status = err.status_code();
        let reason = StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Error");
        let body = if err.is_client_error() {
            format!("{status} {reason}: {err}")
        } else {
            format!("{status} {reason}")
        };
        Self::text(status, body)
    }

    /// Sets the status of a template or content response.
    #[must_use]
    pub fn with_status(mut self, code: u16) -> Self {
        match &mut self {
            Self::Template { status, .. } | Self::Content { status, .. } => *status = code,
            Self::Redirect(_) | Self::Json(_) => {}
        }
        self
    }

    /// The HTTP status code.
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Template { status, .. } | Self::Content { status, .. } => *status,
            Self::Redirect(_) => 302,
            Self::Json(_) => 200,
        }
    }

    /// The redirect target, if this is a redirect.
    pub fn redirect_url(&self) -> Option<&str> {
        match self {
            Self::Redirect(url) => Some(url),
            _ => None,
        }
    }

    /// Candidate template names, if this is a template response.
    pub fn template_names(&self) -> &[String] {
        match self {
            Self::Template { templates, .. } => templates,
            _ => &[],
        }
    }

    /// The template context, if this is a template response.
    pub const fn context(&self) -> Option<&Context> {
        match self {
            Self::Template { context, .. } => Some(context),
            _ => None,
        }
    }

    /// The JSON payload, if this is a JSON response.
    pub const fn json_body(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Renders and serializes into an `http` response.
    pub fn into_http(self, renderer: &dyn TemplateRenderer) -> AdminResult<http::Response<String>> {
        let (status, content_type, body, location) = match self {
            Self::Template {
                templates,
                context,
                status,
            } => (
                status,
                "text/html; charset=utf-8".to_string(),
                renderer.render(&templates, &context)?,
                None,
            ),
            Self::Redirect(url) => (302, "text/html; charset=utf-8".to_string(), String::new(), Some(url)),
            Self::Json(value) => (
                200,
                "application/json".to_string(),
                serde_json::to_string(&value)?,
                None,
            ),
            Self::Content {
                status,
                content_type,
                body,
            } => (status, content_type, body, None),
        };
        let mut builder = http::Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, content_type);
        if let Some(location) = location {
            builder = builder.header(header::LOCATION, location);
        }
        builder
            .body(body)
            .map_err(|e| AdminError::BadRequest(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use xadmin_rs_template::Engine;

    #[test]
    fn test_from_error_statuses() {
        let denied = AdminResponse::from_error(&AdminError::PermissionDenied("nope".into()));
        assert_eq!(denied.status_code(), 403);
        let internal = AdminResponse::from_error(&AdminError::IncorrectPluginArg("bad".into()));
        assert_eq!(internal.status_code(), 500);
        match internal {
            AdminResponse::Content { body, .. } => assert!(!body.contains("bad")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_with_status() {
        let r = AdminResponse::template(vec![], Context::new()).with_status(404);
        assert_eq!(r.status_code(), 404);
        assert_eq!(AdminResponse::redirect("/").with_status(500).status_code(), 302);
    }

    #[test]
    fn test_into_http_redirect() {
        let engine = Engine::new();
        let resp = AdminResponse::redirect("/xadmin/login/").into_http(&engine).unwrap();
        assert_eq!(resp.status(), 302);
        assert_eq!(resp.headers()[header::LOCATION], "/xadmin/login/");
    }

    #[test]
    fn test_into_http_template_and_json() {
        let mut engine = Engine::new();
        engine.add_raw_template("t.html", "{{ n }}").unwrap();
        let page = AdminResponse::template(vec!["t.html".into()], Context::new().with("n", 5));
        assert_eq!(page.into_http(&engine).unwrap().body(), "5");
        let data = AdminResponse::json(json!({"ok": true})).into_http(&engine).unwrap();
        assert_eq!(data.body(), r#"{"ok":true}"#);
        assert_eq!(data.headers()[header::CONTENT_TYPE], "application/json");
    }

    #[test]
    fn test_into_http_missing_template() {
        let engine = Engine::new();
        let page = AdminResponse::template(vec!["none.html".into()], Context::new());
        assert!(matches!(
            page.into_http(&engine),
            Err(AdminError::TemplateDoesNotExist(_))
        ));
    }
}
