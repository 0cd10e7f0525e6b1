//! Template rendering.
//!
//! [`TemplateRenderer`] is the seam between the admin views and whatever
//! template language an integrator prefers. Views always pass an ordered
//! list of candidate names, most specific first, and the renderer uses the
//! first one it knows.

use std::path::Path;

use xadmin_rs_core::{AdminError, AdminResult};

use crate::context::Context;

/// Renders templates by name.
pub trait TemplateRenderer: Send + Sync {
    /// Returns `true` if a template with this name can be rendered.
    fn has_template(&self, name: &str) -> bool;

    /// Renders exactly one named template.
    fn render_template(&self, name: &str, context: &Context) -> AdminResult<String>;

    /// Renders the first existing template among `names`.
    fn render(&self, names: &[String], context: &Context) -> AdminResult<String> {
        let name = select_template(self, names)?;
        self.render_template(name, context)
    }
}

/// Returns the first name the renderer knows.
pub fn select_template<'a, R: TemplateRenderer + ?Sized>(
    renderer: &R,
    names: &'a [String],
) -> AdminResult<&'a str> {
    names
        .iter()
        .find(|n| renderer.has_template(n))
        .map(String::as_str)
        .ok_or_else(|| AdminError::TemplateDoesNotExist(names.join(", ")))
}

/// A Tera-backed [`TemplateRenderer`].
///
/// # Examples
///
/// ```
/// use xadmin_rs_template::{Context, Engine, TemplateRenderer};
///
/// let mut engine = Engine::new();
/// engine.add_raw_template("xadmin/views/base.html", "Hello {{ name }}!").unwrap();
///
/// let ctx = Context::new().with("name", "World");
/// let names = vec![
///     "xadmin/blog/views/base.html".to_string(),
///     "xadmin/views/base.html".to_string(),
/// ];
/// assert_eq!(engine.render(&names, &ctx).unwrap(), "Hello World!");
/// ```
#[derive(Debug, Default)]
pub struct Engine {
    tera: tera::Tera,
}

impl Engine {
    /// Creates an engine with no templates.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine loading every file below each directory. Template
    /// names are paths relative to their directory; earlier directories win.
    pub fn from_dirs<P: AsRef<Path>>(dirs: &[P]) -> AdminResult<Self> {
        let mut engine = Self::new();
        for dir in dirs.iter().rev() {
            let glob = format!("{}/**/*", dir.as_ref().display());
            let loaded = tera::Tera::new(&glob).map_err(template_error)?;
            tracing::debug!(
                dir = %dir.as_ref().display(),
                templates = loaded.get_template_names().count(),
                "loaded template directory"
            );
            engine.tera.extend(&loaded).map_err(template_error)?;
        }
        Ok(engine)
    }

    /// Registers a template from a string, replacing any existing template
    /// with the same name.
    pub fn add_raw_template(&mut self, name: &str, source: &str) -> AdminResult<()> {
        self.tera
            .add_raw_template(name, source)
            .map_err(template_error)
    }

    /// Names of every known template.
    pub fn template_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tera.get_template_names().collect();
        names.sort_unstable();
        names
    }
}

impl TemplateRenderer for Engine {
    fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }

    fn render_template(&self, name: &str, context: &Context) -> AdminResult<String> {
        let ctx = tera::Context::from_value(context.clone().into_value()).map_err(template_error)?;
        self.tera.render(name, &ctx).map_err(template_error)
    }
}

fn template_error(err: tera::Error) -> AdminError {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    AdminError::TemplateError(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_select_first_existing() {
        let mut engine = Engine::new();
        engine.add_raw_template("b.html", "B").unwrap();
        engine.add_raw_template("c.html", "C").unwrap();
        let list = names(&["a.html", "b.html", "c.html"]);
        assert_eq!(select_template(&engine, &list).unwrap(), "b.html");
    }

    #[test]
    fn test_missing_template() {
        let engine = Engine::new();
        let err = engine.render(&names(&["x.html", "y.html"]), &Context::new()).unwrap_err();
        assert!(matches!(err, AdminError::TemplateDoesNotExist(ref m) if m == "x.html, y.html"));
    }

    #[test]
    fn test_syntax_error_reported() {
        let mut engine = Engine::new();
        let err = engine.add_raw_template("bad.html", "{% if %}").unwrap_err();
        assert!(matches!(err, AdminError::TemplateError(_)));
    }

    #[test]
    fn test_inheritance_and_nested_values() {
        let mut engine = Engine::new();
        engine
            .add_raw_template("base.html", "<h1>{% block title %}{% endblock %}</h1>")
            .unwrap();
        engine
            .add_raw_template(
                "child.html",
                "{% extends \"base.html\" %}{% block title %}{{ opts.verbose_name }}{% endblock %}",
            )
            .unwrap();
        let ctx = Context::new().with("opts", serde_json::json!({"verbose_name": "article"}));
        assert_eq!(
            engine.render_template("child.html", &ctx).unwrap(),
            "<h1>article</h1>"
        );
        assert_eq!(engine.template_names(), vec!["base.html", "child.html"]);
    }
}
