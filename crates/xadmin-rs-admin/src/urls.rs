//! The site's URL table.
//!
//! Routes are regular expressions relative to the site prefix. Site views
//! come first, then every registered model's views under `^<app>/<model>/`.
//! Within each group, higher priority matches first. Capture groups become
//! the view's positional arguments.

use std::fmt;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;
use xadmin_rs_core::{AdminError, AdminResult};

use crate::registry::{AdminUrl, Registry};
use crate::view_type::ViewType;

/// Characters escaped when an argument is placed into a path.
const PATH_ARG: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

/// One compiled route.
#[derive(Clone)]
pub struct UrlPattern {
    pub route: String,
    regex: Regex,
    pub view_type: &'static ViewType,
    /// The model label for per-model views.
    pub model: Option<String>,
    pub name: String,
}

impl fmt::Debug for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UrlPattern")
            .field("route", &self.route)
            .field("view", &self.view_type.name)
            .field("model", &self.model)
            .field("name", &self.name)
            .finish()
    }
}

/// A resolved request path.
#[derive(Debug, Clone)]
pub struct ResolverMatch {
    pub view_type: &'static ViewType,
    pub model: Option<String>,
    pub args: Vec<String>,
    pub name: String,
}

/// Compiled routes of a site, in match order.
#[derive(Debug, Clone)]
pub struct UrlTable {
    prefix: String,
    patterns: Vec<UrlPattern>,
}

impl UrlTable {
    /// Compiles the registry's views under `prefix`, which must start and
    /// end with `/`.
    pub fn build(registry: &Registry, prefix: &str) -> AdminResult<Self> {
        let mut patterns = Vec::new();
        for url in by_priority(registry.views()) {
            patterns.push(compile(&url.route, url, None, url.name.clone())?);
        }
        for admin in registry.models() {
            let meta = admin.meta();
            let model_root = format!("^{}/{}/", meta.app_label, meta.model_name);
            for url in by_priority(registry.modelviews()) {
                let route = format!("{model_root}{}", url.route.trim_start_matches('^'));
                let name = url
                    .name
                    .replacen("%s", &meta.app_label, 1)
                    .replacen("%s", &meta.model_name, 1);
                patterns.push(compile(&route, url, Some(meta.label()), name)?);
            }
        }
        tracing::debug!(prefix, patterns = patterns.len(), "built url table");
        Ok(Self {
            prefix: prefix.to_string(),
            patterns,
        })
    }

    /// The routes, in match order.
    pub fn patterns(&self) -> &[UrlPattern] {
        &self.patterns
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Matches an absolute request path. `None` when the path is outside the
    /// site or no route matches.
    pub fn resolve(&self, path: &str) -> Option<ResolverMatch> {
        let relative = path.strip_prefix(self.prefix.as_str()).or_else(|| {
            // The site root without its trailing slash.
            (path == self.prefix.trim_end_matches('/')).then_some("")
        })?;
        self.patterns.iter().find_map(|pattern| {
            let caps = pattern.regex.captures(relative)?;
            let args = caps
                .iter()
                .skip(1)
                .map(|m| m.map_or_else(String::new, |m| m.as_str().to_string()))
                .collect();
            Some(ResolverMatch {
                view_type: pattern.view_type,
                model: pattern.model.clone(),
                args,
                name: pattern.name.clone(),
            })
        })
    }

    /// Builds the absolute path of the route named `name` with `args` in
    /// its capture groups.
    ///
    /// # Errors
    ///
    /// `NoReverseMatch` when no route has that name, or none accepts the
    /// arguments.
    pub fn reverse(&self, name: &str, args: &[&str]) -> AdminResult<String> {
        let mut named = self.patterns.iter().filter(|p| p.name == name).peekable();
        if named.peek().is_none() {
            return Err(AdminError::NoReverseMatch(format!("'{name}' is not a valid view name")));
        }
        for pattern in named {
            let Some(relative) = fill_route(&pattern.route, args) else {
                continue;
            };
            if pattern.regex.is_match(&relative) {
                return Ok(format!("{}{relative}", self.prefix));
            }
        }
        Err(AdminError::NoReverseMatch(format!(
            "Reverse for '{name}' with arguments {args:?} not found"
        )))
    }
}

fn by_priority(urls: &[AdminUrl]) -> Vec<&AdminUrl> {
    let mut sorted: Vec<&AdminUrl> = urls.iter().collect();
    sorted.sort_by(|a, b| b.priority.cmp(&a.priority));
    sorted
}

fn compile(route: &str, url: &AdminUrl, model: Option<String>, name: String) -> AdminResult<UrlPattern> {
    let regex = Regex::new(route)
        .map_err(|e| AdminError::ImproperlyConfigured(format!("invalid route '{route}': {e}")))?;
    Ok(UrlPattern {
        route: route.to_string(),
        regex,
        view_type: url.view_type,
        model,
        name,
    })
}

/// Replaces each top-level group of `route` with the next argument and
/// strips the anchors. `None` when the counts differ.
fn fill_route(route: &str, args: &[&str]) -> Option<String> {
    let body = route.strip_prefix('^').unwrap_or(route);
    let body = body.strip_suffix('$').unwrap_or(body);

    let mut out = String::with_capacity(body.len());
    let mut args = args.iter();
    let mut depth = 0usize;
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let escaped = chars.next()?;
                if depth == 0 {
                    out.push(escaped);
                }
            }
            '(' => {
                if depth == 0 {
                    out.push_str(&utf8_percent_encode(args.next()?, PATH_ARG).to_string());
                }
                depth += 1;
            }
            ')' => depth = depth.checked_sub(1)?,
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    if args.next().is_some() {
        return None;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_route_groups() {
        assert_eq!(fill_route("^(.+)/update/$", &["7"]).as_deref(), Some("7/update/"));
        assert_eq!(fill_route("^$", &[]).as_deref(), Some(""));
        assert_eq!(fill_route("^blog/article/add/$", &[]).as_deref(), Some("blog/article/add/"));
    }

    #[test]
    fn test_fill_route_argument_count() {
        assert_eq!(fill_route("^(.+)/update/$", &[]), None);
        assert_eq!(fill_route("^add/$", &["1"]), None);
    }

    #[test]
    fn test_fill_route_nested_and_escaped() {
        assert_eq!(
            fill_route(r"^export\.(\w+(-\d+)?)/$", &["csv"]).as_deref(),
            Some("export.csv/")
        );
    }

    #[test]
    fn test_fill_route_encodes_arguments() {
        assert_eq!(fill_route("^(.+)/detail/$", &["a b"]).as_deref(), Some("a%20b/detail/"));
    }
}
