//! Static asset lists.
//!
//! Every view and plugin contributes CSS and JavaScript through the
//! `get_media` extension point. [`Media`] values are merged in chain order
//! without duplicates and rendered into `<link>`/`<script>` tags by the
//! base template.
//!
//! # Examples
//!
//! ```
//! use xadmin_rs_template::Media;
//!
//! let base = Media::new().js("xadmin/js/xadmin.main.js");
//! let plugin = Media::new()
//!     .js("xadmin/js/xadmin.main.js")
//!     .js("xadmin/js/xadmin.plugin.filters.js");
//!
//! let merged = base + plugin;
//! assert_eq!(merged.js_files().len(), 2);
//! assert!(merged.render("/static/").contains("/static/xadmin/js/xadmin.plugin.filters.js"));
//! ```

use std::collections::BTreeMap;
use std::ops::Add;

use serde::{Deserialize, Serialize};
use xadmin_rs_core::{AdminError, AdminResult};

/// CSS (by media type) and JavaScript asset paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    css: BTreeMap<String, Vec<String>>,
    js: Vec<String>,
}

impl Media {
    /// Creates an empty asset list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a JavaScript file.
    #[must_use]
    pub fn js(mut self, path: impl Into<String>) -> Self {
        push_unique(&mut self.js, path.into());
        self
    }

    /// Adds a stylesheet for the `screen` media type.
    #[must_use]
    pub fn css(self, path: impl Into<String>) -> Self {
        self.css_for("screen", path)
    }

    /// Adds a stylesheet for a specific media type.
    #[must_use]
    pub fn css_for(mut self, medium: impl Into<String>, path: impl Into<String>) -> Self {
        push_unique(self.css.entry(medium.into()).or_default(), path.into());
        self
    }

    /// Appends every asset of `other` not already present.
    pub fn merge(&mut self, other: &Self) {
        for path in &other.js {
            push_unique(&mut self.js, path.clone());
        }
        for (medium, paths) in &other.css {
            let target = self.css.entry(medium.clone()).or_default();
            for path in paths {
                push_unique(target, path.clone());
            }
        }
    }

    /// JavaScript files in inclusion order.
    pub fn js_files(&self) -> &[String] {
        &self.js
    }

    /// Stylesheets grouped by media type.
    pub const fn css_files(&self) -> &BTreeMap<String, Vec<String>> {
        &self.css
    }

    /// Returns `true` if no asset is listed.
    pub fn is_empty(&self) -> bool {
        self.js.is_empty() && self.css.values().all(Vec::is_empty)
    }

    /// Renders the tags, stylesheets first. Relative paths are prefixed with
    /// `static_url`.
    pub fn render(&self, static_url: &str) -> String {
        let mut out = Vec::new();
        for (medium, paths) in &self.css {
            for path in paths {
                out.push(format!(
                    "<link href=\"{}\" type=\"text/css\" media=\"{medium}\" rel=\"stylesheet\">",
                    absolute_path(static_url, path)
                ));
            }
        }
        for path in &self.js {
            out.push(format!(
                "<script type=\"text/javascript\" src=\"{}\"></script>",
                absolute_path(static_url, path)
            ));
        }
        out.join("\n")
    }
}

impl Add for Media {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self::Output {
        self.merge(&rhs);
        self
    }
}

fn push_unique(list: &mut Vec<String>, path: String) {
    if !list.contains(&path) {
        list.push(path);
    }
}

fn absolute_path(static_url: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") || path.starts_with('/') {
        path.to_string()
    } else {
        format!("{static_url}{path}")
    }
}

// ── Vendored assets ─────────────────────────────────────────────────

/// `(tag, dev files, production files)`
const VENDORS: &[(&str, &[&str], &[&str])] = &[
    (
        "jquery.js",
        &["xadmin/vendor/jquery/jquery.js"],
        &["xadmin/vendor/jquery/jquery.min.js"],
    ),
    (
        "bootstrap.js",
        &[
            "xadmin/vendor/popper/popper.js",
            "xadmin/vendor/bootstrap/js/bootstrap.js",
        ],
        &[
            "xadmin/vendor/popper/popper.min.js",
            "xadmin/vendor/bootstrap/js/bootstrap.min.js",
        ],
    ),
    (
        "bootstrap.css",
        &["xadmin/vendor/bootstrap/css/bootstrap.css"],
        &["xadmin/vendor/bootstrap/css/bootstrap.min.css"],
    ),
    (
        "font-awesome.css",
        &["xadmin/vendor/font-awesome/css/font-awesome.css"],
        &["xadmin/vendor/font-awesome/css/font-awesome.min.css"],
    ),
    (
        "select.js",
        &["xadmin/vendor/select2/select2.js"],
        &["xadmin/vendor/select2/select2.min.js"],
    ),
    (
        "select.css",
        &["xadmin/vendor/select2/select2.css"],
        &["xadmin/vendor/select2/select2.min.css"],
    ),
];

/// Resolves vendor tags such as `"jquery.js"` or `"xadmin.main.js"` into a
/// [`Media`] value. Tags starting with `xadmin.` map to the bundled
/// `xadmin/js/` and `xadmin/css/` files; others must be known vendors.
///
/// # Examples
///
/// ```
/// use xadmin_rs_template::media::vendor;
///
/// let media = vendor(&["jquery.js", "xadmin.main.js", "xadmin.main.css"], true).unwrap();
/// assert_eq!(
///     media.js_files(),
///     ["xadmin/vendor/jquery/jquery.js", "xadmin/js/xadmin.main.js"]
/// );
/// assert!(vendor(&["unknown.js"], true).is_err());
/// ```
pub fn vendor(tags: &[&str], debug: bool) -> AdminResult<Media> {
    let mut media = Media::new();
    for tag in tags {
        let kind = tag.rsplit('.').next().unwrap_or_default();
        let files: Vec<String> = if let Some((_, dev, prod)) =
            VENDORS.iter().find(|(name, _, _)| name == tag)
        {
            let chosen = if debug { dev } else { prod };
            chosen.iter().map(|s| (*s).to_string()).collect()
        } else if tag.starts_with("xadmin.") && matches!(kind, "js" | "css") {
            vec![format!("xadmin/{kind}/{tag}")]
        } else {
            return Err(AdminError::ImproperlyConfigured(format!(
                "Unknown vendor asset '{tag}'"
            )));
        };
        for file in files {
            media = match kind {
                "css" => media.css(file),
                _ => media.js(file),
            };
        }
    }
    Ok(media)
}
