//! Site-wide settings.
//!
//! [`AdminSettings`] holds the values that are not tied to a single model or
//! view: titles, URL prefixes, logging, and a few list defaults. Per-model and
//! per-view configuration lives in option bundles instead.
//!
//! Settings are usually produced by [`settings_loader`](crate::settings_loader)
//! and handed to the site once at startup.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Global configuration for an admin site.
///
/// # Examples
///
/// ```
/// use xadmin_rs_core::AdminSettings;
///
/// let settings = AdminSettings::default();
/// assert_eq!(settings.url_prefix, "/xadmin/");
/// assert_eq!(settings.list_per_page, 50);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminSettings {
    /// Debug mode. Enables pretty logs and disables the session nav-menu cache.
    pub debug: bool,
    /// Log filter directive (e.g. "info", "`xadmin_rs_admin=debug`").
    pub log_level: String,
    /// Title shown in the page header.
    pub site_title: String,
    /// Footer text.
    pub site_footer: String,
    /// Path prefix under which the site is mounted. Always ends with `/`.
    pub url_prefix: String,
    /// Prefix for static assets referenced by media lists.
    pub static_url: String,
    /// Directories searched for templates, in order.
    pub template_dirs: Vec<PathBuf>,
    /// Icon used for models that declare none.
    pub default_model_icon: Option<String>,
    /// Rows per changelist page unless a model overrides it.
    pub list_per_page: usize,
    /// Upper bound for the "show all" changelist mode.
    pub list_max_show_all: usize,
    /// Login URL used by redirects. `None` means the site's own login view.
    pub login_url: Option<String>,
    /// Cache the computed navigation menu in the session outside debug mode.
    pub session_nav_menu: bool,
}

impl Default for AdminSettings {
    fn default() -> Self {
        Self {
            debug: true,
            log_level: "info".to_string(),
            site_title: "Django Xadmin".to_string(),
            site_footer: "my-company.inc".to_string(),
            url_prefix: "/xadmin/".to_string(),
            static_url: "/static/".to_string(),
            template_dirs: Vec::new(),
            default_model_icon: None,
            list_per_page: 50,
            list_max_show_all: 200,
            login_url: None,
            session_nav_menu: true,
        }
    }
}

impl AdminSettings {
    /// Returns the URL prefix normalized to start and end with `/`.
    pub fn normalized_prefix(&self) -> String {
        let trimmed = self.url_prefix.trim_matches('/');
        if trimmed.is_empty() {
            "/".to_string()
        } else {
            format!("/{trimmed}/")
        }
    }

    /// Returns `true` if the navigation menu should be cached in the session.
    pub const fn caches_nav_menu(&self) -> bool {
        self.session_nav_menu && !self.debug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = AdminSettings::default();
        assert!(s.debug);
        assert_eq!(s.site_title, "Django Xadmin");
        assert_eq!(s.site_footer, "my-company.inc");
        assert_eq!(s.static_url, "/static/");
        assert_eq!(s.list_max_show_all, 200);
        assert!(s.login_url.is_none());
    }

    #[test]
    fn test_normalized_prefix() {
        let mut s = AdminSettings::default();
        assert_eq!(s.normalized_prefix(), "/xadmin/");
        s.url_prefix = "admin".into();
        assert_eq!(s.normalized_prefix(), "/admin/");
        s.url_prefix = "/".into();
        assert_eq!(s.normalized_prefix(), "/");
    }

    #[test]
    fn test_nav_menu_cache_only_outside_debug() {
        let mut s = AdminSettings::default();
        assert!(!s.caches_nav_menu());
        s.debug = false;
        assert!(s.caches_nav_menu());
        s.session_nav_menu = false;
        assert!(!s.caches_nav_menu());
    }

    #[test]
    fn test_serde_roundtrip_keeps_defaults_for_missing_keys() {
        let s: AdminSettings = serde_json::from_str(r#"{"site_title": "Shop"}"#).unwrap();
        assert_eq!(s.site_title, "Shop");
        assert_eq!(s.list_per_page, 50);
    }
}
