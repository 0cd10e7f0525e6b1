//! Loading [`AdminSettings`] from configuration files and the environment.
//!
//! ## Loading Order
//!
//! 1. Start with default settings.
//! 2. Load from a TOML or JSON file (overriding defaults).
//! 3. Apply environment variable overrides (highest priority).
//!
//! ## Environment Variable Mapping
//!
//! | Env Var | Setting |
//! |---|---|
//! | `XADMIN_DEBUG` | `debug` |
//! | `XADMIN_LOG_LEVEL` | `log_level` |
//! | `XADMIN_SITE_TITLE` | `site_title` |
//! | `XADMIN_SITE_FOOTER` | `site_footer` |
//! | `XADMIN_URL_PREFIX` | `url_prefix` |
//! | `XADMIN_STATIC_URL` | `static_url` |
//! | `XADMIN_LIST_PER_PAGE` | `list_per_page` |
//! | `XADMIN_TEMPLATE_DIRS` | `template_dirs` (colon-separated) |
//!
//! ## Examples
//!
//! ```rust,no_run
//! use xadmin_rs_core::settings_loader;
//!
//! let settings = settings_loader::from_toml_file_with_env("config/admin.toml").unwrap();
//! ```

use std::path::{Path, PathBuf};

use crate::error::AdminError;
use crate::settings::AdminSettings;

/// Loads settings from a TOML string.
///
/// Keys missing from the TOML keep their default values.
pub fn from_toml_str(toml_str: &str) -> Result<AdminSettings, AdminError> {
    let toml_value: toml::Value = toml::from_str(toml_str)
        .map_err(|e| AdminError::ConfigurationError(format!("Failed to parse TOML: {e}")))?;
    merge_over_defaults(toml_to_json(toml_value), "TOML")
}

/// Loads settings from a TOML file.
pub fn from_toml_file(path: impl AsRef<Path>) -> Result<AdminSettings, AdminError> {
    let content = read_config(path.as_ref(), "TOML")?;
    from_toml_str(&content)
}

/// Loads settings from a TOML file and then applies environment variable overrides.
pub fn from_toml_file_with_env(path: impl AsRef<Path>) -> Result<AdminSettings, AdminError> {
    let mut settings = from_toml_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Loads settings from a JSON string.
pub fn from_json_str(json_str: &str) -> Result<AdminSettings, AdminError> {
    let json_value: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| AdminError::ConfigurationError(format!("Failed to parse JSON: {e}")))?;
    merge_over_defaults(json_value, "JSON")
}

/// Loads settings from a JSON file.
pub fn from_json_file(path: impl AsRef<Path>) -> Result<AdminSettings, AdminError> {
    let content = read_config(path.as_ref(), "JSON")?;
    from_json_str(&content)
}

/// Loads settings from a JSON file and then applies environment variable overrides.
pub fn from_json_file_with_env(path: impl AsRef<Path>) -> Result<AdminSettings, AdminError> {
    let mut settings = from_json_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Loads settings from just environment variables (starting from defaults).
pub fn from_env() -> AdminSettings {
    let mut settings = AdminSettings::default();
    apply_env_overrides(&mut settings);
    settings
}

/// Applies `XADMIN_*` environment variable overrides to a settings struct.
///
/// Unparseable numeric values are ignored.
pub fn apply_env_overrides(settings: &mut AdminSettings) {
    if let Ok(val) = std::env::var("XADMIN_DEBUG") {
        settings.debug = matches!(val.to_lowercase().as_str(), "true" | "1" | "yes");
    }

    if let Ok(val) = std::env::var("XADMIN_LOG_LEVEL") {
        settings.log_level = val;
    }

    if let Ok(val) = std::env::var("XADMIN_SITE_TITLE") {
        settings.site_title = val;
    }

    if let Ok(val) = std::env::var("XADMIN_SITE_FOOTER") {
        settings.site_footer = val;
    }

    if let Ok(val) = std::env::var("XADMIN_URL_PREFIX") {
        settings.url_prefix = val;
    }

    if let Ok(val) = std::env::var("XADMIN_STATIC_URL") {
        settings.static_url = val;
    }

    if let Ok(val) = std::env::var("XADMIN_LIST_PER_PAGE") {
        if let Ok(n) = val.parse::<usize>() {
            settings.list_per_page = n;
        }
    }

    if let Ok(val) = std::env::var("XADMIN_TEMPLATE_DIRS") {
        settings.template_dirs = val
            .split(':')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .collect();
    }
}

// ============================================================
// Helpers
// ============================================================

fn read_config(path: &Path, kind: &str) -> Result<String, AdminError> {
    std::fs::read_to_string(path).map_err(|e| {
        AdminError::ConfigurationError(format!(
            "Failed to read {kind} file '{}': {e}",
            path.display()
        ))
    })
}

fn merge_over_defaults(
    value: serde_json::Value,
    kind: &str,
) -> Result<AdminSettings, AdminError> {
    let default_json = serde_json::to_value(AdminSettings::default()).map_err(|e| {
        AdminError::ConfigurationError(format!("Failed to serialize default settings: {e}"))
    })?;
    let merged = merge_json(default_json, value);
    serde_json::from_value(merged).map_err(|e| {
        AdminError::ConfigurationError(format!("Failed to deserialize settings from {kind}: {e}"))
    })
}

/// Converts a TOML value to a `serde_json::Value`.
fn toml_to_json(value: toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s),
        toml::Value::Integer(i) => serde_json::json!(i),
        toml::Value::Float(f) => serde_json::json!(f),
        toml::Value::Boolean(b) => serde_json::Value::Bool(b),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(arr) => {
            serde_json::Value::Array(arr.into_iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => serde_json::Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

/// Deep-merges two JSON values. The `override_val` takes precedence.
fn merge_json(base: serde_json::Value, override_val: serde_json::Value) -> serde_json::Value {
    match (base, override_val) {
        (serde_json::Value::Object(mut base_map), serde_json::Value::Object(override_map)) => {
            for (key, override_v) in override_map {
                let merged = if let Some(base_v) = base_map.remove(&key) {
                    merge_json(base_v, override_v)
                } else {
                    override_v
                };
                base_map.insert(key, merged);
            }
            serde_json::Value::Object(base_map)
        }
        (_, override_val) => override_val,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── TOML loading ────────────────────────────────────────────────

    #[test]
    fn test_from_toml_str_basic() {
        let toml = r#"
            debug = false
            site_title = "Shop Admin"
            list_per_page = 25
        "#;

        let settings = from_toml_str(toml).unwrap();
        assert!(!settings.debug);
        assert_eq!(settings.site_title, "Shop Admin");
        assert_eq!(settings.list_per_page, 25);
        // Defaults preserved
        assert_eq!(settings.static_url, "/static/");
    }

    #[test]
    fn test_from_toml_str_template_dirs() {
        let toml = r#"template_dirs = ["templates", "/srv/admin/templates"]"#;
        let settings = from_toml_str(toml).unwrap();
        assert_eq!(settings.template_dirs.len(), 2);
        assert_eq!(settings.template_dirs[0], PathBuf::from("templates"));
    }

    #[test]
    fn test_from_toml_str_empty() {
        let settings = from_toml_str("").unwrap();
        assert!(settings.debug);
        assert_eq!(settings.url_prefix, "/xadmin/");
    }

    #[test]
    fn test_from_toml_str_invalid() {
        assert!(from_toml_str("this is [[ not toml").is_err());
    }

    #[test]
    fn test_from_toml_str_wrong_type() {
        let err = from_toml_str(r#"list_per_page = "many""#).unwrap_err();
        assert!(matches!(err, AdminError::ConfigurationError(_)));
    }

    // ── JSON loading ────────────────────────────────────────────────

    #[test]
    fn test_from_json_str_basic() {
        let settings =
            from_json_str(r#"{"site_footer": "acme", "login_url": "/accounts/login/"}"#).unwrap();
        assert_eq!(settings.site_footer, "acme");
        assert_eq!(settings.login_url.as_deref(), Some("/accounts/login/"));
    }

    #[test]
    fn test_from_json_str_empty_object() {
        let settings = from_json_str("{}").unwrap();
        assert_eq!(settings.list_max_show_all, 200);
    }

    #[test]
    fn test_from_json_str_invalid() {
        assert!(from_json_str("{not json").is_err());
    }

    // ── File loading ────────────────────────────────────────────────

    #[test]
    fn test_from_toml_file() {
        let dir = std::env::temp_dir().join("xadmin_rs_test_toml");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("admin.toml");
        std::fs::write(&path, "site_title = \"From File\"\ndebug = false\n").unwrap();

        let settings = from_toml_file(&path).unwrap();
        assert_eq!(settings.site_title, "From File");
        assert!(!settings.debug);

        std::fs::remove_file(&path).ok();
        std::fs::remove_dir(&dir).ok();
    }

    #[test]
    fn test_from_json_file() {
        let dir = std::env::temp_dir().join("xadmin_rs_test_json");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("admin.json");
        std::fs::write(&path, r#"{"url_prefix": "/admin/"}"#).unwrap();

        let settings = from_json_file(&path).unwrap();
        assert_eq!(settings.url_prefix, "/admin/");

        std::fs::remove_file(&path).ok();
        std::fs::remove_dir(&dir).ok();
    }

    #[test]
    fn test_from_toml_file_missing() {
        let err = from_toml_file("/nonexistent/path/admin.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read TOML file"));
    }

    #[test]
    fn test_from_json_file_missing() {
        assert!(from_json_file("/nonexistent/path/admin.json").is_err());
    }

    // ── Environment variable overrides ──────────────────────────────

    #[test]
    fn test_apply_env_overrides_site_title() {
        let mut settings = AdminSettings::default();
        std::env::set_var("XADMIN_SITE_TITLE", "Env Title");
        apply_env_overrides(&mut settings);
        assert_eq!(settings.site_title, "Env Title");
        std::env::remove_var("XADMIN_SITE_TITLE");
    }

    #[test]
    fn test_apply_env_overrides_list_per_page() {
        let mut settings = AdminSettings::default();
        std::env::set_var("XADMIN_LIST_PER_PAGE", "10");
        apply_env_overrides(&mut settings);
        assert_eq!(settings.list_per_page, 10);

        std::env::set_var("XADMIN_LIST_PER_PAGE", "lots");
        apply_env_overrides(&mut settings);
        assert_eq!(settings.list_per_page, 10);
        std::env::remove_var("XADMIN_LIST_PER_PAGE");
    }

    #[test]
    fn test_apply_env_overrides_template_dirs() {
        let mut settings = AdminSettings::default();
        std::env::set_var("XADMIN_TEMPLATE_DIRS", "a:b: :c");
        apply_env_overrides(&mut settings);
        assert_eq!(
            settings.template_dirs,
            vec![PathBuf::from("a"), PathBuf::from("b"), PathBuf::from("c")]
        );
        std::env::remove_var("XADMIN_TEMPLATE_DIRS");
    }

    #[test]
    fn test_from_env_defaults() {
        let settings = from_env();
        assert_eq!(settings.site_footer, "my-company.inc");
    }

    // ── Helpers ─────────────────────────────────────────────────────

    #[test]
    fn test_merge_json_nested() {
        let base = serde_json::json!({"a": {"x": 1, "y": 2}, "b": 1});
        let over = serde_json::json!({"a": {"y": 3}});
        let merged = merge_json(base, over);
        assert_eq!(merged["a"]["x"], 1);
        assert_eq!(merged["a"]["y"], 3);
        assert_eq!(merged["b"], 1);
    }

    #[test]
    fn test_merge_json_array_override() {
        let merged = merge_json(serde_json::json!({"a": [1, 2]}), serde_json::json!({"a": [3]}));
        assert_eq!(merged["a"], serde_json::json!([3]));
    }

    #[test]
    fn test_toml_to_json() {
        let value: toml::Value = toml::from_str("n = 1\nflag = true\n[t]\ns = \"x\"").unwrap();
        let json = toml_to_json(value);
        assert_eq!(json["n"], 1);
        assert_eq!(json["flag"], true);
        assert_eq!(json["t"]["s"], "x");
    }
}
