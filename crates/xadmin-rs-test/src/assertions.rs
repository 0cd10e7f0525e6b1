//! Assertions over [`AdminResponse`]s.
//!
//! These inspect the abstract response a view returned, before any template
//! is rendered, so tests need no template files.

use serde_json::Value;
use xadmin_rs_http::AdminResponse;

/// Asserts that the response status code matches the expected value.
///
/// # Panics
///
/// Panics if the status code does not match.
pub fn assert_status(response: &AdminResponse, expected: u16) {
    assert_eq!(
        response.status_code(),
        expected,
        "Expected status {expected}, got {}",
        response.status_code()
    );
}

/// Asserts that the response is a redirect to the expected URL.
///
/// # Panics
///
/// Panics if the response is not a redirect or the URL does not match.
pub fn assert_redirects(response: &AdminResponse, expected_url: &str) {
    let location = response
        .redirect_url()
        .unwrap_or_else(|| panic!("Expected a redirect, got status {}", response.status_code()));
    assert_eq!(
        location, expected_url,
        "Expected redirect to '{expected_url}', got '{location}'"
    );
}

/// Asserts that `template_name` is among the response's candidate templates.
///
/// # Panics
///
/// Panics if the response is not a template response or the template is
/// not a candidate.
pub fn assert_template_used(response: &AdminResponse, template_name: &str) {
    let names = response.template_names();
    assert!(
        names.iter().any(|n| n == template_name),
        "Expected template '{template_name}', got {names:?}"
    );
}

/// Asserts that the response context holds `key` with value `expected`.
///
/// # Panics
///
/// Panics if the response has no context, lacks the key, or holds a
/// different value.
pub fn assert_context_contains(response: &AdminResponse, key: &str, expected: &Value) {
    let context = response
        .context()
        .unwrap_or_else(|| panic!("Response has no template context"));
    let actual = context
        .get(key)
        .unwrap_or_else(|| panic!("Context has no key '{key}'"));
    assert_eq!(actual, expected, "Context key '{key}' is {actual}, expected {expected}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use xadmin_rs_template::Context;

    #[test]
    fn test_assert_template_and_context() {
        let response = AdminResponse::template(
            vec!["xadmin/blog/article/list.html".into(), "xadmin/views/model_list.html".into()],
            Context::new().with("title", "Articles"),
        );
        assert_status(&response, 200);
        assert_template_used(&response, "xadmin/views/model_list.html");
        assert_context_contains(&response, "title", &json!("Articles"));
    }

    #[test]
    fn test_assert_redirects() {
        assert_redirects(&AdminResponse::redirect("/xadmin/"), "/xadmin/");
    }

    #[test]
    #[should_panic(expected = "Expected a redirect")]
    fn test_assert_redirects_rejects_other_responses() {
        assert_redirects(&AdminResponse::json(json!({})), "/xadmin/");
    }
}
