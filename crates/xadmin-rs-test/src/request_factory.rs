//! Builds [`AdminRequest`]s for calling a site directly.
//!
//! ```
//! use xadmin_rs_test::fixtures;
//! use xadmin_rs_test::RequestFactory;
//!
//! let factory = RequestFactory::new().user(fixtures::superuser());
//! let request = factory.get("/xadmin/blog/article/?p=1");
//! assert_eq!(request.path(), "/xadmin/blog/article/");
//! assert_eq!(request.get().get("p"), Some("1"));
//! assert!(request.user().is_superuser);
//! ```

use http::Method;
use xadmin_rs_auth::AdminUser;
use xadmin_rs_http::{AdminRequest, AdminRequestBuilder, Session};

/// Builds requests sharing one user and one session.
#[derive(Debug, Clone)]
pub struct RequestFactory {
    user: AdminUser,
    session: Session,
    headers: Vec<(String, String)>,
}

impl Default for RequestFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestFactory {
    /// An anonymous factory with a fresh session.
    pub fn new() -> Self {
        Self {
            user: AdminUser::anonymous(),
            session: Session::new(),
            headers: Vec::new(),
        }
    }

    /// Sends requests as `user`.
    #[must_use]
    pub fn user(mut self, user: AdminUser) -> Self {
        self.user = user;
        self
    }

    /// Shares `session` between requests.
    #[must_use]
    pub fn session(mut self, session: Session) -> Self {
        self.session = session;
        self
    }

    /// Adds a header to every request.
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// The session every request carries.
    pub const fn session_handle(&self) -> &Session {
        &self.session
    }

    /// A GET request. `url` may carry a query string.
    pub fn get(&self, url: &str) -> AdminRequest {
        self.builder(Method::GET, url).build()
    }

    /// An ajax GET request.
    pub fn get_ajax(&self, url: &str) -> AdminRequest {
        self.builder(Method::GET, url).ajax().build()
    }

    /// A POST request with an urlencoded form body.
    pub fn post<K: AsRef<str>, V: AsRef<str>>(&self, url: &str, form: &[(K, V)]) -> AdminRequest {
        self.builder(Method::POST, url).form(form).build()
    }

    /// An ajax POST request with an urlencoded form body.
    pub fn post_ajax<K: AsRef<str>, V: AsRef<str>>(&self, url: &str, form: &[(K, V)]) -> AdminRequest {
        self.builder(Method::POST, url).form(form).ajax().build()
    }

    /// A request with any method and no body.
    pub fn request(&self, method: Method, url: &str) -> AdminRequest {
        self.builder(method, url).build()
    }

    fn builder(&self, method: Method, url: &str) -> AdminRequestBuilder {
        let (path, query) = url.split_once('?').unwrap_or((url, ""));
        let mut builder = AdminRequest::builder()
            .method(method)
            .path(path)
            .query_string(query)
            .user(self.user.clone())
            .session(self.session.clone());
        for (name, value) in &self.headers {
            builder = builder.header(name, value);
        }
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_parses_form() {
        let request = RequestFactory::new().post("/xadmin/login/", &[("username", "admin")]);
        assert_eq!(request.method_name(), "post");
        assert_eq!(request.post().get("username"), Some("admin"));
    }

    #[test]
    fn test_requests_share_session() {
        let factory = RequestFactory::new();
        factory.get("/a/").session().set("k", 1);
        assert_eq!(factory.get("/b/").session().get("k"), Some(serde_json::json!(1)));
    }

    #[test]
    fn test_get_ajax_sets_header() {
        assert!(RequestFactory::new().get_ajax("/x/").is_ajax());
    }
}
