//! The inbound request.
//!
//! [`AdminRequest`] carries exactly what the admin views read: the method,
//! the path, GET and POST parameters, headers, the authenticated principal,
//! and the session handle.

use http::{HeaderMap, Method};
use xadmin_rs_auth::AdminUser;

use crate::querydict::QueryDict;
use crate::session::Session;

/// An HTTP request as seen by admin views.
///
/// # Examples
///
/// ```
/// use xadmin_rs_http::AdminRequest;
///
/// let request = AdminRequest::builder()
///     .method(http::Method::GET)
///     .path("/xadmin/blog/article/")
///     .query_string("p=2&o=-title")
///     .build();
///
/// assert_eq!(request.method_name(), "get");
/// assert_eq!(request.get().get("p"), Some("2"));
/// assert_eq!(request.get_full_path(), "/xadmin/blog/article/?p=2&o=-title");
/// assert!(!request.user().is_authenticated());
/// ```
#[derive(Debug, Clone)]
pub struct AdminRequest {
    method: Method,
    path: String,
    query_string: String,
    get: QueryDict,
    post: QueryDict,
    headers: HeaderMap,
    body: Vec<u8>,
    user: AdminUser,
    session: Session,
    remote_addr: Option<String>,
}

impl AdminRequest {
    /// Starts building a request.
    pub fn builder() -> AdminRequestBuilder {
        AdminRequestBuilder::default()
    }

    /// Builds a request from `http` parts and the collected body. The user
    /// is anonymous and the session fresh until the caller attaches them.
    pub fn from_parts(parts: &http::request::Parts, body: Vec<u8>) -> Self {
        let mut builder = Self::builder()
            .method(parts.method.clone())
            .path(parts.uri.path())
            .query_string(parts.uri.query().unwrap_or(""))
            .body(body);
        builder.headers = parts.headers.clone();
        builder.build()
    }

    /// The HTTP method.
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// The lowercased method name (`"get"`, `"post"`, ...).
    pub fn method_name(&self) -> String {
        self.method.as_str().to_ascii_lowercase()
    }

    /// The request path without the query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The raw query string.
    pub fn query_string(&self) -> &str {
        &self.query_string
    }

    /// The path followed by `?` and the query string, when there is one.
    pub fn get_full_path(&self) -> String {
        if self.query_string.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.query_string)
        }
    }

    /// Query parameters.
    pub const fn get(&self) -> &QueryDict {
        &self.get
    }

    /// Urlencoded form parameters.
    pub const fn post(&self) -> &QueryDict {
        &self.post
    }

    /// Request headers.
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a header value as a string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Raw body bytes.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Returns `true` for `XMLHttpRequest` requests.
    pub fn is_ajax(&self) -> bool {
        self.header("x-requested-with") == Some("XMLHttpRequest")
    }

    /// The authenticated principal, or the anonymous user.
    pub const fn user(&self) -> &AdminUser {
        &self.user
    }

    /// Replaces the principal, e.g. after login.
    pub fn set_user(&mut self, user: AdminUser) {
        self.user = user;
    }

    /// The session handle.
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Replaces the session handle.
    pub fn set_session(&mut self, session: Session) {
        self.session = session;
    }

    /// The client address, when the server knows it.
    pub fn remote_addr(&self) -> Option<&str> {
        self.remote_addr.as_deref()
    }

    /// Returns a copy of this request with a different path, keeping
    /// everything else.
    #[must_use]
    pub fn with_path(&self, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..self.clone()
        }
    }
}

/// Builder for [`AdminRequest`].
#[derive(Debug)]
pub struct AdminRequestBuilder {
    method: Method,
    path: String,
    query_string: String,
    content_type: Option<String>,
    headers: HeaderMap,
    body: Vec<u8>,
    user: AdminUser,
    session: Option<Session>,
    remote_addr: Option<String>,
}

impl Default for AdminRequestBuilder {
    fn default() -> Self {
        Self {
            method: Method::GET,
            path: "/".to_string(),
            query_string: String::new(),
            content_type: None,
            headers: HeaderMap::new(),
            body: Vec::new(),
            user: AdminUser::anonymous(),
            session: None,
            remote_addr: None,
        }
    }
}

impl AdminRequestBuilder {
    /// Sets the method.
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Sets the path.
    #[must_use]
    pub fn path(mut self, path: &str) -> Self {
        self.path = path.to_string();
        self
    }

    /// Sets the query string (without the leading `?`).
    #[must_use]
    pub fn query_string(mut self, qs: &str) -> Self {
        self.query_string = qs.trim_start_matches('?').to_string();
        self
    }

    /// Sets the content type.
    #[must_use]
    pub fn content_type(mut self, ct: &str) -> Self {
        self.content_type = Some(ct.to_string());
        self
    }

    /// Adds a header. Invalid names or values are ignored.
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            http::header::HeaderName::from_bytes(name.as_bytes()),
            http::header::HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Sets the raw body.
    #[must_use]
    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Sets an urlencoded form body.
    #[must_use]
    pub fn form<K: AsRef<str>, V: AsRef<str>>(mut self, pairs: &[(K, V)]) -> Self {
        let mut qd = QueryDict::new_mutable();
        for (k, v) in pairs {
            // A fresh mutable QueryDict never rejects appends.
            let _ = qd.append(k.as_ref(), v.as_ref());
        }
        self.body = qd.urlencode().into_bytes();
        self.content_type = Some("application/x-www-form-urlencoded".to_string());
        self
    }

    /// Marks the request as an `XMLHttpRequest`.
    #[must_use]
    pub fn ajax(self) -> Self {
        self.header("X-Requested-With", "XMLHttpRequest")
    }

    /// Sets the principal.
    #[must_use]
    pub fn user(mut self, user: AdminUser) -> Self {
        self.user = user;
        self
    }

    /// Shares an existing session.
    #[must_use]
    pub fn session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    /// Sets the client address.
    #[must_use]
    pub fn remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = Some(addr.into());
        self
    }

    /// Builds the request, parsing the body as form data when the content
    /// type says so.
    pub fn build(mut self) -> AdminRequest {
        if let Some(ct) = &self.content_type {
            if let Ok(value) = http::header::HeaderValue::from_str(ct) {
                self.headers.insert(http::header::CONTENT_TYPE, value);
            }
        }
        let is_form = self
            .headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));
        let post = if is_form {
            QueryDict::parse(&String::from_utf8_lossy(&self.body))
        } else {
            QueryDict::new()
        };
        AdminRequest {
            get: QueryDict::parse(&self.query_string),
            post,
            method: self.method,
            path: self.path,
            query_string: self.query_string,
            headers: self.headers,
            body: self.body,
            user: self.user,
            session: self.session.unwrap_or_default(),
            remote_addr: self.remote_addr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_body_is_parsed() {
        let request = AdminRequest::builder()
            .method(Method::POST)
            .form(&[("title", "Hello world"), ("tags", "a&b")])
            .build();
        assert_eq!(request.post().get("title"), Some("Hello world"));
        assert_eq!(request.post().get("tags"), Some("a&b"));
        assert_eq!(request.method_name(), "post");
    }

    #[test]
    fn test_non_form_body_not_parsed() {
        let request = AdminRequest::builder()
            .method(Method::POST)
            .content_type("application/json")
            .body(b"{\"a\":1}".to_vec())
            .build();
        assert!(request.post().is_empty());
        assert_eq!(request.body(), b"{\"a\":1}");
    }

    #[test]
    fn test_ajax_header() {
        let request = AdminRequest::builder().ajax().build();
        assert!(request.is_ajax());
        assert!(!AdminRequest::builder().build().is_ajax());
    }

    #[test]
    fn test_shared_session() {
        let session = Session::new();
        let request = AdminRequest::builder().session(session.clone()).build();
        request.session().set("k", 1);
        assert!(session.contains_key("k"));
    }

    #[test]
    fn test_from_parts() {
        let (parts, ()) = http::Request::builder()
            .method("POST")
            .uri("/xadmin/login/?next=/xadmin/")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(())
            .unwrap()
            .into_parts();
        let request = AdminRequest::from_parts(&parts, b"username=a&password=b".to_vec());
        assert_eq!(request.path(), "/xadmin/login/");
        assert_eq!(request.get().get("next"), Some("/xadmin/"));
        assert_eq!(request.post().get("username"), Some("a"));
    }

    #[test]
    fn test_with_path() {
        let request = AdminRequest::builder().path("/a/").query_string("x=1").build();
        let moved = request.with_path("/b/");
        assert_eq!(moved.get_full_path(), "/b/?x=1");
    }
}
