//! Serving an [`AdminSite`] with axum.
//!
//! Views are synchronous, so each request runs on tokio's blocking pool.
//! Sessions live in memory and are keyed by the `xadmin_sessionid` cookie.
//!
//! ```no_run
//! use std::sync::Arc;
//! use xadmin_rs_admin::{server, AdminSite, RegistryBuilder};
//! use xadmin_rs_core::AdminSettings;
//!
//! # async fn run() -> std::io::Result<()> {
//! let registry = RegistryBuilder::with_defaults().unwrap().build();
//! let site = Arc::new(AdminSite::new(registry, AdminSettings::default()));
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8000").await?;
//! axum::serve(listener, server::router(site)).await
//! # }
//! ```

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use http_body_util::BodyExt;
use tower_http::trace::TraceLayer;
use xadmin_rs_core::logging::request_span;
use xadmin_rs_http::session::SESSION_COOKIE_NAME;
use xadmin_rs_http::{AdminRequest, SessionStore};

use crate::site::AdminSite;

/// Shared state of the router.
#[derive(Debug, Clone)]
pub struct ServerState {
    pub site: Arc<AdminSite>,
    pub sessions: SessionStore,
}

/// A router serving `site` under its URL prefix.
pub fn router(site: Arc<AdminSite>) -> Router {
    router_with_sessions(site, SessionStore::new())
}

/// Like [`router`], sharing an existing session store.
pub fn router_with_sessions(site: Arc<AdminSite>, sessions: SessionStore) -> Router {
    let prefix = site.settings().normalized_prefix();
    let state = ServerState { site, sessions };
    let mut router = Router::new().route(&format!("{prefix}{{*rest}}"), any(serve));
    router = router.route(&prefix, any(serve));
    let bare = prefix.trim_end_matches('/');
    if !bare.is_empty() {
        router = router.route(bare, any(serve));
    }
    router.layer(TraceLayer::new_for_http()).with_state(state)
}

fn session_key(request: &Request) -> Option<String> {
    request
        .headers()
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE_NAME)
        .map(|(_, value)| value.to_string())
}

async fn serve(State(state): State<ServerState>, request: Request) -> Response {
    let cookie = session_key(&request);
    let (parts, body) = request.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    let (session_id, session) = state.sessions.load(cookie.as_deref());
    let mut admin_request = AdminRequest::from_parts(&parts, body.to_vec());
    admin_request.set_session(session);

    let request_id = uuid::Uuid::new_v4().to_string();
    let span = request_span(&request_id, parts.method.as_str(), parts.uri.path());
    let site = Arc::clone(&state.site);
    let rendered = tokio::task::spawn_blocking(move || {
        let _guard = span.enter();
        let user = site.load_user(&admin_request);
        admin_request.set_user(user);
        let response = site.handle(admin_request);
        tracing::debug!(status = response.status_code(), "handled");
        site.render(response)
    })
    .await;

    let mut response = match rendered {
        Ok(Ok(response)) => response.map(Body::from).into_response(),
        Ok(Err(e)) => {
            tracing::error!(request = %request_id, error = %e, "could not render response");
            (StatusCode::INTERNAL_SERVER_ERROR, "500 Internal Server Error").into_response()
        }
        Err(e) => {
            tracing::error!(request = %request_id, error = %e, "admin view panicked");
            (StatusCode::INTERNAL_SERVER_ERROR, "500 Internal Server Error").into_response()
        }
    };

    if cookie.as_deref() != Some(session_id.as_str()) {
        let path = state.site.settings().normalized_prefix();
        let value = format!("{SESSION_COOKIE_NAME}={session_id}; Path={path}; HttpOnly; SameSite=Lax");
        if let Ok(value) = HeaderValue::from_str(&value) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_key_from_cookie_header() {
        let request = Request::builder()
            .header(header::COOKIE, "theme=dark; xadmin_sessionid=abc123")
            .body(Body::empty())
            .unwrap();
        assert_eq!(session_key(&request).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_session_key_missing() {
        let request = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(session_key(&request), None);
    }
}
