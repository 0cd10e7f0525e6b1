//! Logging integration.
//!
//! Provides helpers for configuring [`tracing`]-based logging from
//! [`AdminSettings`] and for creating per-request spans.

use crate::settings::AdminSettings;

/// Sets up the global tracing subscriber based on the given settings.
///
/// `RUST_LOG`, when set, wins over `settings.log_level`. In debug mode a
/// pretty, human-readable format is used; otherwise structured JSON.
/// Calling this twice is harmless: the second install is ignored.
pub fn setup_logging(settings: &AdminSettings) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if settings.debug {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .pretty()
            .try_init()
            .ok();
    } else {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .try_init()
            .ok();
    }
}

/// Creates a tracing span for one admin request.
///
/// # Examples
///
/// ```
/// use xadmin_rs_core::logging::request_span;
///
/// let span = request_span("abc-123", "GET", "/xadmin/blog/article/");
/// let _guard = span.enter();
/// tracing::info!("handling request");
/// ```
pub fn request_span(request_id: &str, method: &str, path: &str) -> tracing::Span {
    tracing::info_span!("admin_request", id = request_id, method = method, path = path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_logging_twice_does_not_panic() {
        let settings = AdminSettings::default();
        setup_logging(&settings);
        setup_logging(&settings);
    }

    #[test]
    fn test_request_span_enters() {
        let span = request_span("id-1", "POST", "/xadmin/");
        let _guard = span.enter();
        tracing::debug!("inside span");
    }
}
