//! Logging integration for switchyard.
//!
//! Provides helpers for configuring [`tracing`]-based logging from
//! [`Settings`](crate::settings::Settings) and for creating per-recognition spans.

use crate::settings::Settings;

/// Sets up the global tracing subscriber based on the given settings.
///
/// The log level is read from `settings.log_level` (e.g. "debug", "info", "warn",
/// "error"). In debug mode a pretty, human-readable format is used; otherwise a
/// structured JSON format is used. Installing a second subscriber is a no-op.
pub fn setup_logging(settings: &Settings) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if settings.debug {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
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

/// Creates a tracing span for one recognition attempt.
///
/// # Examples
///
/// ```
/// use switchyard_core::logging::recognition_span;
///
/// let span = recognition_span("GET", "/projects/1");
/// let _guard = span.enter();
/// tracing::debug!("recognizing");
/// ```
pub fn recognition_span(method: &str, path: &str) -> tracing::Span {
    tracing::info_span!("recognize", method = method, path = path)
}

/// Creates a tracing span for one URL generation.
pub fn generation_span(route: Option<&str>) -> tracing::Span {
    tracing::debug_span!("url_for", route = route.unwrap_or("<unnamed>"))
}
