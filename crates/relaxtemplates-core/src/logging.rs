//! Logging integration.
//!
//! The engine emits [`tracing`] events from its outer layers only (template
//! registration, loading, include resolution). Nothing is printed unless the
//! host installs a subscriber; [`setup_logging`] is a convenience for hosts
//! that want the default one.

use crate::settings::Settings;

/// Installs a global tracing subscriber based on the given settings.
///
/// The filter is read from `settings.log_level`, falling back to `info` when
/// the directive is invalid. Debug mode uses the pretty, human-readable format;
/// otherwise output is structured JSON. Returns `false` if a global subscriber
/// was already installed.
pub fn setup_logging(settings: &Settings) -> bool {
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
            .is_ok()
    } else {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .try_init()
            .is_ok()
    }
}

/// Creates a tracing span covering one named render.
///
/// # Examples
///
/// ```
/// use relaxtemplates_core::logging::render_span;
///
/// let span = render_span("page.html");
/// let _guard = span.enter();
/// tracing::debug!("rendering");
/// ```
pub fn render_span(template: &str) -> tracing::Span {
    tracing::info_span!("render", template = template)
}
