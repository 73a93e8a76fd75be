//! Embedded chat page.
//!
//! A single self-contained HTML file with inline CSS and JavaScript: the
//! transcript on top, the input box below it, and the evidence table under
//! the conversation. It talks to the same server it is served from.

/// The complete chat page, embedded at compile time.
///
/// ```rust,ignore
/// use intel_ui::dashboard::DASHBOARD_HTML;
///
/// async fn ui_handler() -> axum::response::Html<&'static str> {
///     axum::response::Html(DASHBOARD_HTML)
/// }
/// ```
pub const DASHBOARD_HTML: &str = include_str!("../assets/dashboard.html");
