//! Structured logging configuration.
//!
//! Records from the engine go through the `log` facade and reach the
//! subscriber through the `tracing-log` bridge.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging
///
/// Levels come from `RUST_LOG`; without it everything at `info` and above
/// is shown.
///
/// # Example
///
/// ```no_run
/// logging::init();
/// tracing::info!("Runner starting");
/// ```
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_file(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::debug!("Logging initialized");
}

/// Log how long a step took, warning about slow ones.
///
/// # Arguments
///
/// * `operation` - Step name
/// * `duration_ms` - Duration in milliseconds
/// * `detail` - Additional detail, such as a count of heats
pub fn log_performance(operation: &str, duration_ms: u64, detail: Option<&str>) {
    if duration_ms > 1000 {
        tracing::warn!(
            operation = operation,
            duration_ms = duration_ms,
            detail = detail,
            "PERFORMANCE: Slow operation"
        );
    } else {
        tracing::debug!(
            operation = operation,
            duration_ms = duration_ms,
            detail = detail,
            "Performance metric"
        );
    }
}
