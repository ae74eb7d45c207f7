//! Logging setup and event helpers shared by the harness

use chrono::{DateTime, Utc};
use tracing::{error, info};

/// Filter used when `RUST_LOG` is not set
pub fn default_filter(log_level: Option<&str>) -> String {
    let base_level = log_level.unwrap_or("info");
    format!("cdc_tester={base_level},shared={base_level},sqlx=warn")
}

/// Initialize the stdout tracing subscriber.
///
/// `RUST_LOG` wins over `log_level` when present.
pub fn init_tracing(log_level: Option<&str>) {
    use tracing_subscriber::{EnvFilter, fmt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(log_level)));

    fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Get formatted timestamp for consistent logging
pub fn format_timestamp() -> String {
    let now: DateTime<Utc> = Utc::now();
    now.format("%H:%M:%S%.3f").to_string()
}

pub fn log_startup(component: &str, details: &str) {
    info!(
        component,
        timestamp = format_timestamp(),
        "🚀 Starting {}",
        details
    );
}

pub fn log_shutdown(component: &str, reason: &str) {
    info!(
        component,
        timestamp = format_timestamp(),
        "🛑 Shutting down: {}",
        reason
    );
}

pub fn log_error(component: &str, context: &str, error: &dyn std::fmt::Display) {
    error!(
        component,
        timestamp = format_timestamp(),
        error = %error,
        "❌ {} failed: {}",
        context,
        error
    );
}

pub fn log_success(component: &str, message: &str) {
    info!(
        component,
        timestamp = format_timestamp(),
        "✅ {}",
        message
    );
}

pub fn log_progress(component: &str, action: &str, details: &str) {
    info!(
        component,
        timestamp = format_timestamp(),
        "📋 {}: {}",
        action,
        details
    );
}
