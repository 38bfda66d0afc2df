//! JSON log pipeline.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

/// Per-statement sqlx logging is noisy at `info`; keep it at `warn` unless
/// `RUST_LOG` says otherwise.
const QUIET_DIRECTIVES: &[&str] = &["sqlx::query=warn", "tower_http=info"];

/// Filter directives used when `RUST_LOG` is unset.
pub fn default_directives(level: &str) -> String {
    let level = level.trim();
    let level = if level.is_empty() { "info" } else { level };

    let mut directives = vec![level];
    directives.extend_from_slice(QUIET_DIRECTIVES);
    directives.join(",")
}

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directives(default_level)))
        .unwrap_or_else(|_| EnvFilter::new(default_directives("info")))
}

/// Initialize JSON logging for the process.
///
/// Instrumented spans (repository calls, token checks) emit a close event
/// carrying their duration. Safe to call multiple times.
pub fn init(default_level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(default_level))
        .json()
        .with_current_span(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}
