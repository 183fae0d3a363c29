//! Telemetry helpers for structured logging and tracing.

use tracing_subscriber::EnvFilter;

/// Directive used when `RUST_LOG` is unset or unparsable: engine lifecycle
/// events at info, everything else at warn.
pub const DEFAULT_LOG_DIRECTIVE: &str = "warn,prometheus_scheduler=info";

/// Install an fmt subscriber for the engine unless one is already set.
///
/// Worker and dispatch threads are named after their pool, so thread names
/// are included in every line.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVE));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .with_target(false)
        .try_init();
}
