//! Telemetry helpers for structured logging and tracing.

use tracing_subscriber::EnvFilter;

/// Initialize tracing with an `info` default. `RUST_LOG` overrides it.
pub fn init_tracing() {
    init_tracing_with("info");
}

/// Initialize tracing with `default_filter` unless `RUST_LOG` is set.
///
/// Users can install their own subscriber; this helper only installs a fmt
/// subscriber if none is set. Thread names are included so work running on
/// pool threads (`pl-worker-*`, `pl-ep-*`) is distinguishable from the
/// scheduler.
pub fn init_tracing_with(default_filter: &str) {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .try_init();
}
