//! Structured logging configuration.
//!
//! Thin wrapper around `tracing-subscriber` so binaries and tests can enable
//! structured output with one call. The filter honors `RUST_LOG`, falling
//! back to the provided default directive.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// Safe to call more than once; subsequent calls are no-ops.
pub fn init(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

/// Initialize with the crate's standard default level.
pub fn init_default() {
    init("netron_protocol=info");
}
