//! Logging and tracing configuration
//!
//! The engine itself only emits `tracing` events; initializing a subscriber
//! is left to the embedding runner. These helpers cover the common case of
//! a test binary or example that wants readable output quickly.

use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Initialize tracing with a compact stdout layer.
///
/// Log level is controlled by the `RUST_LOG` environment variable.
/// Default level is INFO for this crate, WARN for dependencies.
pub fn init() {
    init_with_filter("testflow=info,warn");
}

/// Initialize tracing with an explicit default filter directive.
///
/// `RUST_LOG` still takes precedence when set. Safe to call from multiple
/// tests; only the first subscriber wins.
pub fn init_with_filter(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init();
}
