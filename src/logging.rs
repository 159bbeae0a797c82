//! Diagnostic tracing for embedders and tests.
//!
//! Run events are the product output of this crate and never go through
//! here. This module only wires `tracing` output to stderr.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "warn";

fn subscriber() -> impl SubscriberInitExt {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
}

/// Install the global subscriber.
///
/// Reads `RUST_LOG`, defaulting to `warn`. Panics if a global subscriber is
/// already set.
///
/// ```bash
/// RUST_LOG=warband=debug my-server
/// ```
pub fn init() {
    subscriber().init();
}

/// Install the global subscriber unless one is already set.
///
/// Returns whether this call installed it.
pub fn try_init() -> bool {
    subscriber().try_init().is_ok()
}
