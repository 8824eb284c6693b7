//! Logging setup
//!
//! The library only emits `tracing` events. Hosts that have no subscriber of
//! their own can call [`init`].

use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install a console subscriber.
///
/// `default_level` is used when `RUST_LOG` is unset (e.g. `"info"` or
/// `"fxchain=debug"`). Returns `false` if a global subscriber was already
/// installed, which is not an error.
pub fn init(default_level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .try_init()
        .is_ok()
}
