//! Process-wide tracing setup.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the global tracing subscriber: compact fmt output filtered
/// by `RUST_LOG` (default `info`), with `log::` records bridged in so
/// the db layer shares the same output.
///
/// Idempotent: repeated calls (e.g. from tests) are no-ops.
pub fn init_tracing() {
    let _ = tracing_log::LogTracer::init();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}
