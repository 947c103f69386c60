//! Logging initialization

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize structured logging for the process.
///
/// The default output is JSON (the format the replicator has always logged
/// in); set `LOG_FORMAT=pretty` for human-readable output during
/// development. `RUST_LOG` overrides the default `info` level.
pub fn init_logging() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    let registry = tracing_subscriber::registry().with(env_filter);

    let format = std::env::var("LOG_FORMAT").unwrap_or_default();
    match format.to_lowercase().as_str() {
        "pretty" => registry.with(fmt::layer().pretty()).init(),
        _ => registry.with(fmt::layer().json()).init(),
    }
}
