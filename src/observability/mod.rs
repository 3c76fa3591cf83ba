//! Logging setup and load metrics.

pub mod metrics;

pub use metrics::{LoaderMetrics, LoaderMetricsSnapshot};

use crate::config::Config;
use tracing_subscriber::EnvFilter;

/// Install a stderr `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise the configured log level is used.
/// Returns `false` if a global subscriber was already installed, which makes
/// repeated calls (e.g. from several tests) harmless.
pub fn init_tracing(config: &Config) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("error"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
