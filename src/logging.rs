//! Logging setup.
//!
//! Log lines carry a timestamp, the level and the message. `RUST_LOG` wins over
//! the verbosity flag when set.

use tracing_subscriber::EnvFilter;

/// Filter used without `-v` and without `RUST_LOG`.
pub const DEFAULT_LOG_FILTER: &str = "precision_sort=info";

/// Maps the number of `-v` flags to a filter directive.
pub fn filter_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => DEFAULT_LOG_FILTER,
        1 => "precision_sort=debug",
        _ => "precision_sort=trace",
    }
}

/// Installs the global `tracing` subscriber.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(verbosity: u8) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_for(verbosity)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
}
