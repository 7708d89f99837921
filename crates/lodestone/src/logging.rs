//! Logging setup.
//!
//! The library only emits `tracing` events. Binaries call [`init`] once to
//! print them.

use tracing_subscriber::EnvFilter;

/// Installs a `fmt` subscriber filtered by `RUST_LOG`, or by
/// `default_filter` (e.g. `"info,lodestone=debug"`) when `RUST_LOG` is unset.
///
/// # Errors
/// Fails if a global subscriber is already installed.
pub fn init(default_filter: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .try_init()
}
