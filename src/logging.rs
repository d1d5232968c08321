//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Filter from `RUST_LOG` when set, otherwise from `configured`.
pub fn env_filter(configured: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(configured))
}

/// Install the global fmt subscriber writing to stderr. A second call is a
/// no-op, so tests and repeated CLI dispatch can call it freely.
pub fn init(configured: &str) {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(env_filter(configured))
        .with_writer(std::io::stderr)
        .try_init();
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
