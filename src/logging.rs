//! Diagnostic logging setup.
//!
//! Diagnostics go to stderr; stdout is reserved for the run summary. Worker
//! output never passes through here, it is captured in per-item log files.

use tracing_subscriber::EnvFilter;

/// Initialize the global subscriber. `RUST_LOG` wins when set; otherwise
/// `verbose` selects debug-level output for this crate.
pub fn init(verbose: bool) {
    let default_filter = if verbose { "modrun=debug" } else { "modrun=info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
