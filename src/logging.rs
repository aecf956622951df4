use tracing_subscriber::EnvFilter;

use crate::error::{ReportError, Result};

const DEFAULT_FILTER: &str = "info";

/// Installs the global subscriber: human-readable events on stdout, filtered
/// by `RUST_LOG` (default `info`).
pub fn init() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stdout)
        .with_target(false)
        .try_init()
        .map_err(|err| ReportError::Logging(err.to_string()))
}
