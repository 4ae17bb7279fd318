//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

#[derive(thiserror::Error, Debug)]
#[error("invalid log filter {filter:?}: {message}")]
pub struct LogFilterError {
    pub filter: String,
    pub message: String,
}

/// Install a global fmt subscriber.
///
/// `RUST_LOG` wins over `filter` when set. Returns `Ok(false)` if a global
/// subscriber was already installed, so repeated calls are harmless.
pub fn init_logging(filter: &str) -> Result<bool, LogFilterError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(env_filter) => env_filter,
        Err(_) => EnvFilter::try_new(filter).map_err(|e| LogFilterError {
            filter: filter.to_string(),
            message: e.to_string(),
        })?,
    };

    let installed = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(filter, "logging initialized");
    }
    Ok(installed)
}
