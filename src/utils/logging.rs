//! Structured logging configuration.
//!
//! Thin wrapper over `tracing-subscriber` driven by [`LoggingConfig`].
//! Initialization is idempotent; repeat calls after the first are ignored so
//! tests and embedding hosts can both call it freely.

use crate::config::LoggingConfig;
use crate::error::{ProtocolError, Result};
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber according to the configuration.
///
/// The `RUST_LOG` environment variable overrides the configured level when
/// set. Returns an error only for an invalid filter expression; a subscriber
/// already being installed is not treated as a failure.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.to_string()))
        .map_err(|e| ProtocolError::ConfigError(format!("Invalid log filter: {e}")))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let result = if config.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    // A second init (e.g. from tests) is fine; keep the first subscriber.
    let _ = result;
    Ok(())
}
