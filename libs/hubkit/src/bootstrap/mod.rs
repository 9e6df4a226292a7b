//! Process bootstrap helpers for hub binaries.
//!
//! Only logging lives here: a global `tracing` subscriber configured from
//! [`LoggingConfig`], written to stderr. `RUST_LOG` wins over the configured
//! directive.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

/// Build the filter: `RUST_LOG` if set and valid, otherwise `cfg.level`.
///
/// # Errors
/// Returns an error if `cfg.level` is not a valid filter directive.
pub fn env_filter(cfg: &LoggingConfig) -> anyhow::Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&cfg.level)
        .map_err(|e| anyhow::anyhow!("invalid log level '{}': {e}", cfg.level))
}

/// Install the global subscriber.
///
/// # Errors
/// Fails on an invalid directive or if a global subscriber is already set.
pub fn init_logging(cfg: &LoggingConfig) -> anyhow::Result<()> {
    let filter = env_filter(cfg)?;
    let registry = tracing_subscriber::registry().with(filter);
    let installed = if cfg.json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;
    tracing::debug!(level = %cfg.level, json = cfg.json, "logging initialized");
    Ok(())
}
