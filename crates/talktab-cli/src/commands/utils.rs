use anyhow::{Context, Result};
use std::path::PathBuf;

use talktab_core::config::RootConfig;
use talktab_execution::{ExchangeEventLayer, init_tracing};
use talktab_infrastructure::{ConfigService, ConfigSource};

/// Loads configuration and installs logging.
///
/// Logging is set up after the config is read, so a config error is
/// reported by `main` rather than through tracing.
pub fn bootstrap(
    config_path: Option<PathBuf>,
    events: Option<ExchangeEventLayer>,
) -> Result<RootConfig> {
    let (config, source) = ConfigService::new(config_path)
        .load()
        .context("Failed to load configuration")?;

    init_tracing(&config.logging, events).context("Failed to initialize logging")?;

    match source {
        ConfigSource::File(path) => {
            tracing::debug!(path = %path.display(), environment = ?config.environment, "Loaded configuration")
        }
        ConfigSource::Defaults => {
            tracing::debug!(environment = ?config.environment, "No config file found; using defaults")
        }
    }

    Ok(config)
}
