//! Process-wide tracing setup.

use crate::tracing_layer::ExchangeEventLayer;
use talktab_core::config::{LogFormat, LoggingConfig};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// Builds the log filter. `RUST_LOG` wins over the configured level.
pub fn build_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber: a text or JSON formatter on stderr,
/// filtered by [`build_filter`], plus the optional exchange-event layer.
///
/// The event layer is not subject to the log filter, so the interactive
/// front end sees tool activity even when logging is quiet.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(
    config: &LoggingConfig,
    events: Option<ExchangeEventLayer>,
) -> Result<(), TryInitError> {
    let filter = build_filter(config);
    let registry = tracing_subscriber::registry().with(events);

    match config.format {
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_filter(filter),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(true)
                    .with_filter(filter),
            )
            .try_init(),
    }
}
