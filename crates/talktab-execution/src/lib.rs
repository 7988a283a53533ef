//! Execution support: logging setup and the exchange-event tracing layer.

pub mod logging;
pub mod tracing_layer;

pub use logging::{build_filter, init_tracing};
pub use tracing_layer::{ExchangeEvent, ExchangeEventLayer};
