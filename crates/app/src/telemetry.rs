//! Console tracing for the server. `RUST_LOG` wins over the defaults.

use tracing_subscriber::EnvFilter;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Default)]
pub struct TracingConfig {
    /// Default to `debug` instead of `info` when `RUST_LOG` is unset.
    pub debug: bool,
}

pub fn init_tracing(config: &TracingConfig) -> Result<()> {
    let default_level = if config.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.debug)
        .compact()
        .try_init()
        .map_err(|err| AppError::Message(format!("init tracing: {err}")))
}
