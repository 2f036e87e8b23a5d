//! Startup error types.

use thiserror::Error;

/// Errors raised while resolving or validating configuration.
///
/// These surface once, at application start. Nothing on the request path
/// returns a `ConfigError`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("app_name must not be empty")]
    EmptyAppName,

    #[error("logging.level '{0}' is invalid, expected one of trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("statsd.host must not be empty")]
    InvalidHost,

    #[error("statsd.port must be between 1 and 65535")]
    InvalidPort,

    #[error("statsd.rate must be within [0, 1], got {0}")]
    InvalidRate(f64),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Load(Box::new(err))
    }
}
