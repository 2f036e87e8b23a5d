use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How request handler metrics are named.
///
/// One strategy per deployment; the two never mix.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum NamingStrategy {
    /// `request_handlers.<endpoint>.<status>`, using the name given to the
    /// route with [`crate::metrics::named`].
    #[default]
    Endpoint,
    /// `request_handlers.<decoded-path>.<status>`, derived from the raw
    /// request path of a matched route.
    Path,
}

/// Statsd settings for one application instance.
///
/// Resolved once at startup and never mutated afterwards. Every field can be
/// overridden through a `STATSD_<FIELD>` environment variable.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, JsonSchema)]
pub struct StatsdConfig {
    /// When false, no middleware is installed and no request metrics exist.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Prepended by the statsd client to every metric it sends.
    #[serde(default)]
    pub prefix: Option<String>,
    /// Default sampling rate. Zero mutes request handler metrics.
    #[serde(default = "default_rate")]
    pub rate: f64,
    #[serde(default)]
    pub naming: NamingStrategy,
}

impl Default for StatsdConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            host: default_host(),
            port: default_port(),
            prefix: None,
            rate: default_rate(),
            naming: NamingStrategy::default(),
        }
    }
}

impl StatsdConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::InvalidHost);
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if !self.rate.is_finite() || !(0.0..=1.0).contains(&self.rate) {
            return Err(ConfigError::InvalidRate(self.rate));
        }
        Ok(())
    }

    /// The prefix handed to the statsd client, empty when unset.
    pub fn client_prefix(&self) -> &str {
        self.prefix.as_deref().unwrap_or("")
    }
}

fn default_enabled() -> bool {
    true
}

fn default_host() -> String {
    "localhost".into()
}

fn default_port() -> u16 {
    cadence::DEFAULT_PORT
}

fn default_rate() -> f64 {
    1.0
}
