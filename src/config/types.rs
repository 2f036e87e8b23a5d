use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use super::logging::LoggingConfig;
use super::statsd::StatsdConfig;
use crate::error::ConfigError;
use crate::utils::logger::level_filter;

/// A top-level enum for versioned configurations.
#[derive(Deserialize, Serialize, JsonSchema)]
#[serde(tag = "version")]
pub enum Config {
    #[serde(rename = "1.0.0")]
    ConfigV1(ConfigV1),
}

/// Main config for v1.0.0.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct ConfigV1 {
    /// Logical application name, the first segment of every metric.
    pub app_name: String,
    pub bind_address: String,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub statsd: StatsdConfig,
}

impl ConfigV1 {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app_name.trim().is_empty() {
            return Err(ConfigError::EmptyAppName);
        }
        if level_filter(&self.logging.level).is_none() {
            return Err(ConfigError::InvalidLogLevel(self.logging.level.clone()));
        }
        self.statsd.validate()
    }
}

/// Layers the YAML file at `path` with `STATSD_*` environment overrides.
///
/// `STATSD_HOST=metrics` lands on `statsd.host`, and so on for every field of
/// [`StatsdConfig`].
pub fn figment(path: &str) -> Figment {
    Figment::new().merge(Yaml::file(path)).merge(
        Env::prefixed("STATSD_").map(|key| format!("statsd.{}", key.as_str()).into()),
    )
}

/// Extracts and validates a configuration from any figment.
pub fn extract(figment: Figment) -> Result<ConfigV1, ConfigError> {
    let config = match figment.extract::<Config>()? {
        Config::ConfigV1(c) => c,
    };
    // handle configuration migration between versions here when necessary
    config.validate()?;
    Ok(config)
}

/// Load config from a YAML file named "config.yaml" in the current directory.
pub fn load_config() -> ConfigV1 {
    match extract(figment("./config.yaml")) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            std::process::exit(1);
        }
    }
}

/// Print the JSON schema for the configuration to stdout.
pub fn print_schema() {
    let schema = schema_for!(Config);
    match serde_json::to_string_pretty(&schema) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error rendering schema: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NamingStrategy;
    use figment::Jail;

    const CONFIG: &str = r#"
version: "1.0.0"
app_name: myapp
bind_address: 127.0.0.1:8080
logging:
  level: debug
  format: json
statsd:
  host: metrics.internal
  prefix: myprefix
  rate: 0.5
"#;

    #[test]
    fn loads_yaml_with_statsd_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file("config.yaml", CONFIG)?;

            let config = extract(figment("config.yaml")).expect("config should load");
            assert_eq!(config.app_name, "myapp");
            assert_eq!(config.logging.level, "debug");
            assert_eq!(config.statsd.host, "metrics.internal");
            assert_eq!(config.statsd.port, 8125);
            assert_eq!(config.statsd.prefix.as_deref(), Some("myprefix"));
            assert_eq!(config.statsd.rate, 0.5);
            assert!(config.statsd.enabled);
            Ok(())
        });
    }

    #[test]
    fn environment_overrides_yaml() {
        Jail::expect_with(|jail| {
            jail.create_file("config.yaml", CONFIG)?;
            jail.set_env("STATSD_HOST", "10.0.0.7");
            jail.set_env("STATSD_PORT", "9125");
            jail.set_env("STATSD_ENABLED", "false");
            jail.set_env("STATSD_NAMING", "path");

            let config = extract(figment("config.yaml")).expect("config should load");
            assert_eq!(config.statsd.host, "10.0.0.7");
            assert_eq!(config.statsd.port, 9125);
            assert!(!config.statsd.enabled);
            assert_eq!(config.statsd.naming, NamingStrategy::Path);
            Ok(())
        });
    }

    #[test]
    fn invalid_rate_fails_at_load() {
        Jail::expect_with(|jail| {
            jail.create_file("config.yaml", CONFIG)?;
            jail.set_env("STATSD_RATE", "2.5");

            let err = extract(figment("config.yaml")).expect_err("rate 2.5 must be rejected");
            assert!(matches!(err, ConfigError::InvalidRate(r) if r == 2.5));
            Ok(())
        });
    }

    #[test]
    fn invalid_log_level_fails_at_load() {
        Jail::expect_with(|jail| {
            jail.create_file("config.yaml", &CONFIG.replace("level: debug", "level: loud"))?;

            let err = extract(figment("config.yaml")).expect_err("level loud must be rejected");
            assert!(matches!(err, ConfigError::InvalidLogLevel(ref l) if l == "loud"));
            Ok(())
        });
    }

    #[test]
    fn statsd_section_is_optional() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                "version: \"1.0.0\"\napp_name: myapp\nbind_address: 127.0.0.1:8080\n",
            )?;

            let config = extract(figment("config.yaml")).expect("config should load");
            assert_eq!(config.statsd, StatsdConfig::default());
            assert_eq!(config.logging.format, "console");
            Ok(())
        });
    }
}
