//! Configuration file parsing and structures.
//!
//! devolod uses TOML for declarative configuration. Each native integration owns a
//! statically typed section under `[integrations]`; a missing section leaves the
//! integration disabled.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::filter::Targets;

/// Top-level configuration structure
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,

    /// HTTP API, disabled when the section is absent
    #[serde(default)]
    pub api: Option<ApiConfig>,

    #[serde(default)]
    pub integrations: IntegrationsConfig,
}

#[derive(
    Debug,
    Default,
    Deserialize,
    Serialize,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default)]
    pub level: LogLevel,

    /// Per-target levels, e.g. `"devolod::integrations::devolo" = "debug"`
    #[serde(default)]
    pub overrides: HashMap<String, LogLevel>,
}

impl LoggingConfig {
    /// Build the subscriber filter: the default level plus per-target overrides
    pub fn filter(&self) -> Targets {
        Targets::new()
            .with_default(LevelFilter::from(self.level))
            .with_targets(
                self.overrides
                    .iter()
                    .map(|(target, level)| (target.clone(), LevelFilter::from(*level))),
            )
    }
}

fn default_listen() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8565
}

/// Native HTTP API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Integration configuration container
#[derive(Debug, Default, Deserialize)]
pub struct IntegrationsConfig {
    /// devolo Home Control gateway
    #[cfg(feature = "integration_devolo")]
    #[serde(default)]
    pub devolo: Option<crate::integrations::devolo::DevoloConfig>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(path.as_ref().to_path_buf(), e))?;

        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(ConfigError::Parse)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.logging.level, LogLevel::Info);
        assert!(config.api.is_none());
    }

    #[test]
    fn test_parse_logging_and_api() {
        let toml = r#"
            [logging]
            level = "debug"
            overrides = { "devolod::engine" = "trace" }

            [api]
            port = 9000
        "#;

        let config = Config::from_toml(toml).unwrap();
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(
            config.logging.overrides.get("devolod::engine"),
            Some(&LogLevel::Trace)
        );

        let api = config.api.unwrap();
        assert_eq!(api.listen, "127.0.0.1");
        assert_eq!(api.port, 9000);
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let result = Config::from_toml("[logging]\nlevel = \"loud\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[cfg(feature = "integration_devolo")]
    #[test]
    fn test_parse_devolo_integration() {
        let toml = r#"
            [integrations.devolo]
            gateway_id = "1409301750000598"

            [[integrations.devolo.devices]]
            uid = "hdm:ZWave:CBC56091/24"
            item_name = "Front door"
            zone = "Hall"

            [[integrations.devolo.devices.binary_sensors]]
            element_uid = "devolo.BinarySensor:hdm:ZWave:CBC56091/24"
            sensor_type = "door"
        "#;

        let config = Config::from_toml(toml).unwrap();
        let devolo = config.integrations.devolo.unwrap();
        assert_eq!(devolo.gateway_id, "1409301750000598");
        assert_eq!(devolo.devices.len(), 1);

        let device = &devolo.devices[0];
        assert_eq!(device.brand, "devolo");
        assert!(device.online);
        assert_eq!(device.binary_sensors[0].sub_type, "");
        assert!(!device.binary_sensors[0].state);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devolod.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[logging]\nlevel = \"warn\"").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.logging.level, LogLevel::Warn);
    }

    #[test]
    fn test_from_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::from_file(dir.path().join("missing.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_, _))));
    }
}
