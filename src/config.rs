//! Configuration loader
//!
//! Settings are merged from defaults, an optional TOML file and prefixed
//! environment variables, later sources overriding earlier ones.

use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::bus::BusConfiguration;
use crate::logging::LoggingConfig;

/// Default environment prefix; `BUS__BUS__TOPIC_PATH` sets `bus.topic_path`.
pub const CONFIG_ENV_PREFIX: &str = "BUS";

/// Top-level settings of a bus host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub bus: BusConfiguration,
    pub logging: LoggingConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to extract configuration: {0}")]
    Extract(#[from] Box<figment::Error>),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Extract(Box::new(err))
    }
}

/// Configuration loader service
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
    env_prefix: String,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            config_path: None,
            env_prefix: CONFIG_ENV_PREFIX.to_string(),
        }
    }

    pub fn with_config_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_env_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Load configuration from all sources
    ///
    /// Merge order (later sources override earlier):
    /// 1. `Settings::default()`
    /// 2. TOML configuration file, if set and present
    /// 3. Environment variables `{prefix}__SECTION__KEY`
    pub fn load(&self) -> Result<Settings, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(Settings::default()));

        if let Some(path) = &self.config_path {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
                info!("Configuration loaded from {}", path.display());
            } else {
                warn!("Configuration file not found: {}", path.display());
            }
        }

        figment = figment.merge(Env::prefixed(&format!("{}__", self.env_prefix)).split("__"));

        let settings: Settings = figment.extract()?;
        validate_settings(&settings)?;
        Ok(settings)
    }
}

fn validate_settings(settings: &Settings) -> Result<(), ConfigError> {
    let bus = &settings.bus;
    for (field, value) in [
        ("bus.transport", &bus.transport),
        ("bus.topic_path", &bus.topic_path),
        ("bus.subscription_name", &bus.subscription_name),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::Invalid(format!("{} cannot be empty", field)));
        }
    }
    crate::logging::parse_log_level(&settings.logging.level)
        .map_err(|e| ConfigError::Invalid(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::ReceiveMode;
    use std::io::Write;

    #[test]
    fn defaults_without_sources() {
        let settings = ConfigLoader::new()
            .with_env_prefix("BUS_TEST_DEFAULTS")
            .load()
            .unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn toml_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[bus]\ntopic_path = \"orders\"\nreceive_mode = \"receive_and_delete\"\n\n[logging]\nlevel = \"debug\""
        )
        .unwrap();

        let settings = ConfigLoader::new()
            .with_config_path(file.path())
            .with_env_prefix("BUS_TEST_TOML")
            .load()
            .unwrap();
        assert_eq!(settings.bus.topic_path, "orders");
        assert_eq!(settings.bus.subscription_name, "default");
        assert_eq!(settings.bus.receive_mode, ReceiveMode::ReceiveAndDelete);
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    fn env_overrides_file() {
        std::env::set_var("BUS_TEST_ENV__BUS__SUBSCRIPTION_NAME", "audit");
        let settings = ConfigLoader::new()
            .with_env_prefix("BUS_TEST_ENV")
            .load()
            .unwrap();
        std::env::remove_var("BUS_TEST_ENV__BUS__SUBSCRIPTION_NAME");

        assert_eq!(settings.bus.subscription_name, "audit");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let settings = ConfigLoader::new()
            .with_config_path("/nonexistent/bus.toml")
            .with_env_prefix("BUS_TEST_MISSING")
            .load()
            .unwrap();
        assert_eq!(settings.bus.topic_path, "bus");
    }

    #[test]
    fn empty_topic_is_rejected() {
        std::env::set_var("BUS_TEST_EMPTY__BUS__TOPIC_PATH", " ");
        let result = ConfigLoader::new().with_env_prefix("BUS_TEST_EMPTY").load();
        std::env::remove_var("BUS_TEST_EMPTY__BUS__TOPIC_PATH");

        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
