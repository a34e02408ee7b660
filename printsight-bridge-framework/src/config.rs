//! Configuration traits and utilities.

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::args::BridgeArgs;
use crate::error::{BridgeError, Result};
use crate::{LoggingConfig, MqttConfig};

/// Trait for bridge configuration types.
///
/// Implement this trait for your bridge's configuration struct to get
/// automatic loading, validation, and access to common config fields.
///
/// # Example
///
/// ```ignore
/// use serde::Deserialize;
/// use printsight_bridge_framework::{BridgeConfig, LoggingConfig, MqttConfig};
///
/// #[derive(Debug, Default, Deserialize)]
/// pub struct MyBridgeConfig {
///     pub mqtt: MqttConfig,
///     pub logging: LoggingConfig,
///     pub my_device: MyDeviceConfig,
/// }
///
/// impl BridgeConfig for MyBridgeConfig {
///     fn mqtt(&self) -> &MqttConfig {
///         &self.mqtt
///     }
///
///     fn logging(&self) -> &LoggingConfig {
///         &self.logging
///     }
///
///     fn base_topic(&self) -> &str {
///         &self.my_device.base_topic
///     }
/// }
/// ```
pub trait BridgeConfig: Sized + DeserializeOwned {
    /// Get the MQTT configuration.
    fn mqtt(&self) -> &MqttConfig;

    /// Get the logging configuration.
    fn logging(&self) -> &LoggingConfig;

    /// Get the base topic all data topics of this bridge live under.
    fn base_topic(&self) -> &str;

    /// Availability topic, also registered as the last will.
    fn availability_topic(&self) -> String {
        format!("{}/status", self.base_topic())
    }

    /// Validate the configuration.
    ///
    /// Called automatically by [`load`](Self::load). Override to add custom validation.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Read a configuration file without validating it.
    fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(BridgeError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = json5::from_str(&content)?;

        Ok(config)
    }

    /// Load configuration from a file path.
    ///
    /// Supports JSON5 format. Calls [`validate`](Self::validate) after loading.
    fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the configuration named on the command line, or the default file.
    ///
    /// An explicit `--config` that does not exist is an error. A missing default
    /// file yields the built-in defaults. The result is not validated, so that
    /// environment overrides can be applied first.
    fn load_or_default(args: &BridgeArgs, default_config: &str) -> Result<Self>
    where
        Self: Default,
    {
        let path = args.config_path(default_config);

        if !args.has_explicit_config() && !path.exists() {
            tracing::debug!(path = %path.display(), "No configuration file, using defaults");
            return Ok(Self::default());
        }

        Self::read(&path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::path::PathBuf;

    #[derive(Debug, Default, Deserialize)]
    struct TestConfig {
        #[serde(default)]
        mqtt: MqttConfig,
        #[serde(default)]
        logging: LoggingConfig,
        #[serde(default)]
        base_topic: String,
    }

    impl BridgeConfig for TestConfig {
        fn mqtt(&self) -> &MqttConfig {
            &self.mqtt
        }

        fn logging(&self) -> &LoggingConfig {
            &self.logging
        }

        fn base_topic(&self) -> &str {
            &self.base_topic
        }

        fn validate(&self) -> Result<()> {
            if self.base_topic.is_empty() {
                return Err(BridgeError::validation("base_topic must not be empty"));
            }
            Ok(())
        }
    }

    #[test]
    fn test_config_not_found() {
        let result = TestConfig::load("/nonexistent/path.json5");
        assert!(matches!(result, Err(BridgeError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_load_or_default_without_file() {
        let args = BridgeArgs::default();
        let config = TestConfig::load_or_default(&args, "/nonexistent/default.json5").unwrap();
        assert!(config.base_topic.is_empty());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_or_default_explicit_missing() {
        let args = BridgeArgs {
            config: Some(PathBuf::from("/nonexistent/explicit.json5")),
            log_level: None,
        };
        let result = TestConfig::load_or_default(&args, "unused.json5");
        assert!(matches!(result, Err(BridgeError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_availability_topic() {
        let config = TestConfig {
            base_topic: "creality/k1".to_string(),
            ..Default::default()
        };
        assert_eq!(config.availability_topic(), "creality/k1/status");
    }
}
