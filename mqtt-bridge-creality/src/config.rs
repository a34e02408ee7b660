//! Creality bridge configuration.

use serde::{Deserialize, Serialize};
use url::Url;

use printsight_bridge_framework::{BridgeConfig, BridgeError, LoggingConfig, MqttConfig, Result};
use printsight_common::{BrokerEndpoint, TopicBuilder, has_wildcards};

/// Complete Creality bridge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrealityBridgeConfig {
    /// MQTT broker settings.
    #[serde(default)]
    pub mqtt: MqttConfig,

    /// Printer and topic settings.
    #[serde(default)]
    pub creality: CrealityConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Printer connection and topic layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrealityConfig {
    /// Printer WebSocket URL, e.g. `ws://192.168.1.50:9999/`.
    #[serde(default)]
    pub ws_url: String,

    /// Root of all data topics (default: "creality/printer").
    #[serde(default = "default_base_topic")]
    pub base_topic: String,

    /// Home Assistant discovery prefix (default: "homeassistant").
    #[serde(default = "default_discovery_prefix")]
    pub discovery_prefix: String,

    /// Overrides the device name reported by the printer.
    #[serde(default)]
    pub device_name: Option<String>,

    /// Delay between WebSocket reconnection attempts (default: 5).
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
}

fn default_base_topic() -> String {
    "creality/printer".to_string()
}

fn default_discovery_prefix() -> String {
    "homeassistant".to_string()
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

impl Default for CrealityConfig {
    fn default() -> Self {
        Self {
            ws_url: String::new(),
            base_topic: default_base_topic(),
            discovery_prefix: default_discovery_prefix(),
            device_name: None,
            reconnect_delay_secs: default_reconnect_delay_secs(),
        }
    }
}

/// Command-line and environment overrides, applied after the file is loaded.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// WebSocket URL of the printer (e.g. ws://192.168.1.50:9999/).
    #[arg(long, global = true, env = "CREALITY_WS_URL")]
    pub ws_url: Option<String>,

    /// MQTT broker URL.
    #[arg(long, global = true, env = "CREALITY_MQTT_BROKER")]
    pub mqtt_broker: Option<String>,

    /// MQTT client ID.
    #[arg(long, global = true, env = "CREALITY_MQTT_CLIENT_ID")]
    pub mqtt_client_id: Option<String>,

    /// MQTT username.
    #[arg(long, global = true, env = "CREALITY_MQTT_USERNAME")]
    pub mqtt_username: Option<String>,

    /// MQTT password.
    #[arg(
        long,
        global = true,
        env = "CREALITY_MQTT_PASSWORD",
        hide_env_values = true
    )]
    pub mqtt_password: Option<String>,

    /// Minimum seconds between publishes per topic (0 disables throttling).
    #[arg(long, global = true, env = "CREALITY_MQTT_MIN_INTERVAL")]
    pub mqtt_min_interval: Option<u64>,

    /// Base MQTT topic.
    #[arg(long, global = true, env = "CREALITY_MQTT_BASE_TOPIC")]
    pub mqtt_base_topic: Option<String>,

    /// Home Assistant discovery prefix.
    #[arg(long, global = true, env = "CREALITY_DISCOVERY_PREFIX")]
    pub discovery_prefix: Option<String>,

    /// Device name override for Home Assistant.
    #[arg(long, global = true, env = "CREALITY_DEVICE_NAME")]
    pub device_name: Option<String>,

    /// Log level from the environment; `--log-level` still wins.
    #[arg(skip = std::env::var("CREALITY_LOG_LEVEL").ok())]
    pub log_level: Option<String>,
}

impl CrealityBridgeConfig {
    /// Apply overrides on top of the loaded configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(value) = value {
                *target = value.clone();
            }
        }

        set(&mut self.creality.ws_url, &overrides.ws_url);
        set(&mut self.mqtt.broker, &overrides.mqtt_broker);
        set(&mut self.mqtt.client_id, &overrides.mqtt_client_id);
        set(
            &mut self.mqtt.min_interval_secs,
            &overrides.mqtt_min_interval,
        );
        set(&mut self.creality.base_topic, &overrides.mqtt_base_topic);
        set(
            &mut self.creality.discovery_prefix,
            &overrides.discovery_prefix,
        );
        set(&mut self.logging.level, &overrides.log_level);

        if overrides.mqtt_username.is_some() {
            self.mqtt.username = overrides.mqtt_username.clone();
        }
        if overrides.mqtt_password.is_some() {
            self.mqtt.password = overrides.mqtt_password.clone();
        }
        if overrides.device_name.is_some() {
            self.creality.device_name = overrides.device_name.clone();
        }
    }

    /// Topic namespace for this bridge.
    pub fn topics(&self) -> TopicBuilder {
        TopicBuilder::new(&self.creality.base_topic, &self.creality.discovery_prefix)
    }

    /// Configured device name, if non-empty.
    pub fn device_name(&self) -> Option<&str> {
        self.creality
            .device_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }

    /// Validate the broker and topic settings.
    pub fn validate_broker(&self) -> Result<()> {
        BrokerEndpoint::parse(&self.mqtt.broker)
            .map_err(|e| BridgeError::validation(e.to_string()))?;

        for (field, value) in [
            ("creality.base_topic", &self.creality.base_topic),
            ("creality.discovery_prefix", &self.creality.discovery_prefix),
        ] {
            if value.trim().is_empty() {
                return Err(BridgeError::validation(format!(
                    "{} must not be empty",
                    field
                )));
            }
            if has_wildcards(value) {
                return Err(BridgeError::validation(format!(
                    "{} must not contain MQTT wildcards: '{}'",
                    field, value
                )));
            }
        }

        Ok(())
    }

    /// Validate the printer WebSocket URL.
    pub fn validate_source(&self) -> Result<()> {
        let ws_url = self.creality.ws_url.trim();
        if ws_url.is_empty() {
            return Err(BridgeError::validation(
                "creality.ws_url is required (or set CREALITY_WS_URL)",
            ));
        }

        let url = Url::parse(ws_url).map_err(|e| {
            BridgeError::validation(format!("Invalid creality.ws_url '{}': {}", ws_url, e))
        })?;

        if url.scheme() != "ws" {
            return Err(BridgeError::validation(format!(
                "creality.ws_url must use the ws:// scheme, got '{}'",
                url.scheme()
            )));
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(BridgeError::validation(format!(
                "creality.ws_url '{}' has no host",
                ws_url
            )));
        }

        Ok(())
    }
}

impl BridgeConfig for CrealityBridgeConfig {
    fn mqtt(&self) -> &MqttConfig {
        &self.mqtt
    }

    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    fn base_topic(&self) -> &str {
        &self.creality.base_topic
    }

    fn validate(&self) -> Result<()> {
        self.validate_source()?;
        self.validate_broker()
    }
}
