//! PrintSight Common Library
//!
//! This crate provides shared types and utilities for PrintSight MQTT bridges:
//!
//! - [`message`] - Outbound message model (`OutboundMessage`)
//! - [`topics`] - Topic namespace builder (`TopicBuilder`)
//! - [`config`] - MQTT and logging configuration
//! - [`session`] - MQTT connection options and broker endpoint parsing
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod message;
pub mod session;
pub mod topics;

// Re-export commonly used types at the crate root
pub use config::{LogFormat, LoggingConfig, MqttConfig};
pub use error::{Error, Result};
pub use message::OutboundMessage;
pub use session::{BrokerEndpoint, mqtt_options};
pub use topics::{ONLINE, OFFLINE, TopicBuilder, has_wildcards};

/// Transport crates that log every packet at debug level.
const QUIET_TARGETS: &[&str] = &["rumqttc", "tungstenite", "tokio_tungstenite"];

/// Filter directives for a configured level.
///
/// Transport crates are capped at `warn` unless the level is `trace`.
pub fn filter_directives(level: &str) -> String {
    let level = level.trim().to_lowercase();
    if level == "trace" {
        return level;
    }
    QUIET_TARGETS
        .iter()
        .fold(level, |acc, target| format!("{},{}=warn", acc, target))
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level when set. The output
/// is human-readable text or one JSON object per line.
///
/// # Example
///
/// ```ignore
/// use printsight_common::{LoggingConfig, LogFormat, init_tracing};
///
/// init_tracing(&LoggingConfig {
///     level: "debug".to_string(),
///     format: LogFormat::Json,
/// })?;
/// ```
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter_directives(&config.level)))
        .map_err(|e| Error::Config(format!("Invalid log level '{}': {}", config.level, e)))?;

    let layer = match config.format {
        LogFormat::Text => fmt::layer().with_target(false).boxed(),
        LogFormat::Json => fmt::layer().json().flatten_event(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))
}
