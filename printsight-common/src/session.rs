use std::time::Duration;

use rumqttc::{LastWill, MqttOptions, QoS};
use url::Url;

use crate::config::MqttConfig;
use crate::error::{Error, Result};

/// Default MQTT port for plain TCP connections.
const DEFAULT_PORT: u16 = 1883;

/// Host and port of an MQTT broker, parsed from a broker URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerEndpoint {
    pub host: String,
    pub port: u16,
}

impl BrokerEndpoint {
    /// Parse a broker URL such as `tcp://localhost:1883` or `mqtt://broker.lan`.
    pub fn parse(broker: &str) -> Result<Self> {
        let url = Url::parse(broker)?;

        match url.scheme() {
            "tcp" | "mqtt" => {}
            other => {
                return Err(Error::Config(format!(
                    "Unsupported broker scheme '{}'. Expected 'tcp' or 'mqtt'",
                    other
                )));
            }
        }

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::Config(format!("Broker URL '{}' has no host", broker)))?;

        Ok(Self {
            host: host.to_string(),
            port: url.port().unwrap_or(DEFAULT_PORT),
        })
    }
}

/// Build MQTT connection options from the configuration.
///
/// When `will_topic` is set, a retained `offline` last will is registered so the
/// broker marks the bridge unavailable on an ungraceful disconnect.
pub fn mqtt_options(config: &MqttConfig, will_topic: Option<&str>) -> Result<MqttOptions> {
    let endpoint = BrokerEndpoint::parse(&config.broker)?;

    let mut options = MqttOptions::new(&config.client_id, &endpoint.host, endpoint.port);
    options.set_keep_alive(Duration::from_secs(config.keep_alive_secs.max(5)));
    options.set_clean_session(true);

    if let Some(username) = config.username.as_deref().filter(|u| !u.is_empty()) {
        options.set_credentials(username, config.password.clone().unwrap_or_default());
    }

    if let Some(topic) = will_topic {
        options.set_last_will(LastWill::new(
            topic,
            crate::topics::OFFLINE,
            QoS::AtMostOnce,
            true,
        ));
    }

    tracing::debug!(
        host = %endpoint.host,
        port = endpoint.port,
        client_id = %config.client_id,
        last_will = ?will_topic,
        "Built MQTT options"
    );

    Ok(options)
}
