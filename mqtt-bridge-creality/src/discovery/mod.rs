//! Home Assistant MQTT discovery.
//!
//! Each entity is announced by a retained JSON descriptor on
//! `{prefix}/{component}/{device_id}/{entity_id}/config`. An empty retained
//! payload on the same topic deletes the entity.

pub mod catalog;
pub mod cleanup;

use std::fmt;

use printsight_common::{OFFLINE, ONLINE, OutboundMessage, TopicBuilder};
use serde::Serialize;

use crate::identity::DeviceIdentity;

pub use catalog::{build_catalog, build_cfs_descriptors, catalog_entities};
pub use cleanup::{build_cleanup, build_purge};

/// Entity platform of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Component {
    Sensor,
    BinarySensor,
    Switch,
    Camera,
}

impl Component {
    /// Every component, in purge order.
    pub const ALL: [Component; 4] = [
        Component::Sensor,
        Component::BinarySensor,
        Component::Switch,
        Component::Camera,
    ];

    /// Discovery topic segment.
    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Sensor => "sensor",
            Component::BinarySensor => "binary_sensor",
            Component::Switch => "switch",
            Component::Camera => "camera",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Device block shared by every descriptor of one printer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceBlock {
    pub identifiers: Vec<String>,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
}

impl From<&DeviceIdentity> for DeviceBlock {
    fn from(identity: &DeviceIdentity) -> Self {
        Self {
            identifiers: vec![identity.id.clone()],
            name: identity.name.clone(),
            manufacturer: identity.manufacturer().to_string(),
            model: identity.model.clone(),
        }
    }
}

/// One discoverable entity.
///
/// Serializes to the descriptor payload. Skipped fields only select the
/// config topic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityDescriptor {
    #[serde(skip)]
    pub component: Component,
    #[serde(skip)]
    pub device_id: String,
    #[serde(skip)]
    pub entity_id: String,

    pub name: String,
    pub unique_id: String,
    pub state_topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_topic: Option<String>,
    pub availability_topic: String,
    pub payload_available: String,
    pub payload_not_available: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_on: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_off: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_on: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_off: Option<String>,
    pub device: DeviceBlock,
}

impl EntityDescriptor {
    /// Create a descriptor with the availability and device fields filled in.
    pub fn new(
        identity: &DeviceIdentity,
        topics: &TopicBuilder,
        component: Component,
        entity_id: impl Into<String>,
        name: impl Into<String>,
        state_topic: impl Into<String>,
    ) -> Self {
        let entity_id = entity_id.into();
        Self {
            component,
            device_id: identity.id.clone(),
            unique_id: identity.unique_id(&entity_id),
            entity_id,
            name: name.into(),
            state_topic: state_topic.into(),
            command_topic: None,
            availability_topic: topics.availability(),
            payload_available: ONLINE.to_string(),
            payload_not_available: OFFLINE.to_string(),
            unit_of_measurement: None,
            device_class: None,
            state_class: None,
            icon: None,
            payload_on: None,
            payload_off: None,
            state_on: None,
            state_off: None,
            device: DeviceBlock::from(identity),
        }
    }

    pub fn unit(mut self, unit: &str) -> Self {
        self.unit_of_measurement = Some(unit.to_string());
        self
    }

    pub fn device_class(mut self, class: &str) -> Self {
        self.device_class = Some(class.to_string());
        self
    }

    /// Set `state_class` to `measurement`.
    pub fn measurement(mut self) -> Self {
        self.state_class = Some("measurement".to_string());
        self
    }

    pub fn icon(mut self, icon: &str) -> Self {
        self.icon = Some(icon.to_string());
        self
    }

    pub fn command_topic(mut self, topic: impl Into<String>) -> Self {
        self.command_topic = Some(topic.into());
        self
    }

    /// Payloads meaning on and off.
    pub fn payloads(mut self, on: &str, off: &str) -> Self {
        self.payload_on = Some(on.to_string());
        self.payload_off = Some(off.to_string());
        self
    }

    /// State values meaning on and off (switches).
    pub fn states(mut self, on: &str, off: &str) -> Self {
        self.state_on = Some(on.to_string());
        self.state_off = Some(off.to_string());
        self
    }

    /// Config topic of this entity.
    pub fn config_topic(&self, topics: &TopicBuilder) -> String {
        topics.discovery(self.component.as_str(), &self.device_id, &self.entity_id)
    }

    /// Retained descriptor message.
    pub fn to_message(&self, topics: &TopicBuilder) -> serde_json::Result<OutboundMessage> {
        Ok(OutboundMessage::retained(
            self.config_topic(topics),
            serde_json::to_string(self)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn identity() -> DeviceIdentity {
        DeviceIdentity {
            id: "k1".to_string(),
            name: "K1".to_string(),
            model: "K1 SE".to_string(),
            printer_address: None,
        }
    }

    #[test]
    fn test_component_names() {
        let names: Vec<_> = Component::ALL.iter().map(Component::as_str).collect();
        assert_eq!(names, ["sensor", "binary_sensor", "switch", "camera"]);
    }

    #[test]
    fn test_descriptor_payload() {
        let topics = TopicBuilder::new("p/k1", "homeassistant");
        let message = EntityDescriptor::new(
            &identity(),
            &topics,
            Component::Switch,
            "light",
            "Light",
            topics.light_state(),
        )
        .command_topic(topics.light_command())
        .payloads("1", "0")
        .states("1", "0")
        .icon("mdi:lightbulb")
        .to_message(&topics)
        .unwrap();

        assert_eq!(message.topic, "homeassistant/switch/k1/light/config");
        assert!(message.retain);

        let payload: Value = serde_json::from_str(&message.payload).unwrap();
        assert_eq!(
            payload,
            json!({
                "name": "Light",
                "unique_id": "k1_light",
                "state_topic": "p/k1/light_sw",
                "command_topic": "p/k1/light_sw/set",
                "availability_topic": "p/k1/status",
                "payload_available": "online",
                "payload_not_available": "offline",
                "icon": "mdi:lightbulb",
                "payload_on": "1",
                "payload_off": "0",
                "state_on": "1",
                "state_off": "0",
                "device": {
                    "identifiers": ["k1"],
                    "name": "K1",
                    "manufacturer": "Creality",
                    "model": "K1 SE",
                },
            })
        );
    }
}
