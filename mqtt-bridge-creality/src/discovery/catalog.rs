//! Discovery catalog for one printer.

use printsight_common::{OutboundMessage, TopicBuilder};

use super::{Component, EntityDescriptor};
use crate::identity::DeviceIdentity;

/// Every static entity for an identity, in publish order.
///
/// Camera entities are included only when the printer address is known.
pub fn catalog_entities(identity: &DeviceIdentity, topics: &TopicBuilder) -> Vec<EntityDescriptor> {
    let entity = |component, id: &str, name: &str, state_topic: String| {
        EntityDescriptor::new(identity, topics, component, id, name, state_topic)
    };
    let temperature = |id: &str, name: &str, subtopic: &str| {
        entity(Component::Sensor, id, name, topics.data(subtopic))
            .unit("°C")
            .device_class("temperature")
            .measurement()
            .icon("mdi:thermometer")
    };
    let fan = |id: &str, name: &str| {
        entity(Component::Sensor, id, name, topics.data(id))
            .unit("%")
            .measurement()
            .icon("mdi:fan")
    };

    let mut entities = vec![
        temperature(
            "nozzle_temp_current",
            "Nozzle Temperature",
            "temperature/nozzle/current",
        ),
        temperature(
            "nozzle_temp_target",
            "Nozzle Target Temperature",
            "temperature/nozzle/target",
        ),
        temperature(
            "bed_temp_current",
            "Bed Temperature",
            "temperature/bed0/current",
        ),
        temperature(
            "bed_temp_target",
            "Bed Target Temperature",
            "temperature/bed0/target",
        ),
        entity(
            Component::Sensor,
            "printer_status",
            "Printer Status",
            topics.data("printer_status"),
        )
        .icon("mdi:printer-3d"),
        fan("model_fan_pct", "Model Fan Speed"),
        fan("auxiliary_fan_pct", "Auxiliary Fan Speed"),
        fan("case_fan_pct", "Case Fan Speed"),
        entity(
            Component::Sensor,
            "print_progress",
            "Print Progress",
            topics.data("job/progress"),
        )
        .unit("%")
        .measurement()
        .icon("mdi:percent"),
        entity(
            Component::Sensor,
            "feed_state",
            "Feed State",
            topics.data("feed_state"),
        )
        .icon("mdi:printer-3d-nozzle"),
        entity(
            Component::BinarySensor,
            "printing",
            "Printing",
            topics.data("printing"),
        )
        .payloads("true", "false")
        .icon("mdi:printer-3d"),
        entity(
            Component::BinarySensor,
            "part_fan",
            "Part Cooling Fan",
            topics.data("fan"),
        )
        .payloads("1", "0")
        .icon("mdi:fan"),
        entity(Component::Switch, "light", "Light", topics.light_state())
            .command_topic(topics.light_command())
            .payloads("1", "0")
            .states("1", "0")
            .icon("mdi:lightbulb"),
    ];

    if identity.printer_address.is_some() {
        entities.push(
            entity(
                Component::Sensor,
                "camera_stream_url",
                "Camera Stream URL",
                topics.camera_stream_url(),
            )
            .icon("mdi:video"),
        );
        entities.push(
            entity(
                Component::BinarySensor,
                "video_stream",
                "Camera Stream Active",
                topics.data("video"),
            )
            .payloads("1", "0")
            .icon("mdi:video"),
        );
    }

    entities
}

/// Retained descriptors for the static catalog, plus the camera URL value.
///
/// The result depends only on the identity and topic layout.
pub fn build_catalog(
    identity: &DeviceIdentity,
    topics: &TopicBuilder,
) -> serde_json::Result<Vec<OutboundMessage>> {
    let mut messages = catalog_entities(identity, topics)
        .iter()
        .map(|entity| entity.to_message(topics))
        .collect::<serde_json::Result<Vec<_>>>()?;

    if let Some(url) = identity.camera_stream_url() {
        messages.push(OutboundMessage::retained(topics.camera_stream_url(), url));
    }

    Ok(messages)
}

/// Retained descriptors for one CFS box.
pub fn build_cfs_descriptors(
    identity: &DeviceIdentity,
    topics: &TopicBuilder,
    box_id: i64,
) -> serde_json::Result<Vec<OutboundMessage>> {
    let sensor = |field: &str, name: String| {
        EntityDescriptor::new(
            identity,
            topics,
            Component::Sensor,
            format!("cfs_{}_{}", box_id, field),
            name,
            topics.data(&format!("cfs/{}/{}", box_id, field)),
        )
        .measurement()
    };

    [
        sensor("humidity", format!("CFS {} Humidity", box_id))
            .unit("%")
            .device_class("humidity")
            .icon("mdi:water-percent"),
        sensor("temperature", format!("CFS {} Temperature", box_id))
            .unit("°C")
            .device_class("temperature")
            .icon("mdi:thermometer"),
    ]
    .iter()
    .map(|entity| entity.to_message(topics))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn topics() -> TopicBuilder {
        TopicBuilder::new("p/k1", "homeassistant")
    }

    fn identity(address: Option<&str>) -> DeviceIdentity {
        DeviceIdentity {
            id: "k1".to_string(),
            name: "K1".to_string(),
            model: "K1 SE".to_string(),
            printer_address: address.map(str::to_string),
        }
    }

    #[test]
    fn test_catalog_without_camera() {
        let messages = build_catalog(&identity(None), &topics()).unwrap();
        assert_eq!(messages.len(), 13);
        assert!(messages.iter().all(|m| m.retain && !m.payload.is_empty()));
        assert!(
            !messages
                .iter()
                .any(|m| m.topic.contains("camera") || m.topic.contains("video"))
        );
    }

    #[test]
    fn test_catalog_with_camera() {
        let messages = build_catalog(&identity(Some("10.0.0.7")), &topics()).unwrap();
        assert_eq!(messages.len(), 16);

        let url = messages
            .iter()
            .find(|m| m.topic == "p/k1/camera_stream_url")
            .unwrap();
        assert_eq!(url.payload, "http://10.0.0.7:8080/?action=stream");
        assert!(url.retain);

        assert!(
            messages
                .iter()
                .any(|m| m.topic == "homeassistant/binary_sensor/k1/video_stream/config")
        );
    }

    #[test]
    fn test_catalog_is_deterministic() {
        let identity = identity(Some("10.0.0.7"));
        assert_eq!(
            build_catalog(&identity, &topics()).unwrap(),
            build_catalog(&identity, &topics()).unwrap()
        );
    }

    #[test]
    fn test_temperature_descriptor() {
        let messages = build_catalog(&identity(None), &topics()).unwrap();
        let nozzle = messages
            .iter()
            .find(|m| m.topic == "homeassistant/sensor/k1/nozzle_temp_current/config")
            .unwrap();

        let payload: Value = serde_json::from_str(&nozzle.payload).unwrap();
        assert_eq!(payload["unique_id"], "k1_nozzle_temp_current");
        assert_eq!(payload["state_topic"], "p/k1/temperature/nozzle/current");
        assert_eq!(payload["unit_of_measurement"], "°C");
        assert_eq!(payload["device_class"], "temperature");
        assert_eq!(payload["state_class"], "measurement");
        assert!(payload.get("command_topic").is_none());
    }

    #[test]
    fn test_cfs_descriptors() {
        let messages = build_cfs_descriptors(&identity(None), &topics(), 3).unwrap();
        let topics_out: Vec<_> = messages.iter().map(|m| m.topic.as_str()).collect();
        assert_eq!(
            topics_out,
            [
                "homeassistant/sensor/k1/cfs_3_humidity/config",
                "homeassistant/sensor/k1/cfs_3_temperature/config",
            ]
        );

        let payload: Value = serde_json::from_str(&messages[0].payload).unwrap();
        assert_eq!(payload["name"], "CFS 3 Humidity");
        assert_eq!(payload["state_topic"], "p/k1/cfs/3/humidity");
    }
}
