//! Deletion of stale discovery entities.
//!
//! Two independent lists: the startup cleanup removes entities published
//! by earlier releases, the administrative purge removes everything a device
//! may ever have announced.

use std::collections::HashSet;

use printsight_common::{OutboundMessage, TopicBuilder};

use super::{Component, catalog_entities};
use crate::identity::{DeviceIdentity, sanitize_id};

/// Entities retired from the catalog, deleted on every startup.
pub const CLEANUP_ENTITIES: &[(Component, &str)] = &[
    (Component::Sensor, "printer_online"),
    (Component::Sensor, "old_temp_sensor"),
    (Component::Sensor, "camera_stream"),
    (Component::Sensor, "camera_stream_url"),
    (Component::Sensor, "last_seen"),
    (Component::BinarySensor, "light"),
    (Component::BinarySensor, "online"),
    (Component::BinarySensor, "connected"),
    (Component::BinarySensor, "camera_stream"),
    (Component::BinarySensor, "printer_connected"),
    (Component::BinarySensor, "printer_connected_2"),
];

/// Entity ids deleted under every component by the administrative purge.
pub const PURGE_ENTITY_IDS: &[&str] = &[
    "nozzle_temp_current",
    "nozzle_temp_target",
    "bed_temp_current",
    "bed_temp_target",
    "printer_status",
    "model_fan_pct",
    "auxiliary_fan_pct",
    "case_fan_pct",
    "print_progress",
    "feed_state",
    "last_seen",
    "camera_stream_url",
    "video_stream",
    "printing",
    "light",
    "part_fan",
    "printer_online",
    "printer_connected",
    "printer_connected_2",
    "online",
    "camera_stream",
    "camera",
    "old_temp_sensor",
];

/// Deletions for retired entities that are not part of the current catalog.
pub fn build_cleanup(identity: &DeviceIdentity, topics: &TopicBuilder) -> Vec<OutboundMessage> {
    let current: HashSet<(Component, String)> = catalog_entities(identity, topics)
        .into_iter()
        .map(|entity| (entity.component, entity.entity_id))
        .collect();

    CLEANUP_ENTITIES
        .iter()
        .filter(|(component, id)| !current.contains(&(*component, id.to_string())))
        .map(|(component, id)| {
            OutboundMessage::delete(topics.discovery(component.as_str(), &identity.id, id))
        })
        .collect()
}

/// Deletions for every known entity of a device, across all components.
pub fn build_purge(device_id: &str, topics: &TopicBuilder) -> Vec<OutboundMessage> {
    let device_id = sanitize_id(device_id.trim());

    Component::ALL
        .iter()
        .flat_map(|component| {
            PURGE_ENTITY_IDS
                .iter()
                .map(|id| {
                    OutboundMessage::delete(topics.discovery(component.as_str(), &device_id, id))
                })
                .collect::<Vec<_>>()
        })
        .collect()
}
