//! Integration tests for printsight-common library.

use printsight_common::{MqttConfig, OFFLINE, OutboundMessage, TopicBuilder, mqtt_options};

#[test]
fn test_availability_matches_last_will() {
    let topics = TopicBuilder::new("creality/k1", "homeassistant");
    let options = mqtt_options(&MqttConfig::default(), Some(&topics.availability()))
        .expect("options");

    let will = options.last_will().expect("last will registered");
    assert_eq!(will.topic, topics.availability());
    assert_eq!(&will.message[..], OFFLINE.as_bytes());
    assert!(will.retain);
}

#[test]
fn test_discovery_delete_message() {
    let topics = TopicBuilder::new("creality/k1", "homeassistant");
    let msg = OutboundMessage::delete(topics.discovery("sensor", "k1_se", "last_seen"));

    assert_eq!(msg.topic, "homeassistant/sensor/k1_se/last_seen/config");
    assert!(msg.is_delete());
}

#[test]
fn test_config_with_invalid_broker_is_rejected_at_connect() {
    let config: MqttConfig = json5::from_str(r#"{ broker: "http://localhost:1883" }"#).unwrap();
    assert!(mqtt_options(&config, None).is_err());
}
