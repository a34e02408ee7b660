//! Structured temperature topics.
//!
//! These duplicate the generic `nozzle_temp`, `bed_temp0`, ... topics under a
//! stable `temperature/{part}/{current|target}` layout.

use printsight_common::{OutboundMessage, TopicBuilder};

use crate::snapshot::Snapshot;

/// Snapshot key and topic suffix of every structured temperature.
const TEMPERATURES: &[(&str, &str)] = &[
    ("nozzleTemp", "temperature/nozzle/current"),
    ("targetNozzleTemp", "temperature/nozzle/target"),
    ("bedTemp0", "temperature/bed0/current"),
    ("targetBedTemp0", "temperature/bed0/target"),
    ("boxTemp", "temperature/box/current"),
];

/// Derive structured temperature messages.
pub fn derive(snapshot: &Snapshot, topics: &TopicBuilder) -> Vec<OutboundMessage> {
    TEMPERATURES
        .iter()
        .filter_map(|(key, suffix)| {
            let value = snapshot.float(key)?;
            Some(OutboundMessage::event(
                topics.data(suffix),
                format!("{:.3}", value),
            ))
        })
        .collect()
}
