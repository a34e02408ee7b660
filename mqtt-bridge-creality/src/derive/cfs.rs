//! Creality Filament System (CFS) box topics.
//!
//! A snapshot may carry one box record:
//! `{"boxState": {"id": 1, "state": 1, "humidity": 28.0, "temp": 23.0}}`

use printsight_common::{OutboundMessage, TopicBuilder};
use serde_json::{Map, Value};

use crate::snapshot::{Snapshot, number_or_zero, scalar_payload};

fn box_record(snapshot: &Snapshot) -> Option<(i64, &Map<String, Value>)> {
    let record = snapshot.object("boxState")?;
    let id = record.get("id")?;
    Some((number_or_zero(id), record))
}

/// Id of the box in this snapshot.
///
/// The id field is mandatory. A null or non-numeric id reads as 0.
pub fn box_id(snapshot: &Snapshot) -> Option<i64> {
    box_record(snapshot).map(|(id, _)| id)
}

/// Derive box messages under `{base}/cfs/{id}/...`.
pub fn derive(snapshot: &Snapshot, topics: &TopicBuilder) -> Vec<OutboundMessage> {
    let Some((id, record)) = box_record(snapshot) else {
        return Vec::new();
    };

    let mut out = Vec::with_capacity(3);
    let topic = |field: &str| topics.data(&format!("cfs/{}/{}", id, field));

    for (key, field) in [("humidity", "humidity"), ("temp", "temperature")] {
        if let Some(payload) = record.get(key).and_then(scalar_payload) {
            out.push(OutboundMessage::event(topic(field), payload));
        }
    }

    if let Some(state) = record.get("state") {
        out.push(OutboundMessage::event(
            topic("state"),
            number_or_zero(state).to_string(),
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topics() -> TopicBuilder {
        TopicBuilder::new("p/k1", "homeassistant")
    }

    #[test]
    fn test_box_messages() {
        let snapshot =
            Snapshot::parse(br#"{"boxState":{"id":1,"state":1,"humidity":28.0,"temp":"23.5"}}"#)
                .unwrap();

        let out: Vec<_> = derive(&snapshot, &topics())
            .into_iter()
            .map(|m| (m.topic, m.payload))
            .collect();

        assert_eq!(
            out,
            vec![
                ("p/k1/cfs/1/humidity".to_string(), "28".to_string()),
                ("p/k1/cfs/1/temperature".to_string(), "23.500".to_string()),
                ("p/k1/cfs/1/state".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn test_missing_id_yields_nothing() {
        let snapshot = Snapshot::parse(br#"{"boxState":{"humidity":28.0}}"#).unwrap();
        assert!(derive(&snapshot, &topics()).is_empty());
        assert_eq!(box_id(&snapshot), None);

        let snapshot = Snapshot::parse(br#"{"boxState":"n/a"}"#).unwrap();
        assert!(derive(&snapshot, &topics()).is_empty());
    }

    #[test]
    fn test_null_id_is_box_zero() {
        let snapshot = Snapshot::parse(br#"{"boxState":{"id":null,"state":2}}"#).unwrap();
        assert_eq!(box_id(&snapshot), Some(0));

        let out = derive(&snapshot, &topics());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].topic, "p/k1/cfs/0/state");
        assert_eq!(out[0].payload, "2");
    }
}
