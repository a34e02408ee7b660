//! Derivation modules.
//!
//! Each module turns a snapshot into structured or derived topics. Only the
//! status module keeps state between snapshots.

pub mod cfs;
pub mod job;
pub mod state;
pub mod temps;

use printsight_common::{OutboundMessage, TopicBuilder};
use tokio::time::Instant;

use crate::normalize;
use crate::snapshot::Snapshot;

pub use state::{PrinterStatus, StatusDecision, StatusTracker};

/// Every message a snapshot maps to: generic fields first, then derived topics.
pub fn derive_messages(
    snapshot: &Snapshot,
    topics: &TopicBuilder,
    status: &StatusTracker,
    now: Instant,
) -> Vec<OutboundMessage> {
    let mut out = normalize::normalize(snapshot, topics);
    out.extend(temps::derive(snapshot, topics));
    out.extend(job::derive(snapshot, topics));
    out.extend(status.derive(snapshot, topics, now));
    out.extend(cfs::derive(snapshot, topics));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_messages_combines_modules() {
        let snapshot = Snapshot::parse(
            br#"{"nozzleTemp":"219.900000","printProgress":50,"printLeftTime":600,"tfCard":1}"#,
        )
        .unwrap();
        let topics = TopicBuilder::new("p/k1", "homeassistant");

        let out = derive_messages(&snapshot, &topics, &StatusTracker::new(), Instant::now());
        let find = |topic: &str| {
            out.iter()
                .find(|m| m.topic == topic)
                .map(|m| m.payload.as_str())
        };

        assert_eq!(find("p/k1/nozzle_temp"), Some("219.900"));
        assert_eq!(find("p/k1/temperature/nozzle/current"), Some("219.900"));
        assert_eq!(find("p/k1/printing"), Some("true"));
        assert_eq!(find("p/k1/printer_status"), Some("active"));
        assert_eq!(find("p/k1/tf_card_present"), Some("true"));
        assert_eq!(find("p/k1/tf_card"), Some("1"));
        assert!(out.iter().all(|m| !m.retain));
    }
}
