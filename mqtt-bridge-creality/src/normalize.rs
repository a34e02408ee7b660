//! Generic field normalization.
//!
//! Every scalar key of a snapshot is published to `{base}/{normalized_key}`.
//! Nested values are left to the derivation modules.

use printsight_common::{OutboundMessage, TopicBuilder};

use crate::snapshot::{Snapshot, scalar_payload};

/// High-frequency keys that are never mapped generically.
pub const NOISY_KEYS: &[&str] = &["videoElapseFrame", "videoElapseInterval", "video", "video1"];

/// Whether a key is excluded from generic mapping.
pub fn is_noisy(key: &str) -> bool {
    NOISY_KEYS.contains(&key)
}

/// Convert a snapshot key to a lower snake case topic suffix.
///
/// ```
/// use mqtt_bridge_creality::normalize::normalize_key;
///
/// assert_eq!(normalize_key("nozzleTemp"), "nozzle_temp");
/// assert_eq!(normalize_key(" Model Fan Pct "), "model_fan_pct");
/// assert_eq!(normalize_key("TotalLayer"), "total_layer");
/// ```
pub fn normalize_key(key: &str) -> String {
    let key = key.trim().replace(' ', "_");
    let mut out = String::with_capacity(key.len() + 4);
    let mut prev: Option<char> = None;

    for c in key.chars() {
        if c.is_uppercase() && prev.is_some_and(char::is_lowercase) {
            out.push('_');
        }
        out.extend(c.to_lowercase());
        prev = Some(c);
    }

    out
}

/// Map one key/value pair to a message, if it has a generic mapping.
pub fn normalize_field(
    key: &str,
    value: &serde_json::Value,
    topics: &TopicBuilder,
) -> Option<OutboundMessage> {
    if is_noisy(key) {
        return None;
    }
    let payload = scalar_payload(value)?;
    Some(OutboundMessage::event(
        topics.data(&normalize_key(key)),
        payload,
    ))
}

/// Map every scalar field of a snapshot.
pub fn normalize(snapshot: &Snapshot, topics: &TopicBuilder) -> Vec<OutboundMessage> {
    snapshot
        .iter()
        .filter_map(|(key, value)| normalize_field(key, value, topics))
        .collect()
}
