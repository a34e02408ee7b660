//! Print job topics.

use printsight_common::{OutboundMessage, TopicBuilder};

use crate::snapshot::Snapshot;

/// Derive job messages.
///
/// `printing` is always emitted. Counters are emitted when present, the total
/// layer count only when non-zero (zero means unknown).
pub fn derive(snapshot: &Snapshot, topics: &TopicBuilder) -> Vec<OutboundMessage> {
    let mut out = Vec::with_capacity(9);

    let progress = snapshot.int("printProgress");
    let left = snapshot.int("printLeftTime");

    out.push(OutboundMessage::event(
        topics.data("printing"),
        is_printing(progress, left).to_string(),
    ));

    let counters = [
        ("job/progress", progress),
        ("job/left_time", left),
        ("job/job_time", snapshot.int("printJobTime")),
        ("job/layer/current", snapshot.int("layer")),
        (
            "job/layer/total",
            snapshot.int("TotalLayer").filter(|&n| n > 0),
        ),
    ];
    for (suffix, value) in counters {
        if let Some(value) = value {
            out.push(OutboundMessage::event(
                topics.data(suffix),
                value.to_string(),
            ));
        }
    }

    if let Some(name) = snapshot.str("printFileName").and_then(simplify_file_name) {
        out.push(OutboundMessage::event(topics.data("job/file_name"), name));
    }

    if let Some(feed_state) = snapshot.int("feedState") {
        out.push(OutboundMessage::event(
            topics.data("feed_state"),
            feed_state.to_string(),
        ));
    }

    out
}

/// Printing iff both progress and time left are known and positive.
pub fn is_printing(progress: Option<i64>, left: Option<i64>) -> bool {
    matches!((progress, left), (Some(p), Some(l)) if p > 0 && l > 0)
}

/// Reduce a printer file path to its last segment.
///
/// Backslashes count as separators. Blank names have no simplified form.
///
/// ```
/// use mqtt_bridge_creality::derive::job::simplify_file_name;
///
/// assert_eq!(
///     simplify_file_name("/a/b/c (1)_x.3mf/final_plate_4.gcode").as_deref(),
///     Some("final_plate_4.gcode")
/// );
/// assert_eq!(simplify_file_name("   "), None);
/// ```
pub fn simplify_file_name(full: &str) -> Option<String> {
    let full = full.trim().replace('\\', "/");
    let base = full.trim_end_matches('/').rsplit('/').next()?;
    (!base.is_empty()).then(|| base.to_string())
}
