//! Printer status with hysteresis.

use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use printsight_common::{OutboundMessage, TopicBuilder};
use tokio::time::Instant;

use crate::snapshot::Snapshot;

/// Decay window for the active state, also the re-emission interval.
pub const STATUS_WINDOW: Duration = Duration::from_secs(10);

/// Coarse printer activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrinterStatus {
    Idle,
    Active,
}

impl PrinterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrinterStatus::Idle => "idle",
            PrinterStatus::Active => "active",
        }
    }
}

impl fmt::Display for PrinterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a single snapshot, without history.
pub fn classify(snapshot: &Snapshot) -> PrinterStatus {
    let positive = |key: &str| snapshot.int(key).is_some_and(|v| v > 0);

    let active = (positive("printProgress") && positive("leftTime"))
        || positive("printJobTime")
        || positive("printLeftTime")
        || positive("layer")
        || positive("gcodeState");

    if active {
        PrinterStatus::Active
    } else {
        PrinterStatus::Idle
    }
}

/// Outcome of one status evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusDecision {
    /// Status after hysteresis.
    pub status: PrinterStatus,
    /// Whether the status should be emitted now.
    pub publish: bool,
}

#[derive(Debug, Default)]
struct StatusState {
    last_status: Option<PrinterStatus>,
    last_published: Option<Instant>,
    last_active: Option<Instant>,
}

/// Hysteresis and emission state for the printer status.
#[derive(Debug, Default)]
pub struct StatusTracker {
    state: Mutex<StatusState>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate a snapshot at `now`.
    ///
    /// An idle classification within [`STATUS_WINDOW`] of the last active
    /// signal is held active while the last emitted status is active. The
    /// status is emitted when it changes or when the window has elapsed since
    /// the last emission.
    pub fn evaluate(&self, snapshot: &Snapshot, now: Instant) -> StatusDecision {
        let mut status = classify(snapshot);
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if status == PrinterStatus::Active {
            state.last_active = Some(now);
        } else if state
            .last_active
            .is_some_and(|t| now.saturating_duration_since(t) < STATUS_WINDOW)
            && state.last_status == Some(PrinterStatus::Active)
        {
            status = PrinterStatus::Active;
        }

        let publish = state.last_status != Some(status)
            || state
                .last_published
                .is_none_or(|t| now.saturating_duration_since(t) >= STATUS_WINDOW);

        if publish {
            state.last_status = Some(status);
            state.last_published = Some(now);
        }

        StatusDecision { status, publish }
    }

    /// Derive status messages: `printer_status` when due, `tf_card_present`,
    /// and the camera activity flag `video` as `1`/`0`.
    pub fn derive(
        &self,
        snapshot: &Snapshot,
        topics: &TopicBuilder,
        now: Instant,
    ) -> Vec<OutboundMessage> {
        let mut out = Vec::with_capacity(3);

        let decision = self.evaluate(snapshot, now);
        if decision.publish {
            out.push(OutboundMessage::event(
                topics.data("printer_status"),
                decision.status.as_str(),
            ));
        }

        if let Some(tf_card) = snapshot.int("tfCard") {
            out.push(OutboundMessage::event(
                topics.data("tf_card_present"),
                (tf_card == 1).to_string(),
            ));
        }

        // `video` is excluded from generic mapping, so the flag is derived here.
        if let Some(video) = snapshot.int("video") {
            out.push(OutboundMessage::event(
                topics.data("video"),
                u8::from(video > 0).to_string(),
            ));
        }

        out
    }
}
