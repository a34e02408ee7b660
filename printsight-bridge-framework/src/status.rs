//! Bridge availability reporting.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use printsight_common::{OFFLINE, ONLINE};

use crate::publisher::{PublishOutcome, Publisher};
use crate::sink::BrokerSink;

/// Availability state of a bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    /// The bridge is running.
    Online,
    /// The bridge has stopped (or died, via the last will).
    Offline,
}

impl Availability {
    /// Wire payload for this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::Online => ONLINE,
            Availability::Offline => OFFLINE,
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Helper to publish bridge availability on startup and shutdown.
///
/// Availability is retained so late subscribers see the current state.
pub struct StatusPublisher<S: BrokerSink> {
    publisher: Publisher<S>,
    topic: String,
    /// Set once `online` has reached the broker, cleared by `offline`.
    online: AtomicBool,
}

impl<S: BrokerSink> StatusPublisher<S> {
    /// Create a new status publisher for the given availability topic.
    pub fn new(publisher: Publisher<S>, topic: impl Into<String>) -> Self {
        Self {
            publisher,
            topic: topic.into(),
            online: AtomicBool::new(false),
        }
    }

    /// Availability topic.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Whether `online` is the last state handed to the broker.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    /// Publish an availability state.
    pub async fn publish(&self, availability: Availability) -> PublishOutcome {
        tracing::debug!(topic = %self.topic, state = %availability, "Publishing availability");
        let outcome = self
            .publisher
            .publish(&self.topic, availability.as_str(), true)
            .await;

        let online =
            availability == Availability::Online && matches!(outcome, PublishOutcome::Sent(_));
        self.online.store(online, Ordering::Release);
        outcome
    }

    /// Publish `online` unless it has already been sent.
    pub async fn ensure_online(&self) -> Option<PublishOutcome> {
        if self.is_online() {
            return None;
        }
        Some(self.publish_online().await)
    }

    /// Publish "online".
    pub async fn publish_online(&self) -> PublishOutcome {
        self.publish(Availability::Online).await
    }

    /// Publish "offline".
    pub async fn publish_offline(&self) -> PublishOutcome {
        self.publish(Availability::Offline).await
    }
}
