use std::fmt;

/// A single broker publish produced by a bridge.
///
/// Retained messages carry durable state (discovery descriptors, availability,
/// derived "current value" caches). Non-retained messages are event-stream
/// updates and are subject to per-topic throttling.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutboundMessage {
    /// Full topic the message is published to.
    pub topic: String,

    /// UTF-8 payload. An empty payload on a retained discovery topic deletes the entity.
    pub payload: String,

    /// Whether the broker should retain the message.
    pub retain: bool,
}

impl OutboundMessage {
    /// Create a non-retained event message.
    pub fn event(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            retain: false,
        }
    }

    /// Create a retained message.
    pub fn retained(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            retain: true,
        }
    }

    /// Create a retained empty message, the deletion signal for discovery topics.
    pub fn delete(topic: impl Into<String>) -> Self {
        Self::retained(topic, String::new())
    }

    /// Whether this is a retained deletion.
    pub fn is_delete(&self) -> bool {
        self.retain && self.payload.is_empty()
    }
}

impl fmt::Display for OutboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={:?}", self.topic, self.payload)?;
        if self.retain {
            write!(f, " (retained)")?;
        }
        Ok(())
    }
}
