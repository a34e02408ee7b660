//! Rate-limited publish gateway.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use printsight_common::OutboundMessage;
use tokio::time::Instant;

use crate::error::BridgeError;
use crate::sink::{BrokerSink, MqttSink};

/// Upper bound on a single broker hand-off.
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-topic throttle state for non-retained publishes.
///
/// Within `min_interval` of the last publish on a topic, new payloads are held
/// as pending and each replaces the previous one. The first publish after the
/// window sends the pending payload instead of the current one.
#[derive(Debug)]
pub struct ThrottleTable {
    min_interval: Duration,
    last_published: HashMap<String, Instant>,
    pending: HashMap<String, String>,
}

impl ThrottleTable {
    /// Create an empty table.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_published: HashMap::new(),
            pending: HashMap::new(),
        }
    }

    /// Minimum interval between publishes on one topic.
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Decide what to send for `topic` at `now`.
    ///
    /// Returns the payload to transmit, or `None` when the payload was
    /// held as pending. A zero interval admits everything unchanged.
    pub fn admit(&mut self, topic: &str, payload: &str, now: Instant) -> Option<String> {
        if self.min_interval.is_zero() {
            return Some(payload.to_string());
        }

        let within_window = self
            .last_published
            .get(topic)
            .is_some_and(|last| now.saturating_duration_since(*last) < self.min_interval);

        if within_window {
            self.pending.insert(topic.to_string(), payload.to_string());
            return None;
        }

        let to_send = self
            .pending
            .remove(topic)
            .unwrap_or_else(|| payload.to_string());
        self.last_published.insert(topic.to_string(), now);
        Some(to_send)
    }

    /// Pending payload for a topic, if one is held.
    pub fn pending(&self, topic: &str) -> Option<&str> {
        self.pending.get(topic).map(String::as_str)
    }

    /// Number of topics with a held payload.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

/// What happened to a single publish request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Handed to the broker. Carries the payload actually sent.
    Sent(String),
    /// Held inside the topic's throttle window.
    Coalesced,
    /// Dropped because the broker is disconnected.
    Dropped,
    /// The broker rejected the message or did not answer in time.
    Failed,
}

/// Publish counters.
///
/// Returned by [`Publisher::publish_batch`] for one batch and by
/// [`Publisher::stats`] cumulatively.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishStats {
    /// Messages handed to the broker.
    pub sent: u64,
    /// Payloads held by throttling.
    pub coalesced: u64,
    /// Messages dropped while disconnected.
    pub dropped: u64,
    /// Broker errors and timeouts.
    pub failed: u64,
}

impl PublishStats {
    /// Total number of publish requests.
    pub fn total(&self) -> u64 {
        self.sent + self.coalesced + self.dropped + self.failed
    }

    /// Share of broker hand-offs that succeeded, as a percentage.
    pub fn success_rate(&self) -> f64 {
        let attempted = self.sent + self.failed;
        if attempted == 0 {
            100.0
        } else {
            (self.sent as f64 / attempted as f64) * 100.0
        }
    }

    fn record(&mut self, outcome: &PublishOutcome) {
        match outcome {
            PublishOutcome::Sent(_) => self.sent += 1,
            PublishOutcome::Coalesced => self.coalesced += 1,
            PublishOutcome::Dropped => self.dropped += 1,
            PublishOutcome::Failed => self.failed += 1,
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    sent: AtomicU64,
    coalesced: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn record(&self, outcome: &PublishOutcome) {
        let counter = match outcome {
            PublishOutcome::Sent(_) => &self.sent,
            PublishOutcome::Coalesced => &self.coalesced,
            PublishOutcome::Dropped => &self.dropped,
            PublishOutcome::Failed => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> PublishStats {
        PublishStats {
            sent: self.sent.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Gateway every outbound message passes through.
///
/// Retained messages bypass throttling. Publish failures never propagate to
/// the caller; they are logged and counted. Clones share throttle state and
/// counters.
pub struct Publisher<S: BrokerSink = MqttSink> {
    sink: Arc<S>,
    throttle: Arc<Mutex<ThrottleTable>>,
    counters: Arc<Counters>,
}

impl<S: BrokerSink> Clone for Publisher<S> {
    fn clone(&self) -> Self {
        Self {
            sink: self.sink.clone(),
            throttle: self.throttle.clone(),
            counters: self.counters.clone(),
        }
    }
}

impl<S: BrokerSink> Publisher<S> {
    /// Create a gateway over a sink. A zero `min_interval` disables throttling.
    pub fn new(sink: S, min_interval: Duration) -> Self {
        Self {
            sink: Arc::new(sink),
            throttle: Arc::new(Mutex::new(ThrottleTable::new(min_interval))),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Get a reference to the sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Whether the broker is currently reachable.
    pub fn is_connected(&self) -> bool {
        self.sink.is_connected()
    }

    /// Cumulative counters since creation.
    pub fn stats(&self) -> PublishStats {
        self.counters.snapshot()
    }

    /// Publish a payload, applying throttling to non-retained messages.
    pub async fn publish(&self, topic: &str, payload: &str, retain: bool) -> PublishOutcome {
        self.publish_at(topic, payload, retain, Instant::now()).await
    }

    /// Publish an [`OutboundMessage`].
    pub async fn publish_message(&self, message: &OutboundMessage) -> PublishOutcome {
        self.publish(&message.topic, &message.payload, message.retain)
            .await
    }

    /// Publish a batch of messages in order.
    pub async fn publish_batch<'a, I>(&self, messages: I) -> PublishStats
    where
        I: IntoIterator<Item = &'a OutboundMessage>,
    {
        let mut stats = PublishStats::default();

        for message in messages {
            let outcome = self.publish_message(message).await;
            stats.record(&outcome);
        }

        stats
    }

    pub(crate) async fn publish_at(
        &self,
        topic: &str,
        payload: &str,
        retain: bool,
        now: Instant,
    ) -> PublishOutcome {
        if !self.sink.is_connected() {
            tracing::warn!(topic = %topic, "MQTT disconnected, dropping message");
            return self.finish(PublishOutcome::Dropped);
        }

        let to_send = if retain {
            payload.to_string()
        } else {
            let admitted = self
                .throttle
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .admit(topic, payload, now);

            match admitted {
                Some(to_send) => to_send,
                None => {
                    tracing::trace!(topic = %topic, "Throttled, holding latest payload");
                    return self.finish(PublishOutcome::Coalesced);
                }
            }
        };

        let outcome = match tokio::time::timeout(
            PUBLISH_TIMEOUT,
            self.sink.send(topic, &to_send, retain),
        )
        .await
        {
            Ok(Ok(())) => {
                tracing::trace!(topic = %topic, retain, "Published");
                PublishOutcome::Sent(to_send)
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Publish failed");
                PublishOutcome::Failed
            }
            Err(_) => {
                let e = BridgeError::PublishTimeout {
                    topic: topic.to_string(),
                };
                tracing::error!(error = %e, "Publish failed");
                PublishOutcome::Failed
            }
        };

        self.finish(outcome)
    }

    fn finish(&self, outcome: PublishOutcome) -> PublishOutcome {
        self.counters.record(&outcome);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    fn gateway(min_interval_secs: u64) -> (Publisher<MemorySink>, MemorySink) {
        let sink = MemorySink::new();
        let publisher = Publisher::new(sink.clone(), Duration::from_secs(min_interval_secs));
        (publisher, sink)
    }

    #[test]
    fn test_throttle_first_publish_admitted() {
        let mut table = ThrottleTable::new(Duration::from_secs(60));
        let now = Instant::now();
        assert_eq!(table.admit("t", "1", now), Some("1".to_string()));
        assert_eq!(table.pending_count(), 0);
    }

    #[test]
    fn test_throttle_holds_latest_pending() {
        let mut table = ThrottleTable::new(Duration::from_secs(60));
        let t0 = Instant::now();

        assert!(table.admit("t", "1", t0).is_some());
        assert!(table.admit("t", "2", t0 + Duration::from_secs(10)).is_none());
        assert!(table.admit("t", "3", t0 + Duration::from_secs(20)).is_none());
        assert_eq!(table.pending("t"), Some("3"));

        // Pending supersedes the current payload once the window has elapsed.
        let sent = table.admit("t", "4", t0 + Duration::from_secs(61));
        assert_eq!(sent, Some("3".to_string()));
        assert_eq!(table.pending("t"), None);

        // Window restarts from the last send.
        assert!(table.admit("t", "5", t0 + Duration::from_secs(62)).is_none());
    }

    #[test]
    fn test_throttle_topics_independent() {
        let mut table = ThrottleTable::new(Duration::from_secs(60));
        let now = Instant::now();

        assert!(table.admit("a", "1", now).is_some());
        assert!(table.admit("b", "1", now).is_some());
        assert!(table.admit("a", "2", now).is_none());
        assert_eq!(table.pending("b"), None);
    }

    #[test]
    fn test_throttle_zero_interval() {
        let mut table = ThrottleTable::new(Duration::ZERO);
        let now = Instant::now();
        assert_eq!(table.admit("t", "1", now), Some("1".to_string()));
        assert_eq!(table.admit("t", "2", now), Some("2".to_string()));
    }

    #[tokio::test]
    async fn test_retained_bypasses_throttle() {
        let (publisher, sink) = gateway(60);
        let now = Instant::now();

        publisher.publish_at("p/status", "online", true, now).await;
        publisher.publish_at("p/status", "offline", true, now).await;

        assert_eq!(sink.messages().len(), 2);
        assert!(sink.messages().iter().all(|m| m.retain));
    }

    #[tokio::test]
    async fn test_coalescing_sends_latest_after_window() {
        let (publisher, sink) = gateway(60);
        let t0 = Instant::now();

        assert_eq!(
            publisher.publish_at("p/x", "1", false, t0).await,
            PublishOutcome::Sent("1".to_string())
        );
        assert_eq!(
            publisher
                .publish_at("p/x", "2", false, t0 + Duration::from_secs(10))
                .await,
            PublishOutcome::Coalesced
        );
        assert_eq!(
            publisher
                .publish_at("p/x", "3", false, t0 + Duration::from_secs(20))
                .await,
            PublishOutcome::Coalesced
        );
        assert_eq!(
            publisher
                .publish_at("p/x", "4", false, t0 + Duration::from_secs(70))
                .await,
            PublishOutcome::Sent("3".to_string())
        );

        let payloads: Vec<_> = sink.messages().into_iter().map(|m| m.payload).collect();
        assert_eq!(payloads, vec!["1", "3"]);
        assert_eq!(publisher.stats().coalesced, 2);
    }

    #[tokio::test]
    async fn test_disconnected_drops() {
        let (publisher, sink) = gateway(0);
        sink.set_connected(false);

        assert_eq!(
            publisher.publish("p/x", "1", true).await,
            PublishOutcome::Dropped
        );
        assert!(sink.messages().is_empty());

        sink.set_connected(true);
        assert!(matches!(
            publisher.publish("p/x", "1", true).await,
            PublishOutcome::Sent(_)
        ));

        let stats = publisher.stats();
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.sent, 1);
    }

    #[tokio::test]
    async fn test_failure_is_counted_not_propagated() {
        let (publisher, sink) = gateway(0);
        sink.set_failing(true);

        assert_eq!(
            publisher.publish("p/x", "1", false).await,
            PublishOutcome::Failed
        );
        assert_eq!(publisher.stats().failed, 1);
    }

    #[tokio::test]
    async fn test_publish_batch() {
        let (publisher, sink) = gateway(60);
        let messages = vec![
            OutboundMessage::retained("p/a", "1"),
            OutboundMessage::event("p/b", "1"),
            OutboundMessage::event("p/b", "2"),
        ];

        let stats = publisher.publish_batch(&messages).await;
        assert_eq!(stats.sent, 2);
        assert_eq!(stats.coalesced, 1);
        assert_eq!(stats.total(), 3);
        assert_eq!(sink.messages().len(), 2);
    }

    #[test]
    fn test_publish_stats() {
        let mut stats = PublishStats::default();
        assert_eq!(stats.total(), 0);
        assert_eq!(stats.success_rate(), 100.0);

        stats.sent = 8;
        stats.failed = 2;
        stats.coalesced = 5;
        assert_eq!(stats.total(), 15);
        assert_eq!(stats.success_rate(), 80.0);
    }
}
