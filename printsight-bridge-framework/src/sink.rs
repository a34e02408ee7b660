//! Broker sinks: the transport behind the publish gateway.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use printsight_common::OutboundMessage;
use rumqttc::{AsyncClient, QoS};

use crate::error::{BridgeError, Result};

/// Destination for outbound messages.
///
/// The gateway consults [`is_connected`](Self::is_connected) before every
/// publish and drops messages while the broker is unreachable.
pub trait BrokerSink: Send + Sync + 'static {
    /// Whether the broker connection is currently up.
    fn is_connected(&self) -> bool;

    /// Hand a message to the broker.
    fn send(
        &self,
        topic: &str,
        payload: &str,
        retain: bool,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Sink backed by a rumqttc client.
///
/// The connection flag is shared with the event-loop driver, which flips it
/// on CONNACK and on connection errors.
#[derive(Clone, Debug)]
pub struct MqttSink {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
}

impl MqttSink {
    /// Create a sink over a client and its connection flag.
    pub fn new(client: AsyncClient, connected: Arc<AtomicBool>) -> Self {
        Self { client, connected }
    }

    /// Get a reference to the underlying client.
    pub fn client(&self) -> &AsyncClient {
        &self.client
    }
}

impl BrokerSink for MqttSink {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send(&self, topic: &str, payload: &str, retain: bool) -> Result<()> {
        self.client
            .publish(topic, QoS::AtMostOnce, retain, payload.as_bytes().to_vec())
            .await
            .map_err(|e| BridgeError::publish(topic, e.to_string()))
    }
}

/// In-memory sink that records every message it is handed.
///
/// Used for dry runs and tests. Clones share the same record.
#[derive(Clone, Debug)]
pub struct MemorySink {
    sent: Arc<Mutex<Vec<OutboundMessage>>>,
    connected: Arc<AtomicBool>,
    failing: Arc<AtomicBool>,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySink {
    /// Create a connected sink with an empty record.
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            connected: Arc::new(AtomicBool::new(true)),
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Toggle the reported connection state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Make every subsequent send fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Messages recorded so far, in send order.
    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drain the record.
    pub fn take(&self) -> Vec<OutboundMessage> {
        std::mem::take(&mut *self.sent.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Last payload recorded for a topic.
    pub fn last_payload(&self, topic: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .find(|m| m.topic == topic)
            .map(|m| m.payload.clone())
    }
}

impl BrokerSink for MemorySink {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send(&self, topic: &str, payload: &str, retain: bool) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(BridgeError::publish(topic, "sink is failing"));
        }

        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(OutboundMessage {
                topic: topic.to_string(),
                payload: payload.to_string(),
                retain,
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_sink_records() {
        let sink = MemorySink::new();
        sink.send("a/b", "1", false).await.unwrap();
        sink.send("a/b", "2", true).await.unwrap();

        assert_eq!(sink.messages().len(), 2);
        assert_eq!(sink.last_payload("a/b").as_deref(), Some("2"));
        assert_eq!(sink.take().len(), 2);
        assert!(sink.messages().is_empty());
    }

    #[tokio::test]
    async fn test_memory_sink_failing() {
        let sink = MemorySink::new();
        sink.set_failing(true);
        assert!(sink.send("a/b", "1", false).await.is_err());
        assert!(sink.messages().is_empty());
    }
}
