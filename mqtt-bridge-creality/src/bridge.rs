//! Bridge orchestrator.
//!
//! Ties the printer session to the publish gateway. The first decodable
//! snapshot fixes the device identity, cleans up retired entities and
//! publishes the discovery catalog. Every snapshot is then normalized and
//! derived into data topics.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use printsight_bridge_framework::{
    BrokerSink, InboundMessage, MqttSink, PublishStats, Publisher, TopicBuilder,
};
use printsight_common::{ONLINE, OutboundMessage};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::commands::LightCommand;
use crate::derive::{StatusTracker, cfs, derive_messages};
use crate::discovery::{build_catalog, build_cfs_descriptors, build_cleanup};
use crate::identity::DeviceIdentity;
use crate::session::{MessageHandler, SessionError, SessionHandle};
use crate::snapshot::Snapshot;

/// Outbound control path to the printer.
pub trait ControlChannel: Send + Sync + 'static {
    /// Send a control message without waiting.
    fn send_control(&self, message: String) -> Result<(), SessionError>;
}

impl ControlChannel for SessionHandle {
    fn send_control(&self, message: String) -> Result<(), SessionError> {
        self.send(message)
    }
}

/// Identity and catalog, fixed by the first snapshot.
struct Discovery {
    identity: DeviceIdentity,
    catalog: Arc<[OutboundMessage]>,
}

/// The Creality bridge.
pub struct CrealityBridge<S: BrokerSink = MqttSink, C: ControlChannel = SessionHandle> {
    publisher: Publisher<S>,
    control: C,
    topics: TopicBuilder,
    device_name: Option<String>,
    printer_address: Option<String>,
    discovery: Mutex<Option<Discovery>>,
    cfs_published: Mutex<HashSet<i64>>,
    status: StatusTracker,
}

impl<S: BrokerSink, C: ControlChannel> CrealityBridge<S, C> {
    pub fn new(publisher: Publisher<S>, control: C, topics: TopicBuilder) -> Self {
        Self {
            publisher,
            control,
            topics,
            device_name: None,
            printer_address: None,
            discovery: Mutex::new(None),
            cfs_published: Mutex::new(HashSet::new()),
            status: StatusTracker::new(),
        }
    }

    /// Override the device name reported by the printer.
    pub fn with_device_name(mut self, name: Option<String>) -> Self {
        self.device_name = name;
        self
    }

    /// Set the printer address used for the camera entities.
    pub fn with_printer_address(mut self, address: Option<String>) -> Self {
        self.printer_address = address;
        self
    }

    pub fn topics(&self) -> &TopicBuilder {
        &self.topics
    }

    pub fn publisher(&self) -> &Publisher<S> {
        &self.publisher
    }

    /// Device identity, once the first snapshot has been seen.
    pub fn identity(&self) -> Option<DeviceIdentity> {
        self.discovery
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|d| d.identity.clone())
    }

    /// Handle one raw printer message.
    pub async fn handle_snapshot(&self, data: &[u8]) {
        self.handle_snapshot_at(data, Instant::now()).await
    }

    pub(crate) async fn handle_snapshot_at(&self, data: &[u8], now: Instant) {
        let snapshot = match Snapshot::parse(data) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, size = data.len(), "Discarding undecodable printer message");
                return;
            }
        };
        debug!(keys = snapshot.len(), "Received printer snapshot");

        if let Some(identity) = self.ensure_discovery(&snapshot).await {
            self.publish_cfs_discovery(&identity, &snapshot).await;
        }

        let messages = derive_messages(&snapshot, &self.topics, &self.status, now);
        let stats = self.publisher.publish_batch(&messages).await;
        debug!(
            messages = messages.len(),
            sent = stats.sent,
            coalesced = stats.coalesced,
            dropped = stats.dropped,
            "Published snapshot"
        );
    }

    /// Build the discovery state on the first snapshot and publish it.
    async fn ensure_discovery(&self, snapshot: &Snapshot) -> Option<DeviceIdentity> {
        let identity = {
            let mut guard = self
                .discovery
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(discovery) = guard.as_ref() {
                return Some(discovery.identity.clone());
            }

            let identity = DeviceIdentity::from_snapshot(
                snapshot,
                self.device_name.as_deref(),
                self.printer_address.clone(),
            );
            let catalog = match build_catalog(&identity, &self.topics) {
                Ok(catalog) => catalog,
                Err(e) => {
                    error!(error = %e, "Failed to build discovery catalog");
                    return None;
                }
            };
            *guard = Some(Discovery {
                identity: identity.clone(),
                catalog: catalog.into(),
            });
            identity
        };

        info!(device = %identity, "Printer detected");

        let cleanup = build_cleanup(&identity, &self.topics);
        if !cleanup.is_empty() {
            info!(count = cleanup.len(), "Removing retired entities");
            self.publisher.publish_batch(&cleanup).await;
        }

        self.republish_discovery().await;
        Some(identity)
    }

    /// Publish discovery for a CFS box the first time it is seen.
    async fn publish_cfs_discovery(&self, identity: &DeviceIdentity, snapshot: &Snapshot) {
        let Some(box_id) = cfs::box_id(snapshot).filter(|&id| id > 0) else {
            return;
        };

        let first_seen = self
            .cfs_published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(box_id);
        if !first_seen {
            return;
        }

        match build_cfs_descriptors(identity, &self.topics, box_id) {
            Ok(messages) => {
                info!(box_id, "Publishing CFS discovery");
                self.publisher.publish_batch(&messages).await;
            }
            Err(e) => error!(box_id, error = %e, "Failed to build CFS discovery"),
        }
    }

    /// Publish the cached discovery catalog.
    ///
    /// Does nothing until the first snapshot has been handled.
    pub async fn republish_discovery(&self) -> PublishStats {
        let catalog = self
            .discovery
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|d| d.catalog.clone());

        let Some(catalog) = catalog else {
            debug!("No discovery catalog yet");
            return PublishStats::default();
        };

        info!(count = catalog.len(), "Publishing discovery");
        let stats = self.publisher.publish_batch(catalog.iter()).await;
        if stats.sent < catalog.len() as u64 {
            warn!(
                sent = stats.sent,
                dropped = stats.dropped,
                failed = stats.failed,
                "Discovery partially published"
            );
        }
        stats
    }

    /// Route a message received on one of the bridge subscriptions.
    pub async fn handle_inbound(&self, message: &InboundMessage) {
        if message.topic == self.topics.platform_status() {
            if message.payload == ONLINE {
                info!("Home Assistant came online, republishing discovery");
                self.republish_discovery().await;
            } else {
                debug!(status = %message.payload, "Home Assistant status changed");
            }
        } else if message.topic == self.topics.light_command() {
            self.handle_light_command(&message.payload);
        } else {
            debug!(topic = %message.topic, "Ignoring message on unexpected topic");
        }
    }

    fn handle_light_command(&self, payload: &str) {
        let Some(command) = LightCommand::parse(payload) else {
            warn!(payload = %payload, "Invalid light command payload");
            return;
        };

        let message = command.to_ws_message();
        match self.control.send_control(message.clone()) {
            Ok(()) => info!(command = %message, "Sent light command to printer"),
            Err(e) => error!(error = %e, "Failed to send light command to printer"),
        }
    }
}

impl<S: BrokerSink, C: ControlChannel> MessageHandler for CrealityBridge<S, C> {
    async fn handle(&self, data: &[u8]) {
        self.handle_snapshot(data).await
    }
}
