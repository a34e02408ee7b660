//! One-shot administrative commands.

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use printsight_bridge_framework::{BridgeError, MqttSink, PublishStats, Publisher, connect};
use rumqttc::{Event, Outgoing};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::CrealityBridgeConfig;
use crate::discovery::build_purge;
use crate::identity::{DeviceIdentity, printer_address_from_url};
use crate::session::{MessageHandler, Session};
use crate::snapshot::Snapshot;

/// How long `device-info` waits for a decodable snapshot.
const DEVICE_INFO_TIMEOUT: Duration = Duration::from_secs(30);

/// How long the purge may take to flush before the connection is dropped.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Delete every known discovery entity of `device_id`.
///
/// Uses its own client id and no last will, so a running bridge is not
/// disturbed.
pub async fn run_cleanup(
    config: &CrealityBridgeConfig,
    device_id: &str,
) -> Result<PublishStats, BridgeError> {
    let mut mqtt = config.mqtt.clone();
    mqtt.client_id = format!("{}_cleanup", mqtt.client_id);

    let (client, mut eventloop) = connect(&mqtt, None).await?;

    let driver = tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "MQTT connection lost during cleanup");
                    break;
                }
            }
        }
    });

    let publisher = Publisher::new(
        MqttSink::new(client.clone(), Arc::new(AtomicBool::new(true))),
        Duration::ZERO,
    );

    let messages = build_purge(device_id, &config.topics());
    info!(device_id = %device_id, count = messages.len(), "Removing discovery entities");
    let stats = publisher.publish_batch(&messages).await;

    if let Err(e) = client.disconnect().await {
        warn!(error = %e, "Error disconnecting from MQTT broker");
    }
    if tokio::time::timeout(FLUSH_TIMEOUT, driver).await.is_err() {
        debug!("MQTT event loop did not finish in time");
    }

    Ok(stats)
}

/// Keeps the first decodable snapshot and stops the session.
struct FirstSnapshot {
    slot: Mutex<Option<Snapshot>>,
    done: CancellationToken,
}

impl MessageHandler for FirstSnapshot {
    async fn handle(&self, data: &[u8]) {
        match Snapshot::parse(data) {
            Ok(snapshot) => {
                self.slot
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .get_or_insert(snapshot);
                self.done.cancel();
            }
            Err(e) => debug!(error = %e, "Skipping undecodable printer message"),
        }
    }
}

/// Connect to the printer and derive its identity from the first snapshot.
pub async fn fetch_device_info(config: &CrealityBridgeConfig) -> anyhow::Result<DeviceIdentity> {
    let ws_url = config.creality.ws_url.trim();
    let session = Session::new(
        ws_url,
        Duration::from_secs(config.creality.reconnect_delay_secs),
    );
    let handler = FirstSnapshot {
        slot: Mutex::new(None),
        done: CancellationToken::new(),
    };

    let run = session.run(&handler, handler.done.clone());
    match tokio::time::timeout(DEVICE_INFO_TIMEOUT, run).await {
        Ok(result) => result?,
        Err(_) => anyhow::bail!(
            "No snapshot from {} within {}s",
            ws_url,
            DEVICE_INFO_TIMEOUT.as_secs()
        ),
    }

    let snapshot = handler
        .slot
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    let Some(snapshot) = snapshot else {
        anyhow::bail!("Printer session ended before a snapshot arrived");
    };

    Ok(DeviceIdentity::from_snapshot(
        &snapshot,
        config.device_name(),
        printer_address_from_url(ws_url),
    ))
}
