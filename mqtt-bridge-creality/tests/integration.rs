//! Integration tests for the Creality bridge.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use mqtt_bridge_creality::discovery::{build_catalog, build_cfs_descriptors};
use mqtt_bridge_creality::{
    ControlChannel, CrealityBridge, DeviceIdentity, MessageHandler, Session, SessionError,
    SessionState,
};
use printsight_bridge_framework::{InboundMessage, MemorySink, Publisher, TopicBuilder};

const SCENARIO: &str =
    r#"{"nozzleTemp":"219.900000","printProgress":50,"printLeftTime":600,"tfCard":1}"#;

#[derive(Clone, Default)]
struct NullControl {
    sent: Arc<Mutex<Vec<String>>>,
}

impl ControlChannel for NullControl {
    fn send_control(&self, message: String) -> Result<(), SessionError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

fn topics() -> TopicBuilder {
    TopicBuilder::new("p/k1", "homeassistant")
}

fn memory_bridge(sink: &MemorySink) -> CrealityBridge<MemorySink, NullControl> {
    CrealityBridge::new(
        Publisher::new(sink.clone(), Duration::ZERO),
        NullControl::default(),
        topics(),
    )
}

async fn wait_for(sink: &MemorySink, topic: &str) -> String {
    let poll = async {
        loop {
            if let Some(payload) = sink.last_payload(topic) {
                return payload;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), poll)
        .await
        .unwrap_or_else(|_| panic!("no message on {}", topic))
}

#[tokio::test]
async fn test_end_to_end_scenario() {
    let sink = MemorySink::new();
    let bridge = memory_bridge(&sink);

    bridge.handle_snapshot(SCENARIO.as_bytes()).await;

    let expect = [
        ("p/k1/temperature/nozzle/current", "219.900"),
        ("p/k1/nozzle_temp", "219.900"),
        ("p/k1/printing", "true"),
        ("p/k1/tf_card_present", "true"),
        ("p/k1/job/progress", "50"),
        ("p/k1/job/left_time", "600"),
        ("p/k1/printer_status", "active"),
    ];
    for (topic, payload) in expect {
        assert_eq!(
            sink.last_payload(topic).as_deref(),
            Some(payload),
            "{}",
            topic
        );
    }

    let messages = sink.messages();
    let data: Vec<_> = messages
        .iter()
        .filter(|m| !m.topic.ends_with("/config"))
        .collect();
    assert!(data.iter().all(|m| !m.retain));
}

#[tokio::test]
async fn test_progress_coercion() {
    for progress in ["50", r#""50""#, "50.0"] {
        let sink = MemorySink::new();
        let bridge = memory_bridge(&sink);
        let data = format!(r#"{{"printProgress":{},"printLeftTime":10}}"#, progress);

        bridge.handle_snapshot(data.as_bytes()).await;
        assert_eq!(sink.last_payload("p/k1/printing").as_deref(), Some("true"));
        assert_eq!(
            sink.last_payload("p/k1/job/progress").as_deref(),
            Some("50")
        );
    }

    let sink = MemorySink::new();
    let bridge = memory_bridge(&sink);
    bridge
        .handle_snapshot(br#"{"printProgress":"half","printLeftTime":10}"#)
        .await;
    assert_eq!(sink.last_payload("p/k1/printing").as_deref(), Some("false"));
    assert_eq!(sink.last_payload("p/k1/job/progress"), None);
}

#[tokio::test]
async fn test_throttled_bridge_coalesces() {
    let sink = MemorySink::new();
    let bridge = CrealityBridge::new(
        Publisher::new(sink.clone(), Duration::from_secs(60)),
        NullControl::default(),
        topics(),
    );

    bridge.handle_snapshot(br#"{"nozzleTemp":200}"#).await;
    bridge.handle_snapshot(br#"{"nozzleTemp":201}"#).await;

    let nozzle: Vec<_> = sink
        .messages()
        .into_iter()
        .filter(|m| m.topic == "p/k1/nozzle_temp")
        .collect();
    assert_eq!(nozzle.len(), 1);
    assert_eq!(nozzle[0].payload, "200");

    // Retained discovery is not throttled.
    assert_eq!(bridge.republish_discovery().await.sent, 13);
}

#[test]
fn test_catalog_determinism() {
    let identity = DeviceIdentity {
        id: "k1".to_string(),
        name: "K1".to_string(),
        model: "K1 SE".to_string(),
        printer_address: Some("10.0.0.7".to_string()),
    };

    let mut first = build_catalog(&identity, &topics()).unwrap();
    let mut second = build_catalog(&identity, &topics()).unwrap();
    first.sort();
    second.sort();
    assert_eq!(first, second);

    assert_eq!(
        build_cfs_descriptors(&identity, &topics(), 3).unwrap(),
        build_cfs_descriptors(&identity, &topics(), 3).unwrap()
    );
}

#[tokio::test]
async fn test_cfs_discovery_is_idempotent() {
    let sink = MemorySink::new();
    let bridge = memory_bridge(&sink);
    let data = br#"{"boxState":{"id":3,"state":1,"humidity":28.0,"temp":23.0}}"#;

    bridge.handle_snapshot(data).await;
    bridge.handle_snapshot(data).await;

    let cfs_configs: Vec<_> = sink
        .messages()
        .into_iter()
        .filter(|m| m.topic.starts_with("homeassistant/sensor/creality_printer/cfs_3_"))
        .collect();
    assert_eq!(cfs_configs.len(), 2);
    assert_eq!(
        sink.last_payload("p/k1/cfs/3/humidity").as_deref(),
        Some("28")
    );
}

#[tokio::test]
async fn test_disconnected_broker_drops() {
    let sink = MemorySink::new();
    sink.set_connected(false);
    let bridge = memory_bridge(&sink);

    bridge.handle_snapshot(SCENARIO.as_bytes()).await;

    assert!(sink.messages().is_empty());
    assert!(bridge.publisher().stats().dropped > 0);
    assert_eq!(bridge.publisher().stats().sent, 0);
}

/// Serve `snapshots` on consecutive connections and forward received text.
async fn printer(snapshots: Vec<&'static str>) -> (String, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/", listener.local_addr().unwrap());
    let (received_tx, received_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let count = snapshots.len();
        for (i, snapshot) in snapshots.into_iter().enumerate() {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.send(Message::Text(snapshot.to_string().into()))
                .await
                .unwrap();

            if i + 1 < count {
                // Drop the connection to force a reconnect.
                let _ = ws.close(None).await;
                continue;
            }

            while let Some(Ok(message)) = ws.next().await {
                if let Message::Text(text) = message {
                    let _ = received_tx.send(text.as_str().to_owned());
                }
            }
        }
    });

    (url, received_rx)
}

#[tokio::test]
async fn test_session_end_to_end() {
    let (url, mut received) = printer(vec![r#"{"nozzleTemp":"210.5"}"#, SCENARIO]).await;

    let sink = MemorySink::new();
    let session = Session::new(url, Duration::from_millis(50));
    let handle = session.handle();
    let bridge = Arc::new(CrealityBridge::new(
        Publisher::new(sink.clone(), Duration::ZERO),
        session.handle(),
        topics(),
    ));

    let cancel = CancellationToken::new();
    let task = {
        let bridge = bridge.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { session.run(bridge.as_ref(), cancel).await })
    };

    // First connection, then the reconnect after the printer closed it.
    assert_eq!(wait_for(&sink, "p/k1/nozzle_temp").await.len(), 7);
    assert_eq!(wait_for(&sink, "p/k1/tf_card_present").await, "true");
    assert_eq!(handle.state(), SessionState::Connected);

    bridge
        .handle_inbound(&InboundMessage {
            topic: "p/k1/light_sw/set".to_string(),
            payload: "ON".to_string(),
        })
        .await;

    let command = tokio::time::timeout(Duration::from_secs(5), received.recv())
        .await
        .unwrap()
        .unwrap();
    let command: serde_json::Value = serde_json::from_str(&command).unwrap();
    assert_eq!(command["method"], "set");
    assert_eq!(command["params"]["lightSw"], 1);

    cancel.cancel();
    let result = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
    tokio_test::assert_ok!(result);
    assert_eq!(handle.state(), SessionState::Disconnected);
    assert!(matches!(handle.send("{}"), Err(SessionError::NotConnected)));
}

#[derive(Clone, Default)]
struct Recorder {
    messages: Arc<Mutex<Vec<String>>>,
}

impl MessageHandler for Recorder {
    async fn handle(&self, data: &[u8]) {
        let text = String::from_utf8_lossy(data).into_owned();
        self.messages.lock().unwrap().push(text);
    }
}

impl Recorder {
    async fn wait_for_count(&self, count: usize) -> Vec<String> {
        let poll = async {
            loop {
                let messages = self.messages.lock().unwrap().clone();
                if messages.len() >= count {
                    return messages;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), poll)
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn test_session_retries_after_outage() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // One message, then the printer disappears entirely.
    let outage = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.send(Message::Text(r#"{"a":1}"#.to_string().into()))
            .await
            .unwrap();
        let _ = ws.close(None).await;
    });

    let session = Session::new(format!("ws://{}/", addr), Duration::from_millis(50));
    let handle = session.handle();
    let recorder = Recorder::default();
    let cancel = CancellationToken::new();
    let task = {
        let recorder = recorder.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { session.run(&recorder, cancel).await })
    };

    recorder.wait_for_count(1).await;
    outage.await.unwrap();

    // Reconnects are refused, but the session keeps retrying.
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(!task.is_finished());
    assert_ne!(handle.state(), SessionState::Connected);

    let listener = TcpListener::bind(addr).await.unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.send(Message::Text(r#"{"b":2}"#.to_string().into()))
            .await
            .unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    });

    let messages = recorder.wait_for_count(2).await;
    assert_eq!(messages, vec![r#"{"a":1}"#, r#"{"b":2}"#]);
    assert_eq!(handle.state(), SessionState::Connected);

    cancel.cancel();
    let result = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
    tokio_test::assert_ok!(result);
}
