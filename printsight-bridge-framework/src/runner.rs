//! Bridge runner for lifecycle management.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, Outgoing, Packet, Publish, QoS,
};
use tokio::signal;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use printsight_common::{MqttConfig, init_tracing, mqtt_options};

use crate::BridgeArgs;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::publisher::{PublishOutcome, Publisher};
use crate::sink::MqttSink;
use crate::status::StatusPublisher;

/// How long to wait for the broker's CONNACK at startup.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Pause between reconnection attempts after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Request channel capacity of the MQTT client.
const CLIENT_CAPACITY: usize = 64;

/// Buffered inbound messages before new ones are dropped.
const INBOUND_CAPACITY: usize = 64;

/// How long the event loop may take to flush the final disconnect.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// A message received on one of the bridge's subscriptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Topic the message arrived on.
    pub topic: String,
    /// Payload, decoded lossily as UTF-8.
    pub payload: String,
}

impl From<&Publish> for InboundMessage {
    fn from(publish: &Publish) -> Self {
        Self {
            topic: publish.topic.clone(),
            payload: String::from_utf8_lossy(&publish.payload).into_owned(),
        }
    }
}

/// Bridge runner that manages the lifecycle of an MQTT bridge.
///
/// Handles:
/// - Logging initialization
/// - Broker connection with a retained `offline` last will
/// - Availability publishing (`online` at start, `offline` at shutdown)
/// - Subscriptions, re-established after every reconnect
/// - Task spawning with cooperative cancellation
/// - Graceful shutdown on Ctrl+C or when a critical worker fails
///
/// # Example
///
/// ```ignore
/// use printsight_bridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let args = BridgeArgs::parse();
///     let config = MyBridgeConfig::load_or_default(&args, "mybridge.json5")?;
///
///     let mut runner = BridgeRunner::new_with_args("mybridge", config, Some(&args)).await?;
///
///     let publisher = runner.publisher();
///     let shutdown = runner.shutdown_token();
///     runner.spawn(async move {
///         shutdown.cancelled().await;
///     });
///
///     runner.run().await?;
///     Ok(())
/// }
/// ```
pub struct BridgeRunner<C: BridgeConfig> {
    /// Bridge name for logging.
    name: String,
    /// Bridge version.
    version: String,
    /// The loaded configuration.
    config: C,
    /// Rate-limited publish gateway.
    publisher: Publisher<MqttSink>,
    /// Availability publisher.
    status: StatusPublisher<MqttSink>,
    /// Topics to (re)subscribe on every CONNACK.
    subscriptions: Arc<Mutex<Vec<String>>>,
    /// Receiving end for subscribed messages, until taken.
    inbound: Option<mpsc::Receiver<InboundMessage>>,
    /// Cancelled on shutdown.
    shutdown: CancellationToken,
    /// First critical worker failure.
    failure: Arc<Mutex<Option<String>>>,
    /// Task polling the MQTT event loop.
    driver: JoinHandle<()>,
    /// Spawned tasks.
    tasks: Vec<JoinHandle<()>>,
}

impl<C: BridgeConfig> BridgeRunner<C> {
    /// Create a new bridge runner.
    ///
    /// This will:
    /// 1. Initialize logging based on config
    /// 2. Connect to the broker, failing if no CONNACK arrives in time
    /// 3. Create the publish gateway
    pub async fn new(name: impl Into<String>, config: C) -> Result<Self> {
        Self::new_with_args(name, config, None).await
    }

    /// Create a new bridge runner with CLI args for log level override.
    pub async fn new_with_args(
        name: impl Into<String>,
        config: C,
        args: Option<&BridgeArgs>,
    ) -> Result<Self> {
        let name = name.into();
        let version = env!("CARGO_PKG_VERSION").to_string();

        // Initialize logging with optional CLI override
        let log_config = match args {
            Some(args) => args.logging_config(config.logging()),
            None => config.logging().clone(),
        };

        init_tracing(&log_config)?;

        tracing::info!(bridge = %name, version = %version, "Starting bridge");

        let availability = config.availability_topic();
        let (client, eventloop) = connect(config.mqtt(), Some(&availability)).await?;

        let connected = Arc::new(AtomicBool::new(true));
        let subscriptions = Arc::new(Mutex::new(Vec::new()));
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);

        let driver = tokio::spawn(drive_event_loop(
            eventloop,
            client.clone(),
            connected.clone(),
            subscriptions.clone(),
            inbound_tx,
        ));

        let publisher = Publisher::new(
            MqttSink::new(client, connected),
            Duration::from_secs(config.mqtt().min_interval_secs),
        );
        let status = StatusPublisher::new(publisher.clone(), availability);

        Ok(Self {
            name,
            version,
            config,
            publisher,
            status,
            subscriptions,
            inbound: Some(inbound_rx),
            shutdown: CancellationToken::new(),
            failure: Arc::new(Mutex::new(None)),
            driver,
            tasks: Vec::new(),
        })
    }

    /// Get the bridge name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the bridge version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &C {
        &self.config
    }

    /// Get a clone of the publish gateway.
    pub fn publisher(&self) -> Publisher<MqttSink> {
        self.publisher.clone()
    }

    /// Get a clone of the shutdown token.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Take the receiver for messages on subscribed topics.
    ///
    /// Returns `None` after the first call.
    pub fn take_inbound(&mut self) -> Option<mpsc::Receiver<InboundMessage>> {
        self.inbound.take()
    }

    /// Subscribe to a topic. The subscription is restored after reconnects.
    pub async fn subscribe(&self, topic: impl Into<String>) -> Result<()> {
        let topic = topic.into();

        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(topic.clone());

        self.publisher
            .sink()
            .client()
            .subscribe(&topic, QoS::AtMostOnce)
            .await
            .map_err(|e| BridgeError::Subscribe {
                topic: topic.clone(),
                message: e.to_string(),
            })?;

        tracing::debug!(topic = %topic, "Subscribed");
        Ok(())
    }

    /// Publish `online` availability now.
    ///
    /// Call before starting workers that publish, so data never precedes the
    /// birth message. [`run`](Self::run) does not repeat it. Returns `None`
    /// when `online` was already sent.
    pub async fn announce_online(&self) -> Option<PublishOutcome> {
        self.status.ensure_online().await
    }

    /// Spawn a worker task.
    ///
    /// Workers are expected to observe the [shutdown token](Self::shutdown_token)
    /// and return once it is cancelled.
    pub fn spawn<F>(&mut self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        self.tasks.push(handle);
    }

    /// Spawn a worker whose failure stops the bridge.
    ///
    /// An error is logged, recorded, and cancels the shutdown token;
    /// [`run`](Self::run) then returns it after cleanup.
    pub fn spawn_critical<F, E>(&mut self, name: impl Into<String>, future: F)
    where
        F: Future<Output = std::result::Result<(), E>> + Send + 'static,
        E: std::fmt::Display + Send + 'static,
    {
        let name = name.into();
        let shutdown = self.shutdown.clone();
        let failure = self.failure.clone();

        let handle = tokio::spawn(async move {
            if let Err(e) = future.await {
                tracing::error!(worker = %name, error = %e, "Worker failed");
                failure
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .get_or_insert_with(|| format!("{}: {}", name, e));
                shutdown.cancel();
            }
        });
        self.tasks.push(handle);
    }

    /// Run the bridge until Ctrl+C is received or a critical worker fails.
    ///
    /// This will:
    /// 1. Publish `online` availability, unless already announced
    /// 2. Wait for Ctrl+C or cancellation
    /// 3. Cancel the shutdown token and wait for every worker to return
    /// 4. Publish `offline` availability
    /// 5. Disconnect from the broker
    pub async fn run(mut self) -> Result<()> {
        self.status.ensure_online().await;

        tracing::info!(
            bridge = %self.name,
            tasks = self.tasks.len(),
            "Bridge running. Press Ctrl+C to stop."
        );

        let ctrl_c = async {
            match signal::ctrl_c().await {
                Ok(()) => tracing::info!("Received shutdown signal"),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                    std::future::pending::<()>().await;
                }
            }
        };

        tokio::select! {
            _ = ctrl_c => {}
            _ = self.shutdown.cancelled() => {
                tracing::info!(bridge = %self.name, "Shutdown requested");
            }
        }

        self.shutdown.cancel();

        for task in self.tasks.drain(..) {
            match task.await {
                Err(e) if e.is_panic() => tracing::error!(error = %e, "Worker panicked"),
                _ => {}
            }
        }

        let stats = self.publisher.stats();
        tracing::info!(
            sent = stats.sent,
            coalesced = stats.coalesced,
            dropped = stats.dropped,
            failed = stats.failed,
            "Publish statistics"
        );

        self.status.publish_offline().await;

        if let Err(e) = self.publisher.sink().client().disconnect().await {
            tracing::warn!(error = %e, "Error disconnecting from MQTT broker");
        }

        if tokio::time::timeout(DRAIN_TIMEOUT, &mut self.driver)
            .await
            .is_err()
        {
            tracing::debug!("MQTT event loop did not finish in time");
            self.driver.abort();
        }

        tracing::info!(bridge = %self.name, "Goodbye!");

        let failure = self
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match failure {
            Some(message) => Err(BridgeError::Worker(message)),
            None => Ok(()),
        }
    }
}

/// Connect to the broker and wait for its CONNACK.
///
/// The returned event loop must be polled for the client to make progress.
/// With `will_topic` set, a retained `offline` last will is registered.
pub async fn connect(
    config: &MqttConfig,
    will_topic: Option<&str>,
) -> Result<(AsyncClient, EventLoop)> {
    let options = mqtt_options(config, will_topic)?;
    let (client, mut eventloop) = AsyncClient::new(options, CLIENT_CAPACITY);

    wait_for_connack(&mut eventloop).await?;

    tracing::info!(broker = %config.broker, client_id = %config.client_id, "Connected to MQTT broker");
    Ok((client, eventloop))
}

/// Wait for the broker to acknowledge the connection, bounded by [`CONNECT_TIMEOUT`].
async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<()> {
    tokio::time::timeout(CONNECT_TIMEOUT, poll_until_connack(eventloop))
        .await
        .map_err(|_| {
            BridgeError::BrokerConnection(format!(
                "No CONNACK within {}s",
                CONNECT_TIMEOUT.as_secs()
            ))
        })?
}

async fn poll_until_connack(eventloop: &mut EventLoop) -> Result<()> {
    loop {
        if let Event::Incoming(Packet::ConnAck(ack)) = eventloop.poll().await? {
            if ack.code == ConnectReturnCode::Success {
                return Ok(());
            }
            return Err(BridgeError::BrokerConnection(format!(
                "Broker refused connection: {:?}",
                ack.code
            )));
        }
    }
}

/// Drive the MQTT event loop for the lifetime of the bridge.
///
/// rumqttc reconnects on the next poll after an error. The loop ends once
/// the client's disconnect request has been sent.
async fn drive_event_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    connected: Arc<AtomicBool>,
    subscriptions: Arc<Mutex<Vec<String>>>,
    inbound: mpsc::Sender<InboundMessage>,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                connected.store(true, Ordering::SeqCst);
                tracing::info!("Reconnected to MQTT broker");

                let topics = subscriptions
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                for topic in topics {
                    // Non-blocking: this task is the one draining the request queue.
                    if let Err(e) = client.try_subscribe(&topic, QoS::AtMostOnce) {
                        tracing::warn!(topic = %topic, error = %e, "Failed to resubscribe");
                    }
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                match inbound.try_send(InboundMessage::from(&publish)) {
                    Ok(()) => {}
                    Err(TrySendError::Full(message)) => {
                        tracing::warn!(topic = %message.topic, "Inbound queue full, dropping message");
                    }
                    Err(TrySendError::Closed(_)) => {}
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                connected.store(false, Ordering::SeqCst);
                tracing::debug!("MQTT disconnect sent");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                if connected.swap(false, Ordering::SeqCst) {
                    tracing::warn!(error = %e, "MQTT connection lost");
                } else {
                    tracing::debug!(error = %e, "MQTT reconnect failed");
                }
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}
