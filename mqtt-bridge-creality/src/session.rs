//! Printer WebSocket session.
//!
//! The session owns the connection to the printer and feeds every inbound
//! message to a single handler, one at a time. The first connection attempt
//! must succeed; after that, connection losses are retried forever with a
//! fixed delay until the session is cancelled.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound on the WebSocket handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Control messages buffered for the live connection.
const OUTBOUND_CAPACITY: usize = 16;

/// Session errors.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: tungstenite::Error,
    },

    #[error("Timed out connecting to {url}")]
    ConnectTimeout { url: String },

    #[error("WebSocket error: {0}")]
    Transport(#[from] tungstenite::Error),

    #[error("Not connected to the printer")]
    NotConnected,

    #[error("Outbound queue is full")]
    SendQueueFull,

    #[error("Session cancelled")]
    Cancelled,
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Closing => "closing",
        };
        f.write_str(s)
    }
}

/// Receiver of inbound printer messages.
pub trait MessageHandler: Send + Sync {
    /// Handle one message. The next message is read only after this returns.
    fn handle(&self, data: &[u8]) -> impl Future<Output = ()> + Send;
}

struct Shared {
    state: Mutex<SessionState>,
    outbound: Mutex<Option<mpsc::Sender<String>>>,
}

impl Shared {
    fn set_state(&self, state: SessionState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_outbound(&self, sender: Option<mpsc::Sender<String>>) {
        *self.outbound.lock().unwrap_or_else(PoisonError::into_inner) = sender;
    }
}

/// Cloneable handle for sending control messages on the live connection.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<Shared>,
}

impl SessionHandle {
    /// Queue a text message for the printer.
    ///
    /// Fails without waiting when no connection is established.
    pub fn send(&self, text: impl Into<String>) -> Result<(), SessionError> {
        let guard = self
            .shared
            .outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let sender = guard.as_ref().ok_or(SessionError::NotConnected)?;
        sender.try_send(text.into()).map_err(|e| match e {
            TrySendError::Full(_) => SessionError::SendQueueFull,
            TrySendError::Closed(_) => SessionError::NotConnected,
        })
    }

    /// Current connection state.
    pub fn state(&self) -> SessionState {
        self.shared.state()
    }
}

/// Long-lived printer session.
pub struct Session {
    url: String,
    retry_delay: Duration,
    shared: Arc<Shared>,
}

impl Session {
    /// Create a disconnected session.
    pub fn new(url: impl Into<String>, retry_delay: Duration) -> Self {
        Self {
            url: url.into(),
            retry_delay,
            shared: Arc::new(Shared {
                state: Mutex::new(SessionState::Disconnected),
                outbound: Mutex::new(None),
            }),
        }
    }

    /// Get a handle for sending control messages.
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            shared: self.shared.clone(),
        }
    }

    /// Current connection state.
    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Run until cancelled.
    ///
    /// Returns an error only when the very first connection attempt fails.
    /// Cancellation closes the active connection and returns `Ok(())`.
    pub async fn run<H: MessageHandler>(
        &self,
        handler: &H,
        cancel: CancellationToken,
    ) -> Result<(), SessionError> {
        let mut connected_once = false;

        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }

            self.shared.set_state(SessionState::Connecting);
            match self.connect(&cancel).await {
                Ok(ws) => {
                    connected_once = true;
                    self.shared.set_state(SessionState::Connected);
                    info!(url = %self.url, "Connected to printer");

                    let result = self.serve(ws, handler, &cancel).await;
                    self.shared.set_outbound(None);
                    self.shared.set_state(SessionState::Disconnected);

                    if cancel.is_cancelled() {
                        info!(url = %self.url, "Printer session closed");
                        return Ok(());
                    }
                    match result {
                        Ok(()) => warn!(url = %self.url, "Printer closed the connection"),
                        Err(e) => warn!(url = %self.url, error = %e, "Printer connection lost"),
                    }
                }
                Err(SessionError::Cancelled) => {
                    self.shared.set_state(SessionState::Disconnected);
                    return Ok(());
                }
                Err(e) => {
                    self.shared.set_state(SessionState::Disconnected);
                    if !connected_once {
                        return Err(e);
                    }
                    warn!(
                        error = %e,
                        retry_in_secs = self.retry_delay.as_secs(),
                        "Printer reconnect failed"
                    );
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(self.retry_delay) => {}
            }
        }
    }

    async fn connect(&self, cancel: &CancellationToken) -> Result<WsStream, SessionError> {
        debug!(url = %self.url, "Connecting to printer");

        tokio::select! {
            _ = cancel.cancelled() => Err(SessionError::Cancelled),
            result = tokio::time::timeout(HANDSHAKE_TIMEOUT, connect_async(self.url.as_str())) => {
                match result {
                    Ok(Ok((ws, _response))) => Ok(ws),
                    Ok(Err(source)) => Err(SessionError::Connect {
                        url: self.url.clone(),
                        source,
                    }),
                    Err(_) => Err(SessionError::ConnectTimeout {
                        url: self.url.clone(),
                    }),
                }
            }
        }
    }

    /// Pump one connection until it closes, fails or is cancelled.
    async fn serve<H: MessageHandler>(
        &self,
        mut ws: WsStream,
        handler: &H,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        let (tx, mut rx) = mpsc::channel(OUTBOUND_CAPACITY);
        self.shared.set_outbound(Some(tx));

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.shared.set_state(SessionState::Closing);
                    if let Err(e) = ws.close(None).await {
                        debug!(error = %e, "Error closing printer connection");
                    }
                    return Ok(());
                }
                Some(text) = rx.recv() => {
                    debug!(message = %text, "Sending to printer");
                    ws.send(Message::Text(text.into())).await?;
                }
                message = ws.next() => match message {
                    Some(Ok(Message::Text(text))) => handler.handle(text.as_bytes()).await,
                    Some(Ok(Message::Binary(data))) => handler.handle(&data).await,
                    Some(Ok(Message::Close(frame))) => {
                        debug!(frame = ?frame, "Close frame from printer");
                        return Ok(());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                    None => return Ok(()),
                },
            }
        }
    }
}
