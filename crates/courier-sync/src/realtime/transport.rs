//! # Socket Transport
//!
//! Websocket client speaking Socket.IO, with automatic reconnection and
//! backoff.
//!
//! ## Connection Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Socket Connection States                             │
//! │                                                                         │
//! │  ┌────────────┐    spawn()      ┌────────────┐                         │
//! │  │Disconnected│ ──────────────► │ Connecting │  ws handshake, "0{..}", │
//! │  └────────────┘                 └─────┬──────┘  "40" ─► "40{sid}"      │
//! │        ▲                              │                                 │
//! │        │                    success   │   failure                       │
//! │        │                        ┌─────┴─────┐                          │
//! │        │                        ▼           ▼                           │
//! │        │              ┌────────────┐  ┌────────────┐                   │
//! │        │              │ Connected  │  │  Backoff   │                   │
//! │        │              │ join room  │  └─────┬──────┘                   │
//! │        │              └─────┬──────┘        │ timer expired            │
//! │        │                    │               ▼                           │
//! │        │        close / error / silence   Connecting                   │
//! │        │                    │                                           │
//! │        │                    ▼                                           │
//! │        │              ┌────────────┐                                    │
//! │        └── shutdown ──│  Backoff   │                                    │
//! │                       └────────────┘                                    │
//! │                                                                         │
//! │  BACKOFF STRATEGY (Exponential with Jitter)                            │
//! │  ───────────────────────────────────────────                           │
//! │  Attempt 1: 500ms                                                       │
//! │  Attempt 2: 1s                                                          │
//! │  ...                                                                    │
//! │  Max: 60s                                                               │
//! │                                                                         │
//! │  The room join is sent on every Connected, so a reconnect re-joins.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use super::protocol::{self, EnginePacket, NotificationEvent, SocketPacket};
use crate::config::SocketSettings;
use crate::error::{ClientError, ClientResult};

// =============================================================================
// Transport State
// =============================================================================

/// Connection state of the notification socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Not connected, and not trying.
    #[default]
    Disconnected,
    /// Handshake in progress.
    Connecting,
    /// Socket.IO session established and room joined.
    Connected,
    /// Waiting before the next attempt.
    Backoff,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Backoff => write!(f, "backoff"),
        }
    }
}

// =============================================================================
// Transport Configuration
// =============================================================================

/// Event emitted right after every successful connect.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinRequest {
    pub event: String,
    pub payload: Value,
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Full websocket URL including the Engine.IO query.
    pub url: String,
    pub namespace: String,
    pub connect_timeout: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Maximum reconnection attempts (0 = infinite).
    pub max_retries: u32,
    pub join: Option<JoinRequest>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            url: String::new(),
            namespace: protocol::DEFAULT_NAMESPACE.to_string(),
            connect_timeout: Duration::from_secs(10),
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(60),
            max_retries: 0,
            join: None,
        }
    }
}

impl TransportConfig {
    pub fn from_settings(settings: &SocketSettings, join: Option<JoinRequest>) -> ClientResult<Self> {
        Ok(TransportConfig {
            url: protocol::engine_url(&settings.url)?,
            connect_timeout: Duration::from_secs(settings.connect_timeout_secs),
            initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
            max_backoff: Duration::from_secs(settings.max_backoff_secs),
            max_retries: settings.max_retries,
            join,
            ..Default::default()
        })
    }
}

/// What the transport reports to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected { sid: Option<String> },
    Disconnected,
    Notification(NotificationEvent),
}

// =============================================================================
// Transport Handle
// =============================================================================

/// Owner side of a running transport. Dropping it stops the transport.
#[derive(Debug)]
pub struct TransportHandle {
    outgoing_tx: mpsc::Sender<(String, Value)>,
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl TransportHandle {
    /// Queues an event. It is sent once the socket is connected.
    pub async fn emit(&self, event: impl Into<String>, payload: Value) -> ClientResult<()> {
        self.outgoing_tx
            .send((event.into(), payload))
            .await
            .map_err(|_| ClientError::Disconnected)
    }

    /// Stops the transport and waits for its task to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        drop(self.shutdown_tx);
        if let Err(e) = self.task.await {
            warn!(error = %e, "Transport task ended abnormally");
        }
    }
}

// =============================================================================
// Transport
// =============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

enum LoopExit {
    /// Owner asked to stop or went away.
    Shutdown,
    /// Link dropped; reconnect.
    Lost,
}

/// Socket.IO client with automatic reconnection.
///
/// ## Usage
/// ```rust,ignore
/// let state = Arc::new(watch::channel(ConnectionState::Disconnected).0);
/// let (handle, mut events) = Transport::spawn(config, state.clone());
///
/// while let Some(event) = events.recv().await {
///     println!("{event:?}");
/// }
/// ```
pub struct Transport {
    config: TransportConfig,
    state: Arc<watch::Sender<ConnectionState>>,
    outgoing_rx: mpsc::Receiver<(String, Value)>,
    incoming_tx: mpsc::Sender<TransportEvent>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl Transport {
    /// Spawns the background task. `state` is shared so observers survive
    /// a transport being replaced.
    pub fn spawn(
        config: TransportConfig,
        state: Arc<watch::Sender<ConnectionState>>,
    ) -> (TransportHandle, mpsc::Receiver<TransportEvent>) {
        let (outgoing_tx, outgoing_rx) = mpsc::channel(100);
        let (incoming_tx, incoming_rx) = mpsc::channel(100);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let transport = Transport {
            config,
            state,
            outgoing_rx,
            incoming_tx,
            shutdown_rx,
        };
        let task = tokio::spawn(transport.run());

        let handle = TransportHandle {
            outgoing_tx,
            shutdown_tx,
            task,
        };
        (handle, incoming_rx)
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }

    fn shutdown_requested(&mut self) -> bool {
        use tokio::sync::mpsc::error::TryRecvError;
        matches!(
            self.shutdown_rx.try_recv(),
            Ok(()) | Err(TryRecvError::Disconnected)
        )
    }

    async fn run(mut self) {
        info!(url = %self.config.url, "Socket transport starting");

        let mut backoff = self.create_backoff();
        let mut retry_count = 0u32;

        loop {
            if self.shutdown_requested() {
                info!("Socket transport received shutdown signal");
                break;
            }

            self.set_state(ConnectionState::Connecting);

            match self.connect_with_timeout().await {
                Ok(None) => {
                    info!("Shutdown during handshake");
                    break;
                }
                Ok(Some(ws_stream)) => {
                    let exit = self.connection_loop(ws_stream, &mut backoff, &mut retry_count).await;
                    let was_connected = *self.state.borrow() == ConnectionState::Connected;
                    if was_connected {
                        let _ = self.incoming_tx.send(TransportEvent::Disconnected).await;
                    }
                    match exit {
                        Ok(LoopExit::Shutdown) => break,
                        Ok(LoopExit::Lost) => info!("Socket connection lost"),
                        Err(e) => warn!(error = %e, "Socket connection ended"),
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Failed to connect socket");
                }
            }

            self.set_state(ConnectionState::Backoff);

            if self.config.max_retries > 0 {
                retry_count += 1;
                if retry_count >= self.config.max_retries {
                    error!(
                        max_retries = self.config.max_retries,
                        "Max reconnection attempts reached"
                    );
                    break;
                }
            }

            if let Some(duration) = backoff.next_backoff() {
                debug!(?duration, attempt = retry_count, "Waiting before reconnect");

                tokio::select! {
                    _ = tokio::time::sleep(duration) => {}
                    _ = self.shutdown_rx.recv() => {
                        info!("Shutdown during backoff");
                        break;
                    }
                }
            } else {
                error!("Backoff exhausted");
                break;
            }
        }

        self.set_state(ConnectionState::Disconnected);
        info!("Socket transport stopped");
    }

    /// `Ok(None)` means shutdown was requested before the handshake finished.
    async fn connect_with_timeout(&mut self) -> ClientResult<Option<WsStream>> {
        let handshake = timeout(self.config.connect_timeout, connect_async(&self.config.url));
        let result = tokio::select! {
            result = handshake => result,
            _ = self.shutdown_rx.recv() => return Ok(None),
        };
        match result {
            Ok(Ok((ws_stream, response))) => {
                debug!(status = ?response.status(), "Websocket handshake complete");
                Ok(Some(ws_stream))
            }
            Ok(Err(e)) => Err(ClientError::from(e)),
            Err(_) => Err(ClientError::ConnectionFailed(format!(
                "timed out after {}s",
                self.config.connect_timeout.as_secs()
            ))),
        }
    }

    async fn connection_loop(
        &mut self,
        ws_stream: WsStream,
        backoff: &mut ExponentialBackoff,
        retry_count: &mut u32,
    ) -> ClientResult<LoopExit> {
        let (mut write, mut read) = ws_stream.split();
        let mut deadline = Instant::now() + self.config.connect_timeout;
        let mut heartbeat = self.config.connect_timeout;
        let mut connected = false;

        loop {
            tokio::select! {
                Some((event, payload)) = self.outgoing_rx.recv(), if connected => {
                    let frame = protocol::encode_event(&self.config.namespace, &event, &payload)?;
                    debug!(event = %event, "Emitting event");
                    write.send(WsMessage::Text(frame.into())).await?;
                }

                result = read.next() => {
                    let message = match result {
                        Some(Ok(message)) => message,
                        Some(Err(e)) => return Err(ClientError::from(e)),
                        None => return Ok(LoopExit::Lost),
                    };

                    let text = match message {
                        WsMessage::Text(text) => text,
                        WsMessage::Ping(data) => {
                            write.send(WsMessage::Pong(data)).await?;
                            continue;
                        }
                        WsMessage::Close(frame) => {
                            info!(?frame, "Received close frame");
                            return Ok(LoopExit::Lost);
                        }
                        WsMessage::Pong(_) | WsMessage::Frame(_) => continue,
                        WsMessage::Binary(_) => {
                            warn!("Ignoring binary frame");
                            continue;
                        }
                    };

                    let packet = match protocol::decode(text.as_str()) {
                        Ok(packet) => packet,
                        Err(e) => {
                            warn!(error = %e, "Dropping malformed frame");
                            continue;
                        }
                    };

                    match packet {
                        EnginePacket::Open(info) => {
                            debug!(sid = %info.sid, "Engine session opened");
                            heartbeat = info.heartbeat_deadline();
                            deadline = Instant::now() + heartbeat;
                            let frame = protocol::encode_connect(&self.config.namespace);
                            write.send(WsMessage::Text(frame.into())).await?;
                        }
                        EnginePacket::Ping(data) => {
                            deadline = Instant::now() + heartbeat;
                            write.send(WsMessage::Text(protocol::encode_pong(&data).into())).await?;
                        }
                        EnginePacket::Close => return Ok(LoopExit::Lost),
                        EnginePacket::Pong(_) | EnginePacket::Upgrade | EnginePacket::Noop => {}
                        EnginePacket::Message(SocketPacket::Connect { sid, .. }) => {
                            if let Some(join) = &self.config.join {
                                let frame = protocol::encode_event(
                                    &self.config.namespace,
                                    &join.event,
                                    &join.payload,
                                )?;
                                write.send(WsMessage::Text(frame.into())).await?;
                                info!(event = %join.event, payload = %join.payload, "Joined room");
                            }
                            connected = true;
                            backoff.reset();
                            *retry_count = 0;
                            self.set_state(ConnectionState::Connected);
                            if self.incoming_tx.send(TransportEvent::Connected { sid }).await.is_err() {
                                return Ok(LoopExit::Shutdown);
                            }
                        }
                        EnginePacket::Message(SocketPacket::Event { name, args, .. }) => {
                            debug!(event = %name, "Received event");
                            let event = NotificationEvent::from_event(name, args);
                            if self.incoming_tx.send(TransportEvent::Notification(event)).await.is_err() {
                                return Ok(LoopExit::Shutdown);
                            }
                        }
                        EnginePacket::Message(SocketPacket::Disconnect { .. }) => {
                            info!("Server closed the socket session");
                            return Ok(LoopExit::Lost);
                        }
                        EnginePacket::Message(SocketPacket::ConnectError { message, .. }) => {
                            return Err(ClientError::ConnectionFailed(message));
                        }
                        EnginePacket::Message(SocketPacket::Ack { .. }) => {}
                    }
                }

                _ = tokio::time::sleep_until(deadline) => {
                    warn!(?heartbeat, "No heartbeat from server");
                    return Ok(LoopExit::Lost);
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Shutdown signal received, closing socket");
                    let _ = write.send(WsMessage::Text(protocol::encode_close().into())).await;
                    let _ = write.send(WsMessage::Close(None)).await;
                    return Ok(LoopExit::Shutdown);
                }
            }
        }
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.config.initial_backoff,
            initial_interval: self.config.initial_backoff,
            max_interval: self.config.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}
