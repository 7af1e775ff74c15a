use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use mentor_realtime_types::{IncomingResponse, OutgoingQuery};

use crate::codec;
use crate::error::{MediaError, SessionError};

pub mod config;
mod consts;
mod utils;

pub use consts::{DEFAULT_ENDPOINT, MAX_RECONNECT_ATTEMPTS, RECONNECT_DELAY_MS};

pub type QueryTx = mpsc::Sender<OutgoingQuery>;
pub(crate) type EventTx = broadcast::Sender<SessionEvent>;
pub type EventRx = broadcast::Receiver<SessionEvent>;

/// Connection lifecycle as observed by the UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closing,
}

/// Events broadcast to session subscribers, in receipt order.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The connection (re)opened.
    Opened,
    /// A decoded response from the endpoint.
    Response(IncomingResponse),
    /// The connection closed; a reconnect may follow.
    Closed { reason: Option<String> },
    /// The reconnect budget is spent; no further attempts will be made
    /// until the caller reinitiates.
    ReconnectsExhausted { attempts: u32 },
    /// A speech or capture device fault that the UI should surface.
    MediaFault(MediaError),
    /// The user stopped sharing their screen; voice mode was torn down.
    ScreenShareEnded,
}

/// Client for the tutoring endpoint. Owns the persistent connection and the
/// bounded-reconnect supervisor; queries go out through an mpsc channel and
/// decoded responses come back on a broadcast channel.
pub struct Client {
    config: config::Config,
    q_tx: Option<QueryTx>,
    e_tx: Option<EventTx>,
    state_tx: watch::Sender<ConnectionState>,
    state_rx: watch::Receiver<ConnectionState>,
    shutdown_tx: Option<watch::Sender<bool>>,
    supervisor: Option<tokio::task::JoinHandle<()>>,
}

impl Client {
    pub fn new(config: config::Config) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        Self {
            config,
            q_tx: None,
            e_tx: None,
            state_tx,
            state_rx,
            shutdown_tx: None,
            supervisor: None,
        }
    }

    pub fn config(&self) -> &config::Config {
        &self.config
    }

    /// Starts the connection supervisor. Idempotent: a second call while a
    /// connection is open or opening does nothing.
    pub fn connect(&mut self) -> Result<(), SessionError> {
        if self.q_tx.is_some() {
            tracing::debug!("connect called while already active; ignoring");
            return Ok(());
        }
        let (q_tx, q_rx) = mpsc::channel(consts::CHANNEL_CAPACITY);
        let (e_tx, _) = broadcast::channel(consts::CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        self.q_tx = Some(q_tx);
        self.e_tx = Some(e_tx.clone());
        self.shutdown_tx = Some(shutdown_tx);
        self.supervisor = Some(tokio::spawn(run_supervisor(
            self.config.clone(),
            q_rx,
            e_tx,
            self.state_tx.clone(),
            shutdown_rx,
        )));
        Ok(())
    }

    /// Sends a query if the connection is open. There is no queuing while
    /// disconnected: the query is dropped and the caller is told.
    pub async fn send(&self, query: OutgoingQuery) -> Result<(), SessionError> {
        if *self.state_rx.borrow() != ConnectionState::Open {
            return Err(SessionError::NotConnected);
        }
        let tx = self.q_tx.as_ref().ok_or(SessionError::NotConnected)?;
        tx.send(query).await.map_err(|_| SessionError::NotConnected)
    }

    /// A receiver of session events. Each call gets an independent stream.
    pub fn server_events(&self) -> Result<EventRx, SessionError> {
        match self.e_tx {
            Some(ref tx) => Ok(tx.subscribe()),
            None => Err(SessionError::NotConnected),
        }
    }

    pub(crate) fn event_sender(&self) -> Option<EventTx> {
        self.e_tx.clone()
    }

    pub(crate) fn query_sender(&self) -> Option<QueryTx> {
        self.q_tx.clone()
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Graceful shutdown: closes the socket and suppresses any pending
    /// reconnect attempt.
    pub async fn close(&mut self) {
        let _ = self.state_tx.send(ConnectionState::Closing);
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
        self.q_tx = None;
        if let Some(handle) = self.supervisor.take() {
            if handle.await.is_err() {
                tracing::error!("connection supervisor panicked during shutdown");
            }
        }
        self.e_tx = None;
        let _ = self.state_tx.send(ConnectionState::Disconnected);
    }
}

/// Connects with the given config and returns a running client.
pub fn connect_with_config(config: config::Config) -> Result<Client, SessionError> {
    let mut client = Client::new(config);
    client.connect()?;
    Ok(client)
}

/// Connects to the default local endpoint.
pub fn connect() -> Result<Client, SessionError> {
    connect_with_config(config::Config::new())
}

enum ConnectionEnd {
    Shutdown,
    Closed(Option<String>),
}

/// Owns the dial/run/reconnect cycle. One connection at a time; on close the
/// next attempt is scheduled after the fixed delay until the bound is spent.
async fn run_supervisor(
    config: config::Config,
    mut q_rx: mpsc::Receiver<OutgoingQuery>,
    e_tx: EventTx,
    state_tx: watch::Sender<ConnectionState>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut attempt: u32 = 0;
    loop {
        if *shutdown_rx.borrow() {
            break;
        }
        let _ = state_tx.send(ConnectionState::Connecting);
        tracing::info!(attempt, endpoint = config.endpoint(), "connecting");

        let request = match utils::build_request(&config) {
            Ok(request) => request,
            Err(e) => {
                tracing::error!("failed to build connection request: {}", e);
                break;
            }
        };
        let dial = tokio::select! {
            result = tokio_tungstenite::connect_async(request) => result,
            _ = shutdown_rx.changed() => break,
        };
        match dial {
            Ok((ws_stream, _)) => {
                attempt = 0;
                let _ = state_tx.send(ConnectionState::Open);
                let _ = e_tx.send(SessionEvent::Opened);
                match run_connection(ws_stream, &mut q_rx, &e_tx, &config, &mut shutdown_rx).await
                {
                    ConnectionEnd::Shutdown => break,
                    ConnectionEnd::Closed(reason) => {
                        let _ = e_tx.send(SessionEvent::Closed { reason });
                    }
                }
            }
            Err(e) => {
                tracing::error!("failed to open connection: {}", e);
                let _ = e_tx.send(SessionEvent::Closed {
                    reason: Some(e.to_string()),
                });
            }
        }
        let _ = state_tx.send(ConnectionState::Disconnected);

        if attempt >= config.max_reconnect_attempts() {
            tracing::warn!(attempts = attempt, "reconnect attempts exhausted");
            let _ = e_tx.send(SessionEvent::ReconnectsExhausted { attempts: attempt });
            break;
        }
        attempt += 1;
        tracing::info!(
            attempt,
            delay_ms = config.reconnect_delay().as_millis() as u64,
            "scheduling reconnect"
        );
        tokio::select! {
            _ = tokio::time::sleep(config.reconnect_delay()) => {}
            _ = shutdown_rx.changed() => break,
        }
    }
    let _ = state_tx.send(ConnectionState::Disconnected);
}

/// Runs one open connection until it closes or shutdown is requested.
async fn run_connection(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    q_rx: &mut mpsc::Receiver<OutgoingQuery>,
    e_tx: &EventTx,
    config: &config::Config,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> ConnectionEnd {
    let (mut write, mut read) = ws_stream.split();
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                let _ = write.send(Message::Close(None)).await;
                return ConnectionEnd::Shutdown;
            }
            query = q_rx.recv() => {
                let Some(query) = query else {
                    // all senders gone; the client is being torn down
                    let _ = write.send(Message::Close(None)).await;
                    return ConnectionEnd::Shutdown;
                };
                match codec::encode_query(&query) {
                    Ok(text) => {
                        if let Err(e) = write.send(Message::Text(text)).await {
                            tracing::error!("failed to send message: {}", e);
                            return ConnectionEnd::Closed(Some(e.to_string()));
                        }
                    }
                    Err(e) => {
                        tracing::error!("failed to serialize query: {}", e);
                    }
                }
            }
            message = read.next() => {
                let Some(message) = message else {
                    return ConnectionEnd::Closed(None);
                };
                let message = match message {
                    Ok(message) => message,
                    Err(e) => {
                        tracing::error!("failed to read message: {}", e);
                        return ConnectionEnd::Closed(Some(e.to_string()));
                    }
                };
                match message {
                    Message::Text(text) => {
                        match codec::decode_response(&text, config.max_audio_bytes()) {
                            Ok(response) => {
                                if let Err(e) = e_tx.send(SessionEvent::Response(response)) {
                                    tracing::debug!("no subscribers for response: {}", e);
                                }
                            }
                            // malformed or oversized payloads are dropped;
                            // the session stays up
                            Err(e) => {
                                tracing::error!("dropping undecodable message: {}", e);
                            }
                        }
                    }
                    Message::Binary(bin) => {
                        tracing::warn!("unexpected binary message: {} bytes", bin.len());
                    }
                    Message::Close(frame) => {
                        tracing::info!("connection closed: {:?}", frame);
                        return ConnectionEnd::Closed(frame.map(|f| f.reason.to_string()));
                    }
                    _ => {}
                }
            }
        }
    }
}
