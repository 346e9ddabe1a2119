//! Gateway client implementation.
//!
//! A [`Client`] owns one Gateway connection at a time. [`Client::run`]
//! drives the outer lifecycle: connect, receive Hello, send Identify or
//! Resume, then pump events while the heart beats, and on disconnect
//! decide from the close code whether to back off and reconnect, resume,
//! or surface a fatal error.

use crate::backoff::ExponentialBackoff;
use crate::close_code::{describe, disconnect_action, DisconnectAction};
use crate::error::GatewayError;
use crate::heartbeat::Heart;
use crate::opcode::OpCode;
use crate::payload::{
    Dispatch, GatewayPayload, HelloData, IdentifyData, RawGatewayPayload, ReadyData, ResumeData,
    ShardId,
};
use crate::transport::{GatewaySink, Transport};
use crate::{GATEWAY_VERSION, HELLO_TIMEOUT};

use flume::{Receiver, Sender};
use futures_util::StreamExt;
use iridium_model::{Intents, Presence};
use parking_lot::RwLock;
use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, USER_AGENT};
use tokio_tungstenite::tungstenite;
use tracing::{debug, error, info, trace, warn};
use url::Url;

/// Command sent into the connection loop.
#[derive(Debug)]
pub(crate) enum Command {
    /// Send an already-encoded JSON payload.
    Send(String),
    /// Close the websocket with the given code and reason.
    Close { code: u16, reason: String },
}

/// What the protocol dispatcher decided about an inbound payload.
enum Action {
    /// Keep receiving.
    Continue,
    /// Server sent opcode 7; close 1002 and reconnect.
    Reconnect,
    /// Server sent opcode 9; close 1002, discarding the session unless it
    /// is resumable.
    InvalidSession { resumable: bool },
}

/// Whether a disconnect is retried or surfaced.
enum Disconnect {
    /// Back off and reconnect; carries the original error for callers
    /// that disabled reconnection.
    Retry(GatewayError),
    /// Surface the classified error.
    Fatal(GatewayError),
}

/// Connection state, readable at any time via [`Client::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not running.
    Disconnected,
    /// Opening the websocket.
    Connecting,
    /// Connected, waiting for Hello.
    Handshaking,
    /// Sent Identify, waiting for READY.
    Identifying,
    /// Sent Resume, waiting for the event replay.
    Resuming,
    /// Fully connected and receiving events.
    Connected,
    /// Waiting out the backoff before the next attempt.
    Reconnecting,
    /// Shutdown requested.
    Disconnecting,
}

/// Configuration for a [`Client`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Bot token.
    pub token: String,

    /// Gateway intents to request at Identify.
    pub intents: Intents,

    /// Gateway URL override. When unset, the URL is fetched from the
    /// HTTP API once, on the first call to [`Client::run`].
    pub gateway_url: Option<String>,

    /// User agent override for the HTTP API and websocket handshake.
    pub user_agent: Option<String>,

    /// Enable zlib-stream transport compression.
    pub compress: bool,

    /// Initial presence sent with Identify.
    pub presence: Option<Presence>,

    /// Shard assignment.
    pub shard: Option<ShardId>,
}

impl ClientConfig {
    /// Create a configuration with the required fields; transport
    /// compression defaults to on.
    pub fn new(token: impl Into<String>, intents: Intents) -> Self {
        Self {
            token: token.into(),
            intents,
            gateway_url: None,
            user_agent: None,
            compress: true,
            presence: None,
            shard: None,
        }
    }

    /// Set a gateway URL, skipping the HTTP bootstrap.
    pub fn with_gateway_url(mut self, url: impl Into<String>) -> Self {
        self.gateway_url = Some(url.into());
        self
    }

    /// Override the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Enable or disable zlib-stream transport compression.
    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Set the initial presence.
    pub fn with_presence(mut self, presence: Presence) -> Self {
        self.presence = Some(presence);
        self
    }

    /// Set the shard assignment.
    pub fn with_shard(mut self, shard: ShardId) -> Self {
        self.shard = Some(shard);
        self
    }
}

/// Session identity captured from READY, used to resume after a
/// disconnect.
#[derive(Debug, Clone)]
struct Session {
    /// Session ID from the READY event.
    id: String,
    /// URL to target when resuming.
    resume_url: String,
}

/// The Gateway websocket client.
///
/// Create one with [`Client::new`], then call [`Client::run`] with a
/// channel for dispatched events. All other methods are safe to call
/// from other tasks while `run` is in flight.
pub struct Client {
    /// Client configuration.
    config: ClientConfig,

    /// Resolved gateway base URL.
    gateway_url: RwLock<Option<String>>,

    /// Presence reused on subsequent Identifies.
    presence: RwLock<Option<Presence>>,

    /// Current session, if one can be resumed.
    session: RwLock<Option<Session>>,

    /// Last sequence number received; 0 until the first Dispatch.
    sequence: Arc<AtomicU64>,

    /// Heartbeat engine, one activation per connection.
    heart: Heart,

    /// Current connection state.
    state: RwLock<ConnectionState>,

    /// Whether a transport is currently active.
    connected: AtomicBool,

    /// Whether shutdown has been requested.
    shutdown: AtomicBool,

    /// Sends commands into the connection loop.
    command_tx: Sender<Command>,

    /// Receives commands in the connection loop.
    command_rx: Receiver<Command>,
}

impl Client {
    /// Create a new client.
    pub fn new(config: ClientConfig) -> Self {
        let (command_tx, command_rx) = flume::unbounded();
        let sequence = Arc::new(AtomicU64::new(0));

        Self {
            gateway_url: RwLock::new(config.gateway_url.clone()),
            presence: RwLock::new(config.presence.clone()),
            session: RwLock::new(None),
            sequence: Arc::clone(&sequence),
            heart: Heart::new(sequence),
            state: RwLock::new(ConnectionState::Disconnected),
            connected: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            command_tx,
            command_rx,
            config,
        }
    }

    /// The current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// The last sequence number received, if any Dispatch has arrived.
    pub fn sequence(&self) -> Option<u64> {
        match self.sequence.load(Ordering::SeqCst) {
            0 => None,
            seq => Some(seq),
        }
    }

    /// The current session ID, if a session is established.
    pub fn session_id(&self) -> Option<String> {
        self.session.read().as_ref().map(|s| s.id.clone())
    }

    /// The last measured heartbeat round trip.
    pub fn latency(&self) -> Option<Duration> {
        self.heart.latency()
    }

    /// Update the client's presence.
    ///
    /// Sends `{op:3}` over the active connection. With `persistent`, the
    /// presence is also stored so later Identifies reuse it; without an
    /// active connection a non-persistent update fails with
    /// [`GatewayError::NotConnected`].
    pub fn set_presence(&self, presence: Presence, persistent: bool) -> Result<(), GatewayError> {
        if persistent {
            *self.presence.write() = Some(presence.clone());
        }

        if !self.connected.load(Ordering::SeqCst) {
            return if persistent {
                Ok(())
            } else {
                Err(GatewayError::NotConnected)
            };
        }

        let json = serde_json::to_string(&GatewayPayload::new(OpCode::PresenceUpdate, presence))?;
        self.command_tx
            .send(Command::Send(json))
            .map_err(|_| GatewayError::CommandChannelClosed)
    }

    /// Request a graceful shutdown: the websocket is closed with 1000
    /// "Going offline" and [`Client::run`] returns `Ok(())`.
    pub fn close(&self) {
        info!("client shutdown requested");
        self.shutdown.store(true, Ordering::SeqCst);
        *self.state.write() = ConnectionState::Disconnecting;
        let _ = self.command_tx.send(Command::Close {
            code: 1000,
            reason: "Going offline".to_string(),
        });
    }

    /// Connect and receive events until shutdown or a fatal error,
    /// reconnecting (and resuming where possible) on transient failures.
    pub async fn run(&self, events: Sender<Dispatch>) -> Result<(), GatewayError> {
        self.run_with_reconnect(events, true).await
    }

    /// Like [`Client::run`], but with `reconnect: false` every disconnect
    /// is surfaced to the caller instead of retried.
    pub async fn run_with_reconnect(
        &self,
        events: Sender<Dispatch>,
        reconnect: bool,
    ) -> Result<(), GatewayError> {
        self.resolve_gateway_url().await?;
        let mut backoff = ExponentialBackoff::new();

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                *self.state.write() = ConnectionState::Disconnected;
                return Ok(());
            }

            let err = match self.connect_and_run(&events).await {
                Ok(()) => {
                    info!("connection closed gracefully");
                    *self.state.write() = ConnectionState::Disconnected;
                    return Ok(());
                }
                Err(err) => err,
            };

            match self.disconnect_decision(err) {
                Disconnect::Fatal(fatal) => {
                    error!(error = %fatal, "fatal gateway error");
                    *self.state.write() = ConnectionState::Disconnected;
                    return Err(fatal);
                }
                Disconnect::Retry(err) => {
                    if !reconnect {
                        *self.state.write() = ConnectionState::Disconnected;
                        return Err(err);
                    }

                    let delay = backoff.next();
                    info!(delay_ms = delay.as_millis() as u64, "waiting before reconnect");
                    *self.state.write() = ConnectionState::Reconnecting;
                    sleep(delay).await;
                }
            }
        }
    }

    /// Fetch the gateway URL from the HTTP API unless one is configured.
    async fn resolve_gateway_url(&self) -> Result<(), GatewayError> {
        if self.gateway_url.read().is_some() {
            return Ok(());
        }

        info!("fetching gateway URL");
        let http = match self.config.user_agent.as_deref() {
            Some(ua) => iridium_http::HttpClient::with_user_agent(&self.config.token, ua)?,
            None => iridium_http::HttpClient::new(&self.config.token)?,
        };
        let gateway = http.get_gateway().await?;

        debug!(url = %gateway.url, "gateway URL fetched");
        *self.gateway_url.write() = Some(gateway.url);
        Ok(())
    }

    /// The URL for the next connection: the resume URL when a session is
    /// live, the base URL otherwise, with the query parameters appended.
    fn connection_url(&self) -> Result<Url, GatewayError> {
        let base = self
            .session
            .read()
            .as_ref()
            .map(|s| s.resume_url.clone())
            .or_else(|| self.gateway_url.read().clone())
            .ok_or(GatewayError::NotConnected)?;

        let mut url = Url::parse(&base)?;
        url.query_pairs_mut()
            .append_pair("v", &GATEWAY_VERSION.to_string())
            .append_pair("encoding", "json");

        if self.config.compress {
            url.query_pairs_mut().append_pair("compress", "zlib-stream");
        }

        Ok(url)
    }

    /// Open one connection and pump it until it ends.
    async fn connect_and_run(&self, events: &Sender<Dispatch>) -> Result<(), GatewayError> {
        // Commands aimed at a previous connection are meaningless now.
        for _ in self.command_rx.drain() {}
        if self.shutdown.load(Ordering::SeqCst) {
            return Ok(());
        }

        let resuming = self.session.read().is_some();
        if !resuming {
            // A fresh session starts a fresh sequence; the old value only
            // had meaning within the session it came from.
            self.sequence.store(0, Ordering::SeqCst);
        }

        let url = self.connection_url()?;
        info!(url = %url, resuming, "connecting to gateway");
        *self.state.write() = ConnectionState::Connecting;

        let mut request = url.as_str().into_client_request()?;
        let user_agent = self
            .config
            .user_agent
            .clone()
            .unwrap_or_else(|| iridium_http::USER_AGENT.to_string());
        request.headers_mut().insert(
            USER_AGENT,
            HeaderValue::from_str(&user_agent)
                .map_err(|e| tungstenite::Error::HttpFormat(e.into()))?,
        );

        let (ws, _response) = connect_async(request).await?;
        debug!("websocket connected");
        *self.state.write() = ConnectionState::Handshaking;

        let (sink, stream) = ws.split();
        let mut sink = GatewaySink::new(sink);
        let mut transport = if self.config.compress {
            Transport::zlib_stream(stream)
        } else {
            Transport::plain_text(stream)
        };

        self.heart.reset();

        let hello = timeout(HELLO_TIMEOUT, transport.recv())
            .await
            .map_err(|_| GatewayError::HelloTimeout)??;
        if hello.op != OpCode::Hello {
            return Err(GatewayError::ConnectionClosed {
                code: 0,
                reason: format!("expected Hello, got {:?}", hello.op),
            });
        }
        let hello: HelloData = hello.data()?;
        self.heart
            .set_interval(Some(Duration::from_millis(hello.heartbeat_interval)));
        debug!(interval_ms = hello.heartbeat_interval, "received Hello");

        // The very first outbound frame: Resume continues the interrupted
        // session, Identify starts a fresh one.
        let session = self.session.read().clone();
        if let Some(ref session) = session {
            *self.state.write() = ConnectionState::Resuming;
            let seq = self.sequence.load(Ordering::SeqCst);
            info!(session_id = %session.id, seq, "resuming session");
            let resume = ResumeData {
                token: Cow::Borrowed(&self.config.token),
                session_id: Cow::Borrowed(&session.id),
                seq,
            };
            sink.send(&GatewayPayload::new(OpCode::Resume, resume))
                .await?;
        } else {
            *self.state.write() = ConnectionState::Identifying;
            info!(intents = ?self.config.intents, "identifying");
            let mut identify = IdentifyData::new(&self.config.token, self.config.intents);
            identify.shard = self.config.shard;
            identify.presence = self.presence.read().clone();
            sink.send(&GatewayPayload::new(OpCode::Identify, identify))
                .await?;
        }

        self.connected.store(true, Ordering::SeqCst);
        let result = self
            .drive_connection(&mut transport, &mut sink, events)
            .await;
        self.connected.store(false, Ordering::SeqCst);
        self.heart.set_interval(None);
        result
    }

    /// The per-connection loop: one receive stream, one heart, one
    /// command drain, racing under `select!` so a failure of any one
    /// tears down the other two.
    async fn drive_connection(
        &self,
        transport: &mut Transport,
        sink: &mut GatewaySink,
        events: &Sender<Dispatch>,
    ) -> Result<(), GatewayError> {
        let heart_beats = self.heart.run(&self.command_tx);
        tokio::pin!(heart_beats);

        loop {
            tokio::select! {
                payload = transport.recv() => {
                    match self.handle_event(payload?, events)? {
                        Action::Continue => {}
                        Action::Reconnect => {
                            let _ = sink.close(1002, "Reconnect ACK").await;
                            return Err(GatewayError::Reconnect);
                        }
                        Action::InvalidSession { resumable } => {
                            if !resumable {
                                self.invalidate_session();
                            }
                            let _ = sink.close(1002, "Invalid Session ACK").await;
                            return Err(GatewayError::SessionInvalidated { resumable });
                        }
                    }
                }

                res = &mut heart_beats => {
                    return match res {
                        Err(GatewayError::HeartbeatLost) => {
                            let _ = sink.close(1002, "Heartbeat ACK lost").await;
                            Err(GatewayError::HeartbeatLost)
                        }
                        other => other,
                    };
                }

                command = self.command_rx.recv_async() => {
                    match command.map_err(|_| GatewayError::CommandChannelClosed)? {
                        Command::Send(json) => sink.send_raw(json).await?,
                        Command::Close { code, reason } => {
                            let _ = sink.close(code, &reason).await;
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    /// Act on one inbound payload.
    fn handle_event(
        &self,
        payload: RawGatewayPayload,
        events: &Sender<Dispatch>,
    ) -> Result<Action, GatewayError> {
        if let Some(seq) = payload.s {
            self.sequence.store(seq, Ordering::SeqCst);
        }

        match payload.op {
            OpCode::Dispatch => {
                let (Some(name), Some(data)) = (payload.t, payload.d) else {
                    debug!("dispatch payload missing event name or data");
                    return Ok(Action::Continue);
                };

                match &*name {
                    "READY" => {
                        let ready: ReadyData = serde_json::from_str(data.get())?;
                        info!(
                            session_id = %ready.session_id,
                            resume_url = %ready.resume_gateway_url,
                            "session established"
                        );
                        *self.session.write() = Some(Session {
                            id: ready.session_id,
                            resume_url: ready.resume_gateway_url,
                        });
                        *self.state.write() = ConnectionState::Connected;
                    }
                    "RESUMED" => {
                        info!("session resumed");
                        *self.state.write() = ConnectionState::Connected;
                    }
                    _ => {}
                }

                let dispatch = Dispatch {
                    event: name,
                    sequence: payload.s.unwrap_or_default(),
                    data,
                };
                trace!(event = %dispatch.event, seq = dispatch.sequence, "dispatching event");
                events
                    .send(dispatch)
                    .map_err(|_| GatewayError::EventChannelClosed)?;
            }
            OpCode::Heartbeat => {
                debug!("server requested an early heartbeat");
                self.heart.beat_soon();
            }
            OpCode::Reconnect => {
                info!("server requested a reconnect");
                return Ok(Action::Reconnect);
            }
            OpCode::InvalidSession => {
                let resumable = payload.data::<bool>().unwrap_or(false);
                warn!(resumable, "server invalidated our session");
                return Ok(Action::InvalidSession { resumable });
            }
            OpCode::Hello => {
                let hello: HelloData = payload.data()?;
                self.heart
                    .set_interval(Some(Duration::from_millis(hello.heartbeat_interval)));
            }
            OpCode::HeartbeatAck => {
                self.heart.mark_acked();
            }
            op => {
                debug!(opcode = ?op, "ignoring opcode");
            }
        }

        Ok(Action::Continue)
    }

    /// Decide whether a disconnect is retried or fatal, applying session
    /// invalidation on the way.
    fn disconnect_decision(&self, err: GatewayError) -> Disconnect {
        match err {
            GatewayError::Reconnect | GatewayError::HeartbeatLost => {
                warn!(error = %err, "connection interrupted, will reconnect");
                Disconnect::Retry(err)
            }

            GatewayError::SessionInvalidated { resumable } => {
                if !resumable {
                    self.invalidate_session();
                }
                Disconnect::Retry(err)
            }

            GatewayError::ConnectionClosed { code, reason } => match disconnect_action(code) {
                DisconnectAction::Reconnect { invalidate_session } => {
                    if invalidate_session {
                        self.invalidate_session();
                    }
                    warn!(
                        code,
                        reason = %describe(code, &reason),
                        "connection closed, will reconnect"
                    );
                    Disconnect::Retry(GatewayError::ConnectionClosed { code, reason })
                }
                DisconnectAction::AuthenticationFailed => {
                    Disconnect::Fatal(GatewayError::AuthenticationFailed)
                }
                DisconnectAction::PrivilegedIntentsDenied => {
                    Disconnect::Fatal(GatewayError::PrivilegedIntentsDenied {
                        intents: self.config.intents.privileged(),
                    })
                }
                DisconnectAction::Fatal => Disconnect::Fatal(GatewayError::ConnectionClosed {
                    code,
                    reason: describe(code, &reason),
                }),
            },

            GatewayError::WebSocket(_)
            | GatewayError::Io(_)
            | GatewayError::JsonDecode(_)
            | GatewayError::HelloTimeout => {
                warn!(error = %err, "connection error, will reconnect");
                Disconnect::Retry(err)
            }

            err => Disconnect::Fatal(err),
        }
    }

    /// Discard the session identity. The sequence is left in place; a
    /// later fresh Identify clears it.
    fn invalidate_session(&self) {
        debug!("discarding session");
        *self.session.write() = None;
    }
}
