//! Gateway error types.
//!
//! Everything that can end a connection is a [`GatewayError`]. Transient
//! kinds (reconnect requests, invalidated sessions, lost heartbeats) are
//! consumed by the client's reconnect loop and only surface to the caller
//! when reconnection is disabled; fatal kinds always surface.

use iridium_model::Intents;
use thiserror::Error;

/// Errors that can occur during Gateway operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// WebSocket connection or protocol error.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Failed to decode a JSON payload.
    #[error("JSON decode error: {0}")]
    JsonDecode(String),

    /// The connection closed and no more specific classification applies.
    ///
    /// A code of 0 means the stream ended without a close frame.
    #[error("connection closed: code={code}, reason={reason}")]
    ConnectionClosed {
        /// WebSocket close code observed, or 0 when none was seen.
        code: u16,
        /// Close reason provided by the peer.
        reason: String,
    },

    /// Discord rejected the token (close code 4004).
    #[error("Discord rejected your credentials; is the token correct?")]
    AuthenticationFailed,

    /// Privileged intents were requested but are not enabled in the
    /// developer portal (close code 4014).
    #[error("Discord rejected the requested privileged intents: {intents:?}")]
    PrivilegedIntentsDenied {
        /// The privileged subset of the intents that were requested.
        intents: Intents,
    },

    /// A heartbeat acknowledgement was not received before the next beat.
    #[error("Discord did not acknowledge our heartbeat")]
    HeartbeatLost,

    /// The server did not send Hello within the allowed window.
    #[error("timed out waiting for Hello")]
    HelloTimeout,

    /// The server asked us to reconnect (opcode 7).
    #[error("Discord has requested our client to reconnect")]
    Reconnect,

    /// The server invalidated our session (opcode 9).
    #[error("Discord has invalidated our session (resumable: {resumable})")]
    SessionInvalidated {
        /// Whether the session can still be resumed.
        resumable: bool,
    },

    /// The gateway URL could not be fetched from the HTTP API.
    #[error("gateway bootstrap failed: {0}")]
    Http(#[from] iridium_http::HttpError),

    /// The gateway URL could not be parsed.
    #[error("invalid gateway URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// The application dropped its event receiver.
    #[error("event channel closed")]
    EventChannelClosed,

    /// The connection's command channel closed.
    #[error("command channel closed")]
    CommandChannelClosed,

    /// No connection is currently active.
    #[error("not connected to the gateway")]
    NotConnected,

    /// I/O error, e.g. while inflating a compressed frame.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::JsonDecode(err.to_string())
    }
}
