//! WebSocket transport.
//!
//! One connection owns one [`Transport`] (the receive half, which frames
//! and optionally inflates inbound payloads) and one [`GatewaySink`] (the
//! send half). Both are replaced wholesale when the connection is
//! reopened; in particular the zlib-stream inflater cannot be carried
//! across connections because the peer restarts its compression context.

use crate::compression::Inflater;
use crate::error::GatewayError;
use crate::payload::RawGatewayPayload;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

/// Type alias for the WebSocket stream.
pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// The receive half of a connection.
pub(crate) enum Transport {
    /// Every inbound frame is UTF-8 JSON.
    PlainText {
        stream: SplitStream<WsStream>,
    },
    /// Inbound frames are fragments of one long-lived zlib stream.
    ZlibStream {
        stream: SplitStream<WsStream>,
        inflater: Inflater,
    },
}

impl Transport {
    pub fn plain_text(stream: SplitStream<WsStream>) -> Self {
        Self::PlainText { stream }
    }

    pub fn zlib_stream(stream: SplitStream<WsStream>) -> Self {
        Self::ZlibStream {
            stream,
            inflater: Inflater::new(),
        }
    }

    fn stream_mut(&mut self) -> &mut SplitStream<WsStream> {
        match self {
            Self::PlainText { stream } | Self::ZlibStream { stream, .. } => stream,
        }
    }

    /// Receive frames until one complete payload can be parsed.
    ///
    /// A close frame maps to [`GatewayError::ConnectionClosed`] carrying
    /// the peer's code and reason; a bare end of stream maps to the same
    /// error with code 0.
    pub async fn recv(&mut self) -> Result<RawGatewayPayload, GatewayError> {
        loop {
            let message = match self.stream_mut().next().await {
                Some(Ok(message)) => message,
                Some(Err(e)) => return Err(GatewayError::WebSocket(e)),
                None => {
                    return Err(GatewayError::ConnectionClosed {
                        code: 0,
                        reason: "websocket stream ended".to_string(),
                    })
                }
            };

            match message {
                Message::Text(text) => {
                    trace!(len = text.len(), "received text frame");
                    return parse_payload(text.as_str().as_bytes());
                }
                Message::Binary(data) => {
                    let Self::ZlibStream { inflater, .. } = self else {
                        debug!(
                            len = data.len(),
                            "ignoring binary frame on plaintext transport"
                        );
                        continue;
                    };
                    trace!(len = data.len(), "buffering compressed fragment");
                    if let Some(bytes) = inflater.push(&data)? {
                        return parse_payload(bytes);
                    }
                }
                Message::Close(frame) => {
                    let (code, reason) = frame
                        .map(|f: CloseFrame| (f.code.into(), f.reason.to_string()))
                        .unwrap_or((0, String::new()));
                    return Err(GatewayError::ConnectionClosed { code, reason });
                }
                // Pongs for inbound pings are queued by tungstenite itself.
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }
}

/// The send half of a connection. Payloads always go out as JSON text;
/// payload compression is not supported.
pub(crate) struct GatewaySink {
    sink: SplitSink<WsStream, Message>,
}

impl GatewaySink {
    pub fn new(sink: SplitSink<WsStream, Message>) -> Self {
        Self { sink }
    }

    /// JSON-encode and send one payload.
    pub async fn send<T: Serialize>(&mut self, payload: &T) -> Result<(), GatewayError> {
        let json = serde_json::to_string(payload)?;
        self.send_raw(json).await
    }

    /// Send an already-encoded payload.
    pub async fn send_raw(&mut self, json: String) -> Result<(), GatewayError> {
        trace!(len = json.len(), "sending payload");
        self.sink.send(Message::Text(json.into())).await?;
        Ok(())
    }

    /// Send a close frame with the given code and reason.
    pub async fn close(&mut self, code: u16, reason: &str) -> Result<(), GatewayError> {
        debug!(code, reason, "closing websocket");
        self.sink
            .send(Message::Close(Some(CloseFrame {
                code: WsCloseCode::from(code),
                reason: reason.into(),
            })))
            .await?;
        Ok(())
    }
}

fn parse_payload(bytes: &[u8]) -> Result<RawGatewayPayload, GatewayError> {
    serde_json::from_slice(bytes).map_err(Into::into)
}
