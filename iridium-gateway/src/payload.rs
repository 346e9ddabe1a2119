//! Gateway payload structures.
//!
//! Every frame on the wire is `{op, d, s?, t?}`. Inbound frames parse into
//! [`RawGatewayPayload`] with the data deferred as a [`RawValue`] until the
//! opcode decides how to interpret it; outbound frames are built with
//! [`GatewayPayload`].
//!
//! [`RawValue`]: serde_json::value::RawValue

use crate::opcode::OpCode;
use iridium_model::{Intents, Presence};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// An inbound Gateway payload with its event data still unparsed.
#[derive(Debug, Deserialize)]
pub struct RawGatewayPayload {
    /// Opcode for the payload.
    pub op: OpCode,

    /// Event data, interpreted per opcode.
    #[serde(default)]
    pub d: Option<Box<RawValue>>,

    /// Sequence number; only Dispatch payloads carry one.
    #[serde(default)]
    pub s: Option<u64>,

    /// Event name; only Dispatch payloads carry one.
    #[serde(default)]
    pub t: Option<Box<str>>,
}

impl RawGatewayPayload {
    /// Parse the `d` field into a concrete type.
    pub fn data<'a, T: Deserialize<'a>>(&'a self) -> Result<T, serde_json::Error> {
        let raw = self.d.as_deref().map_or("null", RawValue::get);
        serde_json::from_str(raw)
    }
}

/// An outbound Gateway payload.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayPayload<D> {
    /// Opcode for the payload.
    pub op: OpCode,

    /// Event data.
    pub d: D,
}

impl<D: Serialize> GatewayPayload<D> {
    /// Create a payload with the given opcode and data.
    pub fn new(op: OpCode, data: D) -> Self {
        Self { op, d: data }
    }
}

/// Data for the Hello opcode (op 10), received after connecting.
#[derive(Debug, Clone, Deserialize)]
pub struct HelloData {
    /// Interval in milliseconds at which to send heartbeats.
    pub heartbeat_interval: u64,
}

/// Shard assignment, serialized as `[id, total]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardId(pub u16, pub u16);

impl ShardId {
    /// This shard's index.
    pub fn id(self) -> u16 {
        self.0
    }

    /// Total number of shards.
    pub fn total(self) -> u16 {
        self.1
    }
}

impl FromStr for ShardId {
    type Err = String;

    /// Parse the `id:total` form used on the command line.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, total) = s
            .split_once(':')
            .ok_or_else(|| format!("expected id:total, got {s:?}"))?;
        let id = id.trim().parse().map_err(|e| format!("shard id: {e}"))?;
        let total = total
            .trim()
            .parse()
            .map_err(|e| format!("shard total: {e}"))?;
        if total == 0 {
            return Err("shard total must be at least 1".to_string());
        }
        Ok(Self(id, total))
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.0, self.1)
    }
}

/// Data for the Identify opcode (op 2), starting a fresh session.
#[derive(Debug, Clone, Serialize)]
pub struct IdentifyData<'a> {
    /// Authentication token.
    pub token: Cow<'a, str>,

    /// Gateway intents.
    pub intents: Intents,

    /// Connection properties.
    pub properties: ConnectionProperties<'a>,

    /// Payload compression; never requested by this client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compress: Option<bool>,

    /// Shard assignment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shard: Option<ShardId>,

    /// Initial presence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence: Option<Presence>,
}

impl<'a> IdentifyData<'a> {
    /// An Identify with the mandatory fields only.
    pub fn new(token: &'a str, intents: Intents) -> Self {
        Self {
            token: Cow::Borrowed(token),
            intents,
            properties: ConnectionProperties::default(),
            compress: None,
            shard: None,
            presence: None,
        }
    }
}

/// Connection properties sent with Identify.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionProperties<'a> {
    /// Operating system.
    pub os: Cow<'a, str>,

    /// Library name.
    pub browser: Cow<'a, str>,

    /// Library name, again, for the device slot.
    pub device: Cow<'a, str>,
}

impl Default for ConnectionProperties<'_> {
    fn default() -> Self {
        Self {
            os: Cow::Borrowed(std::env::consts::OS),
            browser: Cow::Borrowed("iridium"),
            device: Cow::Borrowed("iridium"),
        }
    }
}

/// Data for the Resume opcode (op 6), continuing an interrupted session.
#[derive(Debug, Clone, Serialize)]
pub struct ResumeData<'a> {
    /// Authentication token.
    pub token: Cow<'a, str>,

    /// Session ID from the previous READY event.
    pub session_id: Cow<'a, str>,

    /// Last sequence number received.
    pub seq: u64,
}

/// The READY fields the client itself consumes; everything else in the
/// event is passed through to the application untouched.
#[derive(Debug, Clone, Deserialize)]
pub struct ReadyData {
    /// Session ID for resuming.
    pub session_id: String,

    /// URL to target when resuming this session.
    pub resume_gateway_url: String,
}

/// A Dispatch (op 0) event delivered to the application.
#[derive(Debug, Clone)]
pub struct Dispatch {
    /// Event name, e.g. `READY` or `MESSAGE_CREATE`.
    pub event: Box<str>,

    /// Sequence number of this event.
    pub sequence: u64,

    /// The raw JSON event data.
    pub data: Box<RawValue>,
}

/// Render a heartbeat payload.
///
/// The heartbeat data is the last sequence number, or null before any
/// Dispatch has been received.
pub(crate) fn heartbeat_payload(sequence: Option<u64>) -> String {
    match sequence {
        Some(seq) => format!(r#"{{"op":1,"d":{seq}}}"#),
        None => r#"{"op":1,"d":null}"#.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hello() {
        let payload: RawGatewayPayload =
            serde_json::from_str(r#"{"op":10,"d":{"heartbeat_interval":41250}}"#).unwrap();
        assert_eq!(payload.op, OpCode::Hello);

        let hello: HelloData = payload.data().unwrap();
        assert_eq!(hello.heartbeat_interval, 41250);
    }

    #[test]
    fn test_parse_dispatch() {
        let json = r#"{"op":0,"s":42,"t":"MESSAGE_CREATE","d":{"content":"hi"}}"#;
        let payload: RawGatewayPayload = serde_json::from_str(json).unwrap();

        assert_eq!(payload.op, OpCode::Dispatch);
        assert_eq!(payload.s, Some(42));
        assert_eq!(payload.t.as_deref(), Some("MESSAGE_CREATE"));
        assert_eq!(payload.d.unwrap().get(), r#"{"content":"hi"}"#);
    }

    #[test]
    fn test_parse_null_and_missing_data() {
        let payload: RawGatewayPayload = serde_json::from_str(r#"{"op":11,"d":null}"#).unwrap();
        assert_eq!(payload.op, OpCode::HeartbeatAck);
        assert!(payload.d.is_none());

        let payload: RawGatewayPayload = serde_json::from_str(r#"{"op":11}"#).unwrap();
        assert!(payload.d.is_none());
        assert!(payload.s.is_none());
        assert!(payload.t.is_none());
    }

    #[test]
    fn test_parse_invalid_session_flag() {
        let payload: RawGatewayPayload = serde_json::from_str(r#"{"op":9,"d":false}"#).unwrap();
        assert_eq!(payload.data::<bool>().unwrap(), false);
    }

    #[test]
    fn test_identify_serialization() {
        let mut identify = IdentifyData::new("test_token", Intents::STANDARD);
        identify.shard = Some(ShardId(0, 1));

        let json = serde_json::to_string(&GatewayPayload::new(OpCode::Identify, identify)).unwrap();
        assert!(json.contains(r#""op":2"#));
        assert!(json.contains(r#""token":"test_token""#));
        assert!(json.contains(r#""shard":[0,1]"#));
        assert!(json.contains(r#""os":"#));
        // Unset options stay off the wire entirely.
        assert!(!json.contains("compress"));
        assert!(!json.contains("presence"));
    }

    #[test]
    fn test_resume_serialization_uses_seq() {
        let resume = ResumeData {
            token: Cow::Borrowed("test_token"),
            session_id: Cow::Borrowed("abc"),
            seq: 123,
        };

        let json = serde_json::to_string(&GatewayPayload::new(OpCode::Resume, resume)).unwrap();
        assert!(json.contains(r#""op":6"#));
        assert!(json.contains(r#""session_id":"abc""#));
        assert!(json.contains(r#""seq":123"#));
    }

    #[test]
    fn test_heartbeat_payload() {
        assert_eq!(heartbeat_payload(Some(42)), r#"{"op":1,"d":42}"#);
        assert_eq!(heartbeat_payload(None), r#"{"op":1,"d":null}"#);
    }

    #[test]
    fn test_shard_id_parsing() {
        assert_eq!("0:1".parse::<ShardId>().unwrap(), ShardId(0, 1));
        assert_eq!("3:16".parse::<ShardId>().unwrap(), ShardId(3, 16));
        assert!("3".parse::<ShardId>().is_err());
        assert!("3:0".parse::<ShardId>().is_err());
        assert!("a:b".parse::<ShardId>().is_err());
    }
}
