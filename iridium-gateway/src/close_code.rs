//! Close-code classification.
//!
//! When a connection ends, the close code observed (or 0 when the stream
//! dropped without a close frame) decides whether the client reconnects,
//! whether the session must be discarded, and which error the caller sees.

/// Close codes where the client may reconnect and potentially resume.
const RECONNECT_CLOSE_CODES: [u16; 9] = [4000, 4001, 4002, 4003, 4005, 4006, 4007, 4008, 4009];

/// Close codes that also discard the current session before reconnecting.
const SESSION_INVALIDATING_CLOSE_CODES: [u16; 2] = [4007, 4009];

/// Discord Gateway close codes with a documented meaning.
///
/// See: <https://discord.com/developers/docs/topics/opcodes-and-status-codes#gateway-gateway-close-event-codes>
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum CloseCode {
    /// Unknown error occurred.
    UnknownError = 4000,
    /// Invalid opcode sent.
    UnknownOpcode = 4001,
    /// Invalid payload (decode error).
    DecodeError = 4002,
    /// Payload sent before identifying.
    NotAuthenticated = 4003,
    /// Invalid token.
    AuthenticationFailed = 4004,
    /// Already authenticated.
    AlreadyAuthenticated = 4005,
    /// Invalid sequence number for resume.
    InvalidSeq = 4007,
    /// Rate limited.
    RateLimited = 4008,
    /// Session timed out.
    SessionTimedOut = 4009,
    /// Invalid shard configuration.
    InvalidShard = 4010,
    /// Too many guilds, sharding required.
    ShardingRequired = 4011,
    /// Invalid API version.
    InvalidApiVersion = 4012,
    /// Invalid intents.
    InvalidIntents = 4013,
    /// Disallowed intents (privileged intent not enabled).
    DisallowedIntents = 4014,
}

impl CloseCode {
    /// Try to convert a raw close code to this enum.
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            4000 => Some(CloseCode::UnknownError),
            4001 => Some(CloseCode::UnknownOpcode),
            4002 => Some(CloseCode::DecodeError),
            4003 => Some(CloseCode::NotAuthenticated),
            4004 => Some(CloseCode::AuthenticationFailed),
            4005 => Some(CloseCode::AlreadyAuthenticated),
            4007 => Some(CloseCode::InvalidSeq),
            4008 => Some(CloseCode::RateLimited),
            4009 => Some(CloseCode::SessionTimedOut),
            4010 => Some(CloseCode::InvalidShard),
            4011 => Some(CloseCode::ShardingRequired),
            4012 => Some(CloseCode::InvalidApiVersion),
            4013 => Some(CloseCode::InvalidIntents),
            4014 => Some(CloseCode::DisallowedIntents),
            _ => None,
        }
    }

    /// The name Discord documents for this code, used when the peer sends
    /// an empty close reason.
    pub const fn description(self) -> &'static str {
        match self {
            CloseCode::UnknownError => "Unknown Error",
            CloseCode::UnknownOpcode => "Unknown Opcode",
            CloseCode::DecodeError => "Decode Error",
            CloseCode::NotAuthenticated => "Not Authenticated",
            CloseCode::AuthenticationFailed => "Authentication Failed",
            CloseCode::AlreadyAuthenticated => "Already Authenticated",
            CloseCode::InvalidSeq => "Invalid Sequence",
            CloseCode::RateLimited => "Rate Limited",
            CloseCode::SessionTimedOut => "Session Timed Out",
            CloseCode::InvalidShard => "Invalid Shard",
            CloseCode::ShardingRequired => "Sharding Required",
            CloseCode::InvalidApiVersion => "Invalid API Version",
            CloseCode::InvalidIntents => "Invalid Intents",
            CloseCode::DisallowedIntents => "Disallowed Intents",
        }
    }

    /// Returns whether reconnection is possible after this close code.
    pub fn can_reconnect(self) -> bool {
        RECONNECT_CLOSE_CODES.contains(&(self as u16))
    }

    /// Returns whether this close code discards the current session.
    pub fn invalidates_session(self) -> bool {
        SESSION_INVALIDATING_CLOSE_CODES.contains(&(self as u16))
    }
}

/// What to do after observing a disconnect with the given close code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DisconnectAction {
    /// Reconnect, resuming unless the session must be discarded first.
    Reconnect {
        /// Clear `session_id` and `resume_gateway_url` before retrying.
        invalidate_session: bool,
    },
    /// Token rejected; surface [`GatewayError::AuthenticationFailed`].
    ///
    /// [`GatewayError::AuthenticationFailed`]: crate::GatewayError::AuthenticationFailed
    AuthenticationFailed,
    /// Intents rejected; surface the privileged subset requested.
    PrivilegedIntentsDenied,
    /// Any other fatal close; surface the code and reason.
    Fatal,
}

/// Classify a close code observed from the peer (or 0 for a bare stream
/// drop) into a reconnect decision.
pub(crate) fn disconnect_action(code: u16) -> DisconnectAction {
    match code {
        // The stream ended without a close frame; plain network trouble.
        0 => DisconnectAction::Reconnect {
            invalidate_session: false,
        },
        4004 => DisconnectAction::AuthenticationFailed,
        4014 => DisconnectAction::PrivilegedIntentsDenied,
        c if RECONNECT_CLOSE_CODES.contains(&c) => DisconnectAction::Reconnect {
            invalidate_session: SESSION_INVALIDATING_CLOSE_CODES.contains(&c),
        },
        _ => DisconnectAction::Fatal,
    }
}

/// Human-readable close description for logs, falling back to the raw code.
pub(crate) fn describe(code: u16, reason: &str) -> String {
    if !reason.is_empty() {
        return reason.to_string();
    }
    match CloseCode::from_code(code) {
        Some(cc) => cc.description().to_string(),
        None => format!("close code {code}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconnect_set() {
        for code in RECONNECT_CLOSE_CODES {
            assert_eq!(
                disconnect_action(code),
                DisconnectAction::Reconnect {
                    invalidate_session: code == 4007 || code == 4009,
                },
                "code {code}",
            );
        }
    }

    #[test]
    fn test_special_fatal_mappings() {
        assert_eq!(disconnect_action(4004), DisconnectAction::AuthenticationFailed);
        assert_eq!(
            disconnect_action(4014),
            DisconnectAction::PrivilegedIntentsDenied
        );
    }

    #[test]
    fn test_other_codes_fatal() {
        for code in [1000, 1001, 1011, 4010, 4011, 4012, 4013, 4015, 4999] {
            assert_eq!(disconnect_action(code), DisconnectAction::Fatal, "code {code}");
        }
    }

    #[test]
    fn test_network_drop_reconnects() {
        assert_eq!(
            disconnect_action(0),
            DisconnectAction::Reconnect {
                invalidate_session: false,
            }
        );
    }

    #[test]
    fn test_close_code_predicates() {
        assert!(CloseCode::UnknownError.can_reconnect());
        assert!(!CloseCode::UnknownError.invalidates_session());
        assert!(CloseCode::InvalidSeq.invalidates_session());
        assert!(CloseCode::SessionTimedOut.invalidates_session());
        assert!(!CloseCode::DisallowedIntents.can_reconnect());
        assert!(!CloseCode::ShardingRequired.can_reconnect());
    }

    #[test]
    fn test_describe_falls_back_to_table() {
        assert_eq!(describe(4008, ""), "Rate Limited");
        assert_eq!(describe(4008, "slow down"), "slow down");
        assert_eq!(describe(4006, ""), "close code 4006");
    }
}
