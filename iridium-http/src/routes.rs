//! REST API response types.

use serde::Deserialize;

/// Response from GET /gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayResponse {
    /// Gateway WebSocket URL.
    pub url: String,
}

/// Response from GET /gateway/bot.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayBotResponse {
    /// Gateway WebSocket URL.
    pub url: String,

    /// Recommended number of shards.
    pub shards: u16,

    /// Session start limit information.
    pub session_start_limit: SessionStartLimit,
}

/// Session start limit from /gateway/bot.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionStartLimit {
    /// Total number of session starts allowed.
    pub total: u32,

    /// Remaining session starts.
    pub remaining: u32,

    /// Milliseconds until the limit resets.
    pub reset_after: u64,

    /// Maximum number of concurrent identify operations.
    pub max_concurrency: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_response() {
        let resp: GatewayResponse =
            serde_json::from_str(r#"{"url":"wss://gateway.discord.gg"}"#).unwrap();
        assert_eq!(resp.url, "wss://gateway.discord.gg");
    }

    #[test]
    fn test_gateway_bot_response() {
        let json = r#"{
            "url": "wss://gateway.discord.gg",
            "shards": 9,
            "session_start_limit": {
                "total": 1000,
                "remaining": 999,
                "reset_after": 14400000,
                "max_concurrency": 1
            }
        }"#;

        let resp: GatewayBotResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.shards, 9);
        assert_eq!(resp.session_start_limit.max_concurrency, 1);
    }
}
