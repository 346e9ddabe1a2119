//! Authenticated REST client for gateway bootstrap.

use crate::error::HttpError;
use crate::routes::{GatewayBotResponse, GatewayResponse};

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT as USER_AGENT_HEADER};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

/// Versioned API base URL.
pub const API_BASE: &str = "https://discord.com/api/v10";

/// User agent sent on REST requests and the WebSocket handshake.
///
/// Discord mandates the `DiscordBot (<url> <version>)` grammar.
pub const USER_AGENT: &str = concat!(
    "DiscordBot (https://github.com/iridium-rs/iridium ",
    env!("CARGO_PKG_VERSION"),
    ")"
);

/// REST API client for the handful of endpoints the gateway client needs.
pub struct HttpClient {
    client: Client,
    base_url: String,
}

impl HttpClient {
    /// Create a client that authenticates with the given token.
    pub fn new(token: &str) -> Result<Self, HttpError> {
        Self::with_user_agent(token, USER_AGENT)
    }

    /// Create a client with an overridden user agent.
    pub fn with_user_agent(token: &str, user_agent: &str) -> Result<Self, HttpError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(token).map_err(|_| HttpError::Unauthorized)?,
        );
        headers.insert(USER_AGENT_HEADER, HeaderValue::from_str(user_agent)?);

        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            base_url: API_BASE.to_string(),
        })
    }

    /// Point the client at a different API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetch the Gateway WebSocket URL.
    pub async fn get_gateway(&self) -> Result<GatewayResponse, HttpError> {
        self.get("/gateway").await
    }

    /// Fetch the Gateway URL along with shard and session start limits.
    pub async fn get_gateway_bot(&self) -> Result<GatewayBotResponse, HttpError> {
        self.get("/gateway/bot").await
    }

    async fn get<T: DeserializeOwned>(&self, route: &str) -> Result<T, HttpError> {
        let url = format!("{}{}", self.base_url, route);
        debug!(%url, "GET");

        let response = self.client.get(&url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(HttpError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HttpError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}
