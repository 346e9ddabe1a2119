//! Iridium HTTP - the Gateway client's HTTP bootstrap
#![deny(unsafe_code)]
//!
//! The Gateway's WebSocket URL is discovered over the REST API. This crate
//! holds that single concern: an authenticated client for `GET /gateway`
//! (and `GET /gateway/bot`, which additionally reports shard and session
//! start limits), plus the user-agent string shared with the WebSocket
//! handshake.

mod client;
pub mod error;
mod routes;

pub use client::{HttpClient, API_BASE, USER_AGENT};
pub use error::HttpError;
pub use routes::{GatewayBotResponse, GatewayResponse, SessionStartLimit};
