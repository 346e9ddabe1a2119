//! Iridium Gateway - resumable Discord Gateway WebSocket client
#![deny(unsafe_code)]
//!
//! This crate maintains a long-lived connection to Discord's Gateway:
//! it frames JSON payloads over the websocket (optionally inflating a
//! zlib stream), multiplexes the periodic heartbeat with event receive,
//! carries the session across disconnects by resuming where the protocol
//! allows it, and delivers dispatched events to the application over a
//! channel.
//!
//! # Example
//!
//! ```ignore
//! use iridium_gateway::{Client, ClientConfig};
//! use iridium_model::Intents;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::new("your-token", Intents::STANDARD);
//!     let client = Client::new(config);
//!
//!     let (event_tx, event_rx) = flume::unbounded();
//!     tokio::spawn(async move {
//!         while let Ok(event) = event_rx.recv_async().await {
//!             println!("{}", event.event);
//!         }
//!     });
//!
//!     client.run(event_tx).await?;
//!     Ok(())
//! }
//! ```

mod backoff;
mod client;
mod close_code;
mod compression;
pub mod error;
mod heartbeat;
mod opcode;
mod payload;
mod transport;

// Public re-exports
pub use backoff::ExponentialBackoff;
pub use client::{Client, ClientConfig, ConnectionState};
pub use close_code::CloseCode;
pub use error::GatewayError;
pub use opcode::OpCode;
pub use payload::{
    ConnectionProperties, Dispatch, GatewayPayload, HelloData, IdentifyData, RawGatewayPayload,
    ReadyData, ResumeData, ShardId,
};

/// Discord Gateway API version spoken by this crate.
pub const GATEWAY_VERSION: u8 = 10;

/// How long the server is given to send Hello after the socket opens.
pub(crate) const HELLO_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60);
