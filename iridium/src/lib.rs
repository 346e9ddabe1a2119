//! Iridium - a minimal Discord Gateway client.
//!
//! This crate re-exports the commonly used pieces of the workspace:
//! the gateway [`Client`], its configuration, and the model types that
//! appear on its surface.

pub use iridium_gateway as gateway;
pub use iridium_http as http;
pub use iridium_model as model;

pub use iridium_gateway::{
    Client, ClientConfig, ConnectionState, Dispatch, GatewayError, ShardId,
};
pub use iridium_http::HttpClient;
pub use iridium_model::{Activity, ActivityType, Intents, Presence, Status};
