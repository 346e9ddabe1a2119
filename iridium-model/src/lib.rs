//! Iridium Model - types shared between the gateway client and its callers
#![deny(unsafe_code)]
//!
//! This crate holds the small set of Discord API types that appear on the
//! client's public configuration surface: the [`Intents`] bitfield
//! negotiated at Identify, and the presence structures sent with
//! Presence Update payloads.

pub mod intents;
pub mod presence;

pub use intents::Intents;
pub use presence::{Activity, ActivityType, Presence, Status};
