//! Presence structures sent with Presence Update payloads.
//!
//! These mirror the gateway's Update Presence object. Bot users may only
//! set `name`, `state`, `kind`, and `url` on an activity.

use serde::{Deserialize, Serialize};

/// The client's presence, sent at Identify or via a Presence Update.
///
/// See: <https://discord.com/developers/docs/topics/gateway-events#update-presence>
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Presence {
    /// Unix timestamp (milliseconds) of when the client went idle.
    pub since: Option<u64>,

    /// The client's activities.
    pub activities: Vec<Activity>,

    /// The client's status.
    pub status: Status,

    /// Whether the client is AFK.
    pub afk: bool,
}

impl Presence {
    /// A presence with the given status and no activities.
    pub fn status(status: Status) -> Self {
        Self {
            since: None,
            activities: Vec::new(),
            status,
            afk: false,
        }
    }
}

impl Default for Presence {
    fn default() -> Self {
        Self::status(Status::Online)
    }
}

/// An activity shown under the client's name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    /// Activity name.
    pub name: String,

    /// Activity type.
    #[serde(rename = "type")]
    pub kind: ActivityType,

    /// Stream URL, only honoured for [`ActivityType::Streaming`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// User-visible detail line, e.g. the custom status text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl Activity {
    /// A "Playing {name}" activity.
    pub fn playing(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ActivityType::Playing,
            url: None,
            state: None,
        }
    }
}

/// The type of an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum ActivityType {
    /// Playing {name}
    Playing,
    /// Streaming {name}
    Streaming,
    /// Listening to {name}
    Listening,
    /// Watching {name}
    Watching,
    /// {emoji} {name}
    Custom,
    /// Competing in {name}
    Competing,
}

impl From<u8> for ActivityType {
    fn from(value: u8) -> Self {
        match value {
            1 => ActivityType::Streaming,
            2 => ActivityType::Listening,
            3 => ActivityType::Watching,
            4 => ActivityType::Custom,
            5 => ActivityType::Competing,
            _ => ActivityType::Playing,
        }
    }
}

impl From<ActivityType> for u8 {
    fn from(value: ActivityType) -> Self {
        match value {
            ActivityType::Playing => 0,
            ActivityType::Streaming => 1,
            ActivityType::Listening => 2,
            ActivityType::Watching => 3,
            ActivityType::Custom => 4,
            ActivityType::Competing => 5,
        }
    }
}

/// User status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Online.
    #[default]
    Online,
    /// Away / idle.
    Idle,
    /// Do not disturb.
    Dnd,
    /// Shown as offline while connected.
    Invisible,
    /// Offline.
    Offline,
}
