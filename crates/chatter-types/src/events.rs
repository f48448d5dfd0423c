use serde::{Deserialize, Serialize};

use crate::models::Message;
use crate::{MESSAGES_CHANNEL, USERS_CHANNEL};

/// Ephemeral change notification. Travels over the store's pub/sub channels
/// and is then fanned out to live viewers.
///
/// Viewers receive it as `{"event": "message", "data": {...}}` or
/// `{"event": "users", "data": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum Notification {
    /// A message was appended to the history
    Message(Message),

    /// The full active-user list after a join or leave
    Users(Vec<String>),
}

impl Notification {
    /// Pub/sub channel this notification is published on.
    pub fn channel(&self) -> &'static str {
        match self {
            Self::Message(_) => MESSAGES_CHANNEL,
            Self::Users(_) => USERS_CHANNEL,
        }
    }

    /// Serialize the channel payload (the bare message or user list).
    pub fn encode_payload(&self) -> serde_json::Result<String> {
        match self {
            Self::Message(msg) => serde_json::to_string(msg),
            Self::Users(users) => serde_json::to_string(users),
        }
    }

    /// Rebuild a notification from a channel name and its payload.
    /// Returns `None` for channels that carry no notifications.
    pub fn decode(channel: &str, payload: &str) -> Option<serde_json::Result<Self>> {
        match channel {
            MESSAGES_CHANNEL => Some(serde_json::from_str(payload).map(Self::Message)),
            USERS_CHANNEL => Some(serde_json::from_str(payload).map(Self::Users)),
            _ => None,
        }
    }
}
