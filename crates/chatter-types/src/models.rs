use serde::{Deserialize, Serialize};

/// Author name used for join/leave announcements.
pub const SYSTEM_AUTHOR: &str = "system";

/// A single chat line. Immutable once created.
///
/// On the wire this is `{"message": <text>, "user": <author>}`, the shape
/// stored under the history key and published on the messages channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "message")]
    pub text: String,
    #[serde(rename = "user")]
    pub author: String,
}

impl Message {
    pub fn new(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            author: author.into(),
        }
    }

    /// Announcement appended to history when `user` joins the room.
    pub fn joined(user: &str) -> Self {
        Self::new(SYSTEM_AUTHOR, format!("{} just joined the chat room", user))
    }

    /// Announcement appended to history when `user` leaves the room.
    pub fn left(user: &str) -> Self {
        Self::new(SYSTEM_AUTHOR, format!("{} just left the chat room", user))
    }
}
