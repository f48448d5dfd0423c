pub mod api;
pub mod events;
pub mod models;

/// Store key holding the serialized chat history.
pub const HISTORY_KEY: &str = "chat_history";
/// Store key holding the serialized active-user list.
pub const USERS_KEY: &str = "active_users";

/// Pub/sub channel carrying one serialized `Message` per publication.
pub const MESSAGES_CHANNEL: &str = "chat_messages";
/// Pub/sub channel carrying the full serialized active-user list.
pub const USERS_CHANNEL: &str = "active_users";
