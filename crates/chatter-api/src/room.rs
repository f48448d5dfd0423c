use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use chatter_store::Store;
use chatter_types::events::Notification;
use chatter_types::models::{Message, SYSTEM_AUTHOR};

use crate::cache::{StateCache, StoreHandle};
use crate::error::ChatError;

const MAX_USERNAME_CHARS: usize = 32;
const MAX_MESSAGE_CHARS: usize = 2000;

/// The single chat room: state cache plus the operations that mutate it.
///
/// Every mutation is refresh, mutate, compare-and-set, then notify. Viewers
/// only ever learn about a change through the store's pub/sub channels.
pub struct ChatRoom {
    store: StoreHandle,
    cache: StateCache,
}

impl ChatRoom {
    pub fn new(store: Arc<dyn Store>, timeout: Duration) -> Self {
        let store = StoreHandle::new(store, timeout);
        Self {
            cache: StateCache::new(store.clone()),
            store,
        }
    }

    /// Initial refresh of both lists.
    pub async fn load(&self) -> Result<(), ChatError> {
        self.cache.refresh_all().await?;
        info!(
            "Chat room loaded: {} messages, {} active users",
            self.cache.history().snapshot().await.len(),
            self.cache.users().snapshot().await.len()
        );
        Ok(())
    }

    pub async fn messages(&self) -> Result<Vec<Message>, ChatError> {
        self.cache.history().refresh().await
    }

    pub async fn users(&self) -> Result<Vec<String>, ChatError> {
        self.cache.users().refresh().await
    }

    pub async fn join(&self, user: &str) -> Result<(), ChatError> {
        let user = validate_username(user)?;

        let (_, users) = self
            .cache
            .users()
            .update(|users| {
                if users.contains(&user) {
                    return Err(ChatError::UserExists(user.clone()));
                }
                users.push(user.clone());
                Ok(())
            })
            .await?;

        info!("{} joined the chat room", user);
        self.announce_membership(Message::joined(&user), users).await
    }

    pub async fn leave(&self, user: &str) -> Result<(), ChatError> {
        let user = validate_username(user)?;

        let (_, users) = self
            .cache
            .users()
            .update(|users| {
                let Some(pos) = users.iter().position(|u| *u == user) else {
                    return Err(ChatError::UserNotFound(user.clone()));
                };
                users.remove(pos);
                Ok(())
            })
            .await?;

        info!("{} left the chat room", user);
        self.announce_membership(Message::left(&user), users).await
    }

    /// Post a message. The author does not have to be an active user.
    pub async fn post(&self, user: &str, text: &str) -> Result<Message, ChatError> {
        let author = validate_username(user)?;
        if text.trim().is_empty() {
            return Err(ChatError::InvalidInput("message must not be empty"));
        }
        if text.chars().count() > MAX_MESSAGE_CHARS {
            return Err(ChatError::InvalidInput("message is too long"));
        }

        let message = Message::new(author, text);
        self.append(message.clone()).await?;
        debug!("{} posted {} chars", message.author, message.text.chars().count());

        self.notify(Notification::Message(message.clone())).await;
        self.settle().await;
        Ok(message)
    }

    /// Record and publish a join/leave once the user list is persisted.
    ///
    /// The new user list is published even if appending the announcement
    /// fails, so viewers never miss a membership change that was saved.
    async fn announce_membership(&self, announcement: Message, users: Vec<String>) -> Result<(), ChatError> {
        let appended = self.append(announcement.clone()).await;
        if appended.is_ok() {
            self.notify(Notification::Message(announcement)).await;
        }
        self.notify(Notification::Users(users)).await;
        self.settle().await;
        appended
    }

    async fn append(&self, message: Message) -> Result<(), ChatError> {
        self.cache
            .history()
            .update(|history| {
                history.push(message.clone());
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Publish after the change is persisted. A failed publish is only
    /// logged: the stored state is already correct and viewers can re-list.
    async fn notify(&self, notification: Notification) {
        let channel = notification.channel();
        let payload = match notification.encode_payload() {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to encode {} notification: {}", channel, e);
                return;
            }
        };

        match self.store.call(move |store| store.publish(channel, &payload)).await {
            Ok(receivers) => debug!("Published on {} to {} subscribers", channel, receivers),
            Err(e) => warn!("Failed to publish on {}: {}", channel, e),
        }
    }

    /// Trailing refresh so the working copies track writes from elsewhere.
    async fn settle(&self) {
        if let Err(e) = self.cache.refresh_all().await {
            debug!("Trailing refresh failed: {}", e);
        }
    }
}

/// Usernames are compared as sent; only blank names are rejected.
fn validate_username(name: &str) -> Result<String, ChatError> {
    if name.trim().is_empty() || name.chars().count() > MAX_USERNAME_CHARS {
        return Err(ChatError::InvalidInput("username must be 1-32 characters"));
    }
    if name == SYSTEM_AUTHOR {
        return Err(ChatError::InvalidInput("username is reserved"));
    }
    Ok(name.to_string())
}
