use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;

use chatter_types::events::Notification;

/// Fans notifications out to every connected live viewer.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Every connected viewer holds a receiver on this channel
    broadcast_tx: broadcast::Sender<Notification>,

    /// Ids of currently connected viewers
    viewers: RwLock<HashSet<Uuid>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                viewers: RwLock::new(HashSet::new()),
            }),
        }
    }

    /// Subscribe to notifications. Only those broadcast after this call are received.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Broadcast to all viewers. Returns how many receivers it was queued for.
    pub fn broadcast(&self, notification: Notification) -> usize {
        self.inner.broadcast_tx.send(notification).unwrap_or(0)
    }

    pub async fn register_viewer(&self) -> Uuid {
        let viewer_id = Uuid::new_v4();
        self.inner.viewers.write().await.insert(viewer_id);
        viewer_id
    }

    pub async fn unregister_viewer(&self, viewer_id: Uuid) {
        self.inner.viewers.write().await.remove(&viewer_id);
    }

    pub async fn viewer_count(&self) -> usize {
        self.inner.viewers.read().await.len()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
