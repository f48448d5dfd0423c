use std::collections::HashSet;

use tokio::sync::broadcast;
use tracing::warn;

const BUS_CAPACITY: usize = 1024;

/// One payload published on a named channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    pub channel: String,
    pub payload: String,
}

/// In-process publish/subscribe bus shared by the store backends.
///
/// All channels share one broadcast queue, so publications on a channel reach
/// every subscription in publish order.
#[derive(Clone)]
pub struct PubSub {
    tx: broadcast::Sender<Publication>,
}

impl PubSub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    /// Returns the number of subscriptions the payload was queued for.
    pub fn publish(&self, channel: &str, payload: &str) -> usize {
        // Err only means nobody is subscribed yet
        self.tx
            .send(Publication {
                channel: channel.to_string(),
                payload: payload.to_string(),
            })
            .unwrap_or(0)
    }

    pub fn subscribe(&self, channels: &[&str]) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
            channels: channels.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl Default for PubSub {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving end of a subscription to one or more channels.
pub struct Subscription {
    rx: broadcast::Receiver<Publication>,
    channels: HashSet<String>,
}

impl Subscription {
    /// Next publication on a subscribed channel, or `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<Publication> {
        loop {
            match self.rx.recv().await {
                Ok(publication) => {
                    if self.channels.contains(&publication.channel) {
                        return Some(publication);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Subscription lagged by {} publications", n);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
