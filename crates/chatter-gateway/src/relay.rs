use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, trace, warn};

use chatter_store::{Publication, Store, Subscription};
use chatter_types::events::Notification;
use chatter_types::{MESSAGES_CHANNEL, USERS_CHANNEL};

use crate::dispatcher::Dispatcher;

/// Subscribe to the notification channels and start forwarding to viewers.
///
/// The subscription is taken before this returns, so nothing published
/// afterwards is missed.
pub fn spawn_relay(store: Arc<dyn Store>, dispatcher: Dispatcher) -> JoinHandle<()> {
    let subscription = store.subscribe(&[MESSAGES_CHANNEL, USERS_CHANNEL]);
    info!("Relay subscribed to {} and {}", MESSAGES_CHANNEL, USERS_CHANNEL);
    tokio::spawn(run_relay(subscription, dispatcher))
}

pub async fn run_relay(mut subscription: Subscription, dispatcher: Dispatcher) {
    while let Some(publication) = subscription.recv().await {
        dispatch(&dispatcher, &publication);
    }
    info!("Relay subscription closed");
}

fn dispatch(dispatcher: &Dispatcher, publication: &Publication) {
    match Notification::decode(&publication.channel, &publication.payload) {
        Some(Ok(notification)) => {
            let viewers = dispatcher.broadcast(notification);
            trace!("Relayed {} payload to {} viewers", publication.channel, viewers);
        }
        Some(Err(e)) => {
            warn!(
                "Dropping malformed payload on {}: {} -- raw: {}",
                publication.channel,
                e,
                publication.payload.chars().take(200).collect::<String>()
            );
        }
        None => trace!("Ignoring publication on {}", publication.channel),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatter_store::MemoryStore;
    use chatter_types::models::Message;
    use std::time::Duration;

    async fn next(rx: &mut tokio::sync::broadcast::Receiver<Notification>) -> Notification {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("relay did not forward in time")
            .unwrap()
    }

    #[tokio::test]
    async fn forwards_both_channels() {
        let store = Arc::new(MemoryStore::new());
        let dispatcher = Dispatcher::new();
        let mut viewer = dispatcher.subscribe();
        let relay = spawn_relay(store.clone(), dispatcher.clone());

        store
            .publish(MESSAGES_CHANNEL, r#"{"message":"hi","user":"alice"}"#)
            .unwrap();
        store.publish(USERS_CHANNEL, r#"["alice"]"#).unwrap();

        assert_eq!(next(&mut viewer).await, Notification::Message(Message::new("alice", "hi")));
        assert_eq!(next(&mut viewer).await, Notification::Users(vec!["alice".into()]));
        relay.abort();
    }

    #[tokio::test]
    async fn skips_malformed_payloads() {
        let store = Arc::new(MemoryStore::new());
        let dispatcher = Dispatcher::new();
        let mut viewer = dispatcher.subscribe();
        let relay = spawn_relay(store.clone(), dispatcher.clone());

        store.publish(USERS_CHANNEL, "{broken").unwrap();
        store.publish("unrelated", "[]").unwrap();
        store.publish(USERS_CHANNEL, "[]").unwrap();

        assert_eq!(next(&mut viewer).await, Notification::Users(vec![]));
        relay.abort();
    }

    #[tokio::test]
    async fn ends_when_store_goes_away() {
        let store = Arc::new(MemoryStore::new());
        let relay = spawn_relay(store.clone(), Dispatcher::new());
        drop(store);

        tokio::time::timeout(Duration::from_secs(2), relay)
            .await
            .expect("relay kept running")
            .unwrap();
    }
}
