//! Process-local working copies of the history and active-user lists.
//!
//! The store holds the authoritative values. Each [`Slot`] remembers the
//! version it last saw so writes go through `compare_and_set` and a
//! concurrent writer can never be silently overwritten.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use chatter_store::{Store, StoreError};
use chatter_types::models::Message;
use chatter_types::{HISTORY_KEY, USERS_KEY};

use crate::error::ChatError;

/// How many times an update re-reads and re-applies before giving up.
pub const MAX_UPDATE_ATTEMPTS: usize = 8;

/// Async, time-bounded access to a blocking [`Store`].
#[derive(Clone)]
pub struct StoreHandle {
    store: Arc<dyn Store>,
    timeout: Duration,
}

impl StoreHandle {
    pub fn new(store: Arc<dyn Store>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Run a store call off the async runtime, failing after the timeout.
    pub async fn call<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&dyn Store) -> chatter_store::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.store.clone();
        let task = tokio::task::spawn_blocking(move || f(store.as_ref()));

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(StoreError::Unavailable(format!("store worker failed: {}", e))),
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        }
    }
}

struct Cached<T> {
    items: Vec<T>,
    /// Store version `items` was read or written at. `None` when the key
    /// was absent at the last refresh.
    version: Option<u64>,
}

/// Working copy of one list persisted under a fixed key.
pub struct Slot<T> {
    key: &'static str,
    handle: StoreHandle,
    cached: RwLock<Cached<T>>,
}

impl<T> Slot<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn new(key: &'static str, handle: StoreHandle) -> Self {
        Self {
            key,
            handle,
            cached: RwLock::new(Cached {
                items: Vec::new(),
                version: None,
            }),
        }
    }

    /// Current working copy, without touching the store.
    pub async fn snapshot(&self) -> Vec<T> {
        self.cached.read().await.items.clone()
    }

    /// Reload from the store and return the fresh working copy.
    ///
    /// An absent key keeps the working copy (stale but available). A failed
    /// fetch also keeps it, but the error is returned.
    pub async fn refresh(&self) -> Result<Vec<T>, ChatError> {
        let key = self.key;
        let fetched = self.handle.call(move |store| store.get(key)).await?;

        let mut cached = self.cached.write().await;
        match fetched {
            Some(stored) => {
                // A write of ours may already have landed a newer version
                if cached.version.is_none_or(|v| v <= stored.version) {
                    cached.items = serde_json::from_str(&stored.value)
                        .map_err(|source| ChatError::Corrupt { key, source })?;
                    cached.version = Some(stored.version);
                }
            }
            None => {
                if !cached.items.is_empty() {
                    debug!(key, "Key absent in store, keeping {} cached items", cached.items.len());
                }
                cached.version = None;
            }
        }

        Ok(cached.items.clone())
    }

    /// Unconditionally write the working copy back to the store.
    pub async fn persist(&self) -> Result<u64, ChatError> {
        let key = self.key;
        let encoded = serde_json::to_string(&self.cached.read().await.items)?;
        let version = self.handle.call(move |store| store.set(key, &encoded)).await?;

        let mut cached = self.cached.write().await;
        if cached.version.is_none_or(|v| v < version) {
            cached.version = Some(version);
        }
        Ok(version)
    }

    /// Read-modify-write against the latest stored value.
    ///
    /// `apply` runs on a fresh copy each attempt, so any precondition it
    /// checks is re-checked after losing a race. An `Err` from `apply`
    /// aborts without writing. Returns `apply`'s output and the list as
    /// written.
    pub async fn update<F, R>(&self, mut apply: F) -> Result<(R, Vec<T>), ChatError>
    where
        F: FnMut(&mut Vec<T>) -> Result<R, ChatError>,
    {
        let key = self.key;

        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            self.refresh().await?;

            let (mut items, expected) = {
                let cached = self.cached.read().await;
                (cached.items.clone(), cached.version)
            };

            let outcome = apply(&mut items)?;
            let encoded = serde_json::to_string(&items)?;

            let written = self
                .handle
                .call(move |store| store.compare_and_set(key, &encoded, expected))
                .await?;

            match written {
                Some(version) => {
                    let mut cached = self.cached.write().await;
                    if cached.version.is_none_or(|v| v < version) {
                        cached.items = items.clone();
                        cached.version = Some(version);
                    }
                    return Ok((outcome, items));
                }
                None => debug!(key, attempt, "Concurrent write detected, retrying"),
            }
        }

        warn!(key, "Update abandoned after {} attempts", MAX_UPDATE_ATTEMPTS);
        Err(ChatError::Contended(key))
    }
}

/// The two lists this process keeps in sync with the store.
pub struct StateCache {
    history: Slot<Message>,
    users: Slot<String>,
}

impl StateCache {
    pub fn new(handle: StoreHandle) -> Self {
        Self {
            history: Slot::new(HISTORY_KEY, handle.clone()),
            users: Slot::new(USERS_KEY, handle),
        }
    }

    pub fn history(&self) -> &Slot<Message> {
        &self.history
    }

    pub fn users(&self) -> &Slot<String> {
        &self.users
    }

    pub async fn refresh_all(&self) -> Result<(), ChatError> {
        self.history.refresh().await?;
        self.users.refresh().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatter_store::MemoryStore;

    fn cache_over(store: Arc<MemoryStore>) -> StateCache {
        StateCache::new(StoreHandle::new(store, Duration::from_secs(2)))
    }

    #[tokio::test]
    async fn refresh_of_empty_store_is_empty() {
        let cache = cache_over(Arc::new(MemoryStore::new()));
        assert!(cache.history().refresh().await.unwrap().is_empty());
        assert!(cache.users().refresh().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn refresh_picks_up_foreign_writes() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_over(store.clone());

        store.set(USERS_KEY, r#"["alice","bob"]"#).unwrap();
        assert_eq!(cache.users().refresh().await.unwrap(), vec!["alice", "bob"]);
        assert_eq!(cache.users().snapshot().await, vec!["alice", "bob"]);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_stale_copy() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_over(store.clone());
        store.set(USERS_KEY, r#"["alice"]"#).unwrap();
        cache.users().refresh().await.unwrap();

        store.set_offline(true);
        let err = cache.users().refresh().await.unwrap_err();
        assert!(matches!(err, ChatError::Store(StoreError::Unavailable(_))));
        assert_eq!(cache.users().snapshot().await, vec!["alice"]);
    }

    #[tokio::test]
    async fn corrupt_value_is_reported() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_over(store.clone());
        store.set(HISTORY_KEY, "{not json").unwrap();

        let err = cache.history().refresh().await.unwrap_err();
        assert!(matches!(err, ChatError::Corrupt { key: HISTORY_KEY, .. }));
    }

    #[tokio::test]
    async fn update_retries_after_losing_a_race() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_over(store.clone());
        let mut attempts = 0;

        let (_, written) = cache
            .users()
            .update(|users| {
                attempts += 1;
                if attempts == 1 {
                    // Another writer lands between our read and our write
                    store.set(USERS_KEY, r#"["zed"]"#).unwrap();
                }
                users.push("bob".to_string());
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(attempts, 2);
        assert_eq!(written, vec!["zed", "bob"]);
        assert_eq!(store.get(USERS_KEY).unwrap().unwrap().value, r#"["zed","bob"]"#);
    }

    #[tokio::test]
    async fn update_gives_up_when_always_beaten() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_over(store.clone());
        let mut attempts = 0;

        let err = cache
            .users()
            .update(|users| {
                attempts += 1;
                store.set(USERS_KEY, "[]").unwrap();
                users.push("bob".to_string());
                Ok(())
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ChatError::Contended(USERS_KEY)));
        assert_eq!(attempts, MAX_UPDATE_ATTEMPTS);
    }

    #[tokio::test]
    async fn rejected_update_writes_nothing() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_over(store.clone());

        let err = cache
            .users()
            .update(|_| Err::<(), _>(ChatError::InvalidInput("nope")))
            .await
            .unwrap_err();

        assert!(matches!(err, ChatError::InvalidInput(_)));
        assert_eq!(store.get(USERS_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn absent_key_is_recreated_from_working_copy() {
        // Working copy from an earlier read of a store that has since lost the key
        let store = Arc::new(MemoryStore::new());
        let cache = cache_over(store.clone());
        *cache.users().cached.write().await = Cached {
            items: vec!["alice".to_string()],
            version: Some(3),
        };

        let (_, written) = cache
            .users()
            .update(|users| {
                users.push("bob".to_string());
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(written, vec!["alice", "bob"]);
        assert_eq!(store.get(USERS_KEY).unwrap().unwrap().version, 1);
    }

    /// Memory store whose writes take longer than the call timeout.
    struct SlowWrites(MemoryStore);

    impl Store for SlowWrites {
        fn get(&self, key: &str) -> chatter_store::Result<Option<chatter_store::Versioned>> {
            self.0.get(key)
        }

        fn set(&self, key: &str, value: &str) -> chatter_store::Result<u64> {
            std::thread::sleep(Duration::from_millis(200));
            self.0.set(key, value)
        }

        fn compare_and_set(&self, key: &str, value: &str, expected: Option<u64>) -> chatter_store::Result<Option<u64>> {
            self.0.compare_and_set(key, value, expected)
        }

        fn publish(&self, channel: &str, payload: &str) -> chatter_store::Result<usize> {
            self.0.publish(channel, payload)
        }

        fn subscribe(&self, channels: &[&str]) -> chatter_store::Subscription {
            self.0.subscribe(channels)
        }
    }

    #[tokio::test]
    async fn timed_out_write_may_still_land() {
        let store = Arc::new(SlowWrites(MemoryStore::new()));
        let handle = StoreHandle::new(store.clone(), Duration::from_millis(20));

        let err = handle
            .call(|store| store.set(USERS_KEY, r#"["late"]"#))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Timeout(_)));

        // The blocking write is not cancelled by the timeout
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(store.get(USERS_KEY).unwrap().unwrap().value, r#"["late"]"#);
    }

    #[tokio::test]
    async fn persist_overwrites_unconditionally() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_over(store.clone());
        store.set(USERS_KEY, r#"["ghost"]"#).unwrap();

        // Working copy is still empty, persist does not look first
        assert_eq!(cache.users().persist().await.unwrap(), 2);
        assert_eq!(store.get(USERS_KEY).unwrap().unwrap().value, "[]");
    }
}
