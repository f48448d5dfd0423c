use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::pubsub::{PubSub, Subscription};
use crate::{Result, Store, StoreError, Versioned};

/// Non-persistent store for single-process runs and tests.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Versioned>>,
    bus: PubSub,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: while offline every call fails with
    /// [`StoreError::Unavailable`] and subscriptions receive nothing new.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".into()));
        }
        Ok(())
    }

    fn with_values<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut HashMap<String, Versioned>) -> T,
    {
        self.check_online()?;
        let mut values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(f(&mut values))
    }
}

fn write(values: &mut HashMap<String, Versioned>, key: &str, value: &str) -> u64 {
    let entry = values.entry(key.to_string()).or_insert_with(|| Versioned {
        value: String::new(),
        version: 0,
    });
    entry.value = value.to_string();
    entry.version += 1;
    entry.version
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Versioned>> {
        self.with_values(|values| values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<u64> {
        self.with_values(|values| write(values, key, value))
    }

    fn compare_and_set(&self, key: &str, value: &str, expected: Option<u64>) -> Result<Option<u64>> {
        self.with_values(|values| {
            let current = values.get(key).map(|v| v.version);
            (current == expected).then(|| write(values, key, value))
        })
    }

    fn publish(&self, channel: &str, payload: &str) -> Result<usize> {
        self.check_online()?;
        Ok(self.bus.publish(channel, payload))
    }

    fn subscribe(&self, channels: &[&str]) -> Subscription {
        self.bus.subscribe(channels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_match_sqlite_semantics() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").unwrap(), None);
        assert_eq!(store.compare_and_set("k", "a", None).unwrap(), Some(1));
        assert_eq!(store.compare_and_set("k", "b", None).unwrap(), None);
        assert_eq!(store.set("k", "c").unwrap(), 2);
        assert_eq!(store.compare_and_set("k", "d", Some(1)).unwrap(), None);
        assert_eq!(store.get("k").unwrap().unwrap().value, "c");
    }

    #[test]
    fn offline_store_reports_unavailable() {
        let store = MemoryStore::new();
        store.set("k", "v").unwrap();

        store.set_offline(true);
        assert!(matches!(store.get("k"), Err(StoreError::Unavailable(_))));
        assert!(matches!(store.publish("c", "p"), Err(StoreError::Unavailable(_))));

        store.set_offline(false);
        assert_eq!(store.get("k").unwrap().unwrap().value, "v");
    }
}
