//! Key/value + publish/subscribe capability the chat core is built on.
//!
//! The core never talks to a backend directly: it only sees [`Store`], which
//! offers versioned get/set, an atomic compare-and-set, and a pub/sub bus.

pub mod memory;
pub mod migrations;
pub mod pubsub;
pub mod sqlite;

use std::time::Duration;

use thiserror::Error;

pub use memory::MemoryStore;
pub use pubsub::{Publication, PubSub, Subscription};
pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(#[from] rusqlite::Error),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// A stored value together with the version it was written at.
/// Versions start at 1 and grow by one on every write to the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned {
    pub value: String,
    pub version: u64,
}

/// Blocking store capability. Async callers run these on the blocking pool.
pub trait Store: Send + Sync + 'static {
    fn get(&self, key: &str) -> Result<Option<Versioned>>;

    /// Unconditional overwrite. Returns the new version.
    fn set(&self, key: &str, value: &str) -> Result<u64>;

    /// Write only if the key is currently at `expected` (`None` = absent).
    /// Returns the new version, or `None` if someone else wrote first.
    fn compare_and_set(&self, key: &str, value: &str, expected: Option<u64>) -> Result<Option<u64>>;

    /// Publish a payload. Returns how many subscriptions it reached.
    fn publish(&self, channel: &str, payload: &str) -> Result<usize>;

    fn subscribe(&self, channels: &[&str]) -> Subscription;
}
