use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior};
use tracing::info;

use crate::migrations;
use crate::pubsub::{PubSub, Subscription};
use crate::{Result, Store, StoreError, Versioned};

/// SQLite-backed store: values live in the `kv` table, notifications go over
/// an in-process [`PubSub`] bus.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    bus: PubSub,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let store = Self::with_connection(conn)?;
        info!("Store opened at {}", path.display());
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            bus: PubSub::new(),
        })
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        f(&mut conn)
    }
}

impl Store for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<Versioned>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row("SELECT value, version FROM kv WHERE key = ?1", [key], |row| {
                    Ok(Versioned {
                        value: row.get(0)?,
                        version: row.get::<_, i64>(1)? as u64,
                    })
                })
                .optional()?;
            Ok(row)
        })
    }

    fn set(&self, key: &str, value: &str) -> Result<u64> {
        self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let version = upsert(&tx, key, value)?;
            tx.commit()?;
            Ok(version)
        })
    }

    fn compare_and_set(&self, key: &str, value: &str, expected: Option<u64>) -> Result<Option<u64>> {
        self.with_conn(|conn| {
            // IMMEDIATE takes the write lock up front so other processes
            // sharing the file cannot slip a write between check and update
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let current: Option<u64> = tx
                .query_row("SELECT version FROM kv WHERE key = ?1", [key], |row| {
                    row.get::<_, i64>(0)
                })
                .optional()?
                .map(|v| v as u64);

            if current != expected {
                return Ok(None);
            }

            let version = upsert(&tx, key, value)?;
            tx.commit()?;
            Ok(Some(version))
        })
    }

    fn publish(&self, channel: &str, payload: &str) -> Result<usize> {
        Ok(self.bus.publish(channel, payload))
    }

    fn subscribe(&self, channels: &[&str]) -> Subscription {
        self.bus.subscribe(channels)
    }
}

fn upsert(tx: &Transaction<'_>, key: &str, value: &str) -> Result<u64> {
    let version: i64 = tx.query_row(
        "INSERT INTO kv (key, value, version) VALUES (?1, ?2, 1)
         ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            version = kv.version + 1,
            updated_at = datetime('now')
         RETURNING version",
        [key, value],
        |row| row.get(0),
    )?;
    Ok(version as u64)
}
