use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, bail};

/// Which [`chatter_store::Store`] backend to run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Sqlite,
    Memory,
}

impl FromStr for StoreKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            other => bail!("unknown store backend '{}' (expected sqlite or memory)", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub store: StoreKind,
    pub db_path: PathBuf,
    pub store_timeout: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let host = lookup("CHATTER_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = lookup("CHATTER_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("CHATTER_PORT must be a port number")?;
        let store = lookup("CHATTER_STORE")
            .unwrap_or_else(|| "sqlite".into())
            .parse()?;
        let db_path = PathBuf::from(lookup("CHATTER_DB_PATH").unwrap_or_else(|| "chatter.db".into()));
        let timeout_ms: u64 = lookup("CHATTER_STORE_TIMEOUT_MS")
            .unwrap_or_else(|| "2000".into())
            .parse()
            .context("CHATTER_STORE_TIMEOUT_MS must be a number of milliseconds")?;
        if timeout_ms == 0 {
            bail!("CHATTER_STORE_TIMEOUT_MS must be greater than zero");
        }

        Ok(Self {
            host,
            port,
            store,
            db_path,
            store_timeout: Duration::from_millis(timeout_ms),
        })
    }
}
