//! Server configuration
//!
//! Read once at startup from `QUAY_*` environment variables.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 5;
const DEFAULT_MAX_CLAIM: usize = 100;

/// Which storage backend to run against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreKind {
    #[default]
    Postgres,
    /// Process-local state, lost on restart
    Memory,
}

impl FromStr for StoreKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreKind::Postgres),
            "memory" | "in-memory" => Ok(StoreKind::Memory),
            other => bail!("unknown store '{}' (expected 'postgres' or 'memory')", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub store: StoreKind,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub max_claim: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            store: StoreKind::default(),
            database_url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS),
            max_claim: DEFAULT_MAX_CLAIM,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(addr) = lookup("QUAY_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(store) = lookup("QUAY_STORE") {
            config.store = store.parse()?;
        }
        config.database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        if let Some(value) = lookup("QUAY_DB_MAX_CONNECTIONS") {
            config.max_connections = value
                .trim()
                .parse()
                .with_context(|| format!("invalid QUAY_DB_MAX_CONNECTIONS: {}", value))?;
        }
        if let Some(value) = lookup("QUAY_DB_ACQUIRE_TIMEOUT") {
            let secs: u64 = value
                .trim()
                .parse()
                .with_context(|| format!("invalid QUAY_DB_ACQUIRE_TIMEOUT: {}", value))?;
            config.acquire_timeout = Duration::from_secs(secs);
        }
        if let Some(value) = lookup("QUAY_MAX_CLAIM") {
            config.max_claim = value
                .trim()
                .parse()
                .with_context(|| format!("invalid QUAY_MAX_CLAIM: {}", value))?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.store == StoreKind::Postgres && self.database_url.is_none() {
            bail!("DATABASE_URL must be set when QUAY_STORE is postgres");
        }
        if self.max_connections == 0 {
            bail!("QUAY_DB_MAX_CONNECTIONS must be at least 1");
        }
        if self.max_claim == 0 {
            bail!("QUAY_MAX_CLAIM must be at least 1");
        }
        Ok(())
    }
}
