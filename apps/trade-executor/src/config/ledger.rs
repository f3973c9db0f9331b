//! Trade ledger configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::persistence::default_true;

/// Ledger implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackend {
    /// `PostgreSQL` `trades` table.
    Postgres,
    /// Process memory; lost on restart.
    #[default]
    Memory,
}

/// Ledger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Backend.
    #[serde(default)]
    pub backend: LedgerBackend,
    /// `PostgreSQL` URL (required for `postgres`).
    #[serde(default)]
    pub database_url: String,
    /// Pool size.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Connection attempts at startup.
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
    /// Seconds between connection attempts.
    #[serde(default = "default_connect_retry_secs")]
    pub connect_retry_secs: u64,
    /// Create the schema at startup.
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            backend: LedgerBackend::default(),
            database_url: String::new(),
            max_connections: default_max_connections(),
            connect_attempts: default_connect_attempts(),
            connect_retry_secs: default_connect_retry_secs(),
            run_migrations: true,
        }
    }
}

impl LedgerConfig {
    /// Delay between connection attempts.
    #[must_use]
    pub const fn connect_retry_delay(&self) -> Duration {
        Duration::from_secs(self.connect_retry_secs)
    }
}

const fn default_max_connections() -> u32 {
    5
}

const fn default_connect_attempts() -> u32 {
    10
}

const fn default_connect_retry_secs() -> u64 {
    3
}
