//! Reconciliation loop configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::persistence::default_true;

/// Reconciliation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationConfig {
    /// Run the fill-polling loop.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between broker polls.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_interval_secs(),
        }
    }
}

impl ReconciliationConfig {
    /// Poll interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

const fn default_interval_secs() -> u64 {
    5
}
