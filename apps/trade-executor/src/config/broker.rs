//! Broker connection configuration.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::infrastructure::broker::{HttpBrokerConfig, RetryConfig};

/// Which broker implementation to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerMode {
    /// REST broker API.
    #[default]
    Http,
    /// In-process broker that fills everything (test-trade mode).
    Simulated,
}

/// Broker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Broker implementation.
    #[serde(default)]
    pub mode: BrokerMode,
    /// Broker API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Retry policy for quote and trade polls.
    #[serde(default)]
    pub retry: RetrySettings,
    /// Price quoted and filled at in simulated mode.
    #[serde(default = "default_simulated_price")]
    pub simulated_price: Decimal,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            mode: BrokerMode::default(),
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
            retry: RetrySettings::default(),
            simulated_price: default_simulated_price(),
        }
    }
}

impl BrokerConfig {
    /// Adapter configuration for `mode: http`.
    #[must_use]
    pub fn http_config(&self) -> HttpBrokerConfig {
        HttpBrokerConfig::new(&self.base_url)
            .with_timeout(Duration::from_millis(self.timeout_ms))
            .with_retry(self.retry.to_retry_config())
    }
}

/// Retry settings as written in YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Attempts per GET, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// First backoff in milliseconds.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Backoff cap in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Backoff multiplier.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Jitter as a fraction of each backoff.
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            multiplier: default_multiplier(),
            jitter: default_jitter(),
        }
    }
}

impl RetrySettings {
    /// Convert to the adapter's retry policy.
    #[must_use]
    pub const fn to_retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            multiplier: self.multiplier,
            jitter_factor: self.jitter,
        }
    }
}

fn default_base_url() -> String {
    "http://broker_api:8000".to_string()
}

const fn default_timeout_ms() -> u64 {
    10_000
}

const fn default_simulated_price() -> Decimal {
    Decimal::ONE_HUNDRED
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    100
}

const fn default_max_backoff_ms() -> u64 {
    10_000
}

const fn default_multiplier() -> f64 {
    2.0
}

const fn default_jitter() -> f64 {
    0.1
}
