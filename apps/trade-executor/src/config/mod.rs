//! Configuration for the trade executor.
//!
//! YAML with `${VAR}` / `${VAR:-default}` interpolation. Every section is
//! optional; an empty file yields the defaults.
//!
//! # Usage
//!
//! ```rust,ignore
//! use trade_executor::config::load_config;
//!
//! // Load from default path (config.yaml)
//! let config = load_config(None)?;
//! println!("workers: {}", config.execution.workers);
//! ```

mod broker;
mod execution;
mod ledger;
mod observability;
mod persistence;
mod reconciliation;
mod server;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use broker::{BrokerConfig, BrokerMode, RetrySettings};
pub use execution::ExecutionConfig;
pub use ledger::{LedgerBackend, LedgerConfig};
pub use observability::{LoggingConfig, MetricsSettings, ObservabilityConfig};
pub use persistence::PersistenceConfig;
pub use reconciliation::ReconciliationConfig;
pub use server::ServerConfig;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "TRADE_EXECUTOR_CONFIG";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// Configuration validation failed.
    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server.
    #[serde(default)]
    pub server: ServerConfig,
    /// Broker connection.
    #[serde(default)]
    pub broker: BrokerConfig,
    /// Intake queue and workers.
    #[serde(default)]
    pub execution: ExecutionConfig,
    /// Fill polling.
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
    /// Position snapshot.
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Trade ledger.
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Logging and metrics.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Load configuration from a YAML file with environment variable interpolation.
///
/// # Arguments
///
/// * `path` - Optional path to the config file. Defaults to `$TRADE_EXECUTOR_CONFIG`,
///   then "config.yaml".
///
/// # Errors
///
/// Returns a `ConfigError` if the file cannot be read, parsed, or validated.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let path = path.map_or_else(
        || std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "config.yaml".to_string()),
        str::to_string,
    );

    let contents = std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadError {
        path: path.clone(),
        source: e,
    })?;

    load_config_from_string(&contents)
}

/// Load configuration from a YAML string (useful for testing).
///
/// # Errors
///
/// Returns a `ConfigError` if the YAML cannot be parsed or validated.
pub fn load_config_from_string(yaml: &str) -> Result<Config, ConfigError> {
    let interpolated = interpolate_env_vars(yaml);
    let config: Config = if interpolated.trim().is_empty() {
        Config::default()
    } else {
        serde_yaml_bw::from_str(&interpolated)?
    };
    validate_config(&config)?;
    Ok(config)
}

/// Interpolate environment variables in a string.
///
/// Supports both `${VAR}` and `${VAR:-default}` syntax.
#[allow(clippy::expect_used)] // Regex is compile-time constant; expect() is safe here
fn interpolate_env_vars(input: &str) -> String {
    use std::sync::OnceLock;

    static ENV_VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

    let re = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var regex is valid")
    });

    re.replace_all(input, |cap: &regex::Captures<'_>| {
        let default_value = cap.get(2).map_or("", |m| m.as_str());
        match std::env::var(&cap[1]) {
            Ok(v) if !v.is_empty() => v,
            _ => default_value.to_string(),
        }
    })
    .into_owned()
}

/// Validate configuration values.
fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let invalid = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));

    if config.execution.workers == 0 {
        return invalid("execution.workers must be at least 1");
    }
    if config.execution.queue_capacity == 0 {
        return invalid("execution.queue_capacity must be at least 1");
    }
    if config.reconciliation.interval_secs == 0 {
        return invalid("reconciliation.interval_secs must be at least 1");
    }
    if config.broker.timeout_ms == 0 {
        return invalid("broker.timeout_ms must be at least 1");
    }
    if config.broker.retry.max_attempts == 0 {
        return invalid("broker.retry.max_attempts must be at least 1");
    }
    if config.broker.retry.multiplier < 1.0 {
        return invalid("broker.retry.multiplier must be at least 1.0");
    }
    if !(0.0..=1.0).contains(&config.broker.retry.jitter) {
        return invalid("broker.retry.jitter must be between 0.0 and 1.0");
    }
    if config.ledger.backend == LedgerBackend::Postgres && config.ledger.database_url.trim().is_empty() {
        return invalid("ledger.database_url is required for the postgres backend");
    }

    let metrics = &config.observability.metrics;
    if metrics.enabled && metrics.port == config.server.http_port {
        return invalid("observability.metrics.port and server.http_port must be different");
    }

    let format = config.observability.logging.format.to_ascii_lowercase();
    if format != "json" && format != "pretty" {
        return Err(ConfigError::ValidationError(format!(
            "observability.logging.format must be one of: [\"json\", \"pretty\"], got {format:?}"
        )));
    }

    Ok(())
}
