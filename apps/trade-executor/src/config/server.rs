//! Server configuration for the HTTP intake/query API.

use serde::{Deserialize, Serialize};

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP port for `SendTrade` and the query endpoints.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Bind address.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            bind_address: default_bind_address(),
        }
    }
}

impl ServerConfig {
    /// `bind_address:http_port`.
    #[must_use]
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.http_port)
    }
}

pub(crate) const fn default_http_port() -> u16 {
    50051
}

pub(crate) fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
