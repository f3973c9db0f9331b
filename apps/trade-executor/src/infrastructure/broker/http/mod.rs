//! REST broker adapter.
//!
//! Talks to the broker API service: quotes and trade reports over retried
//! GETs, order submission over a single POST.

mod adapter;
mod api_types;
mod config;
mod error;
mod http_client;

pub use adapter::HttpBrokerAdapter;
pub use config::{HttpBrokerConfig, RetryConfig};
pub use error::BrokerHttpError;
