//! Broker adapters implementing `BrokerPort`.

pub mod http;
pub mod simulated;

pub use http::{BrokerHttpError, HttpBrokerAdapter, HttpBrokerConfig, RetryConfig};
pub use simulated::SimulatedBroker;
