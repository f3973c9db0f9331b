//! Infrastructure layer: adapters for the ports and the inbound HTTP API.
//!
//! - `broker`: HTTP broker adapter and the simulated broker
//! - `persistence`: position store, outstanding-order index, ledgers
//! - `http`: axum intake and query endpoints

pub mod broker;
pub mod http;
pub mod persistence;
