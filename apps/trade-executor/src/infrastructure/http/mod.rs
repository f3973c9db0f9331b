//! HTTP/REST API adapter.
//!
//! Inbound adapter: the `SendTrade` intake endpoint plus read-only views of
//! positions, outstanding orders and the trade ledger.

mod controller;
mod request;
mod response;

pub use controller::{AppState, create_router};
pub use request::*;
pub use response::*;
