//! Shared kernel: identifiers used across the trading domain.

mod identifiers;

pub use identifiers::{BrokerOrderId, LedgerId, PositionKey};
