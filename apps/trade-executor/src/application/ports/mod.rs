//! Port definitions (interfaces for external systems).
//!
//! - `BrokerPort`: quotes, order submission, trade reports
//! - `LedgerPort`: durable trade ledger (audit/history)

mod broker_port;
mod ledger_port;

pub use broker_port::{BrokerError, BrokerPort, Quote, QuoteRequest};
pub use ledger_port::{LedgerError, LedgerPort, LedgerRecord, TradeQuery};

#[cfg(test)]
pub use ledger_port::MockLedgerPort;
