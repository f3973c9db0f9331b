//! Application layer.
//!
//! Use cases orchestrate the domain against the broker and ledger ports;
//! services run them as long-lived tasks (worker pool, reconciliation loop).

pub mod dto;
pub mod ports;
pub mod services;
pub mod use_cases;
