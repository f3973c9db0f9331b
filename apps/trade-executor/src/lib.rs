// Allow unwrap/expect in tests - tests should panic on unexpected errors
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Trade Executor - Rust Core Library
//!
//! Execution core of the trading platform: accepts trade instructions from
//! strategy processes, submits them to the broker at most once per position,
//! and reconciles broker fills back into the position store and the ledger.
//!
//! # Architecture (Hexagonal)
//!
//! ## Layers (inside → outside)
//!
//! - **Domain**: instructions, orders, positions and broker reports
//!
//! - **Application**: use cases and orchestration
//!   - `ports`: `BrokerPort`, `LedgerPort`
//!   - `use_cases`: `AcceptTrade`, `ExecuteTrade`, `ReconcileFills`, `RecoverState`
//!   - `services`: intake queue, worker pool, reconciliation loop
//!   - `dto`: the `SendTrade` payload
//!
//! - **Infrastructure**: adapters
//!   - `broker`: HTTP broker API client, simulated broker
//!   - `persistence`: position store with JSON snapshot, outstanding-order
//!     index, in-memory and `PostgreSQL` ledgers
//!   - `http`: axum intake and query API
//!
//! # Pipeline
//!
//! ```text
//! SendTrade → intake queue → workers → broker (submit) → outstanding index
//!                                                           ↓
//!             positions + ledger ← reconciliation loop ← broker (poll)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

/// Domain layer - value objects and entities, no I/O.
pub mod domain;

/// Application layer - use cases, services and port definitions.
pub mod application;

/// Infrastructure layer - adapters and the HTTP API.
pub mod infrastructure;

/// Configuration loading.
pub mod config;

/// API error codes and HTTP error bodies.
pub mod error;

/// Prometheus metrics.
pub mod observability;

pub use application::ports::{BrokerError, BrokerPort, LedgerError, LedgerPort, TradeQuery};
pub use domain::shared::{BrokerOrderId, LedgerId, PositionKey};
pub use domain::trading::{Order, OutstandingOrder, Position, TradeInstruction, TradeReport};
pub use error::{ApiError, ErrorCode};
