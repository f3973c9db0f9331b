//! Application use cases.
//!
//! - `AcceptTradeUseCase`: validate, record and enqueue a `SendTrade` call
//! - `ExecuteTradeUseCase`: claim, price and submit one queued instruction
//! - `ReconcileFillsUseCase`: match broker reports to outstanding orders
//! - `RecoverStateUseCase`: rebuild in-memory state at startup

mod accept_trade;
mod execute_trade;
mod reconcile_fills;
mod recover_state;

pub use accept_trade::{ACK_STATUS, AcceptTradeUseCase, IntakeError, TradeAck};
pub use execute_trade::{DropReason, ExecuteTradeUseCase, ExecutionOutcome};
pub use reconcile_fills::{ReconcileFillsUseCase, ReconcileResult};
pub use recover_state::{RecoverStateUseCase, RecoveryResult};
