//! Ledger Port (Driven Port)
//!
//! Contract of the durable trade ledger. The ledger is the system of record
//! for audit and history; the position store owns current holdings.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::shared::{BrokerOrderId, LedgerId};
use crate::domain::trading::{LedgerStatus, OrderType, Side, TradeInstruction};

/// Errors from ledger operations.
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    /// Database connection error.
    #[error("Ledger connection error: {0}")]
    Connection(String),

    /// Query execution error.
    #[error("Ledger query error: {0}")]
    Query(String),

    /// No row matched the update.
    #[error("No ledger record for {0}")]
    NotFound(String),

    /// A broker order id was recorded twice on the same trading date.
    #[error("Duplicate broker order id {0}")]
    Duplicate(BrokerOrderId),

    /// Stored data could not be decoded.
    #[error("Ledger data integrity error: {0}")]
    Integrity(String),
}

/// One ledger row per trade instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    /// Row id.
    pub id: LedgerId,
    /// Strategy that emitted the instruction.
    pub strategy_name: String,
    /// Broker contract identifier.
    pub contract_id: i64,
    /// Exchange.
    pub exchange: String,
    /// Symbol.
    pub symbol: String,
    /// Side.
    pub side: Side,
    /// Unsigned quantity.
    pub quantity: Decimal,
    /// Market or limit.
    pub order_type: OrderType,
    /// Broker identifier.
    pub broker: String,
    /// Resolved (then filled) price.
    pub price: Option<Decimal>,
    /// Broker order id; `None` until submitted.
    pub broker_order_id: Option<BrokerOrderId>,
    /// Trading date the row belongs to.
    pub trading_date: NaiveDate,
    /// Lifecycle status.
    pub status: LedgerStatus,
    /// Insert time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub last_updated_at: DateTime<Utc>,
}

impl LedgerRecord {
    /// Rebuild the instruction this row was recorded from.
    ///
    /// The stored price is the resolved one, so no explicit limit price is set.
    #[must_use]
    pub fn to_instruction(&self) -> TradeInstruction {
        TradeInstruction {
            strategy_name: self.strategy_name.clone(),
            contract_id: self.contract_id,
            exchange: self.exchange.clone(),
            symbol: self.symbol.clone(),
            side: self.side,
            quantity: self.quantity,
            order_type: self.order_type,
            broker: self.broker.clone(),
            limit_price: None,
        }
    }
}

/// Filter for ledger reads. Empty fields do not filter.
///
/// Results are always newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeQuery {
    /// Accept any of these statuses.
    #[serde(default)]
    pub statuses: Vec<LedgerStatus>,
    /// Exact symbol.
    pub symbol: Option<String>,
    /// Exact strategy name.
    pub strategy_name: Option<String>,
    /// First trading date (inclusive).
    pub from: Option<NaiveDate>,
    /// Last trading date (inclusive).
    pub to: Option<NaiveDate>,
    /// Maximum rows.
    pub limit: Option<u32>,
}

impl TradeQuery {
    /// Instructions that have not resolved yet (`Pending` or `Submitted`).
    #[must_use]
    pub fn pending() -> Self {
        Self {
            statuses: vec![LedgerStatus::Pending, LedgerStatus::Submitted],
            ..Self::default()
        }
    }

    /// Orders that reached the broker but have no terminal status.
    #[must_use]
    pub fn submitted() -> Self {
        Self {
            statuses: vec![LedgerStatus::Submitted],
            ..Self::default()
        }
    }

    /// Most recent trades for a symbol.
    #[must_use]
    pub fn recent_by_symbol(symbol: impl Into<String>, limit: u32) -> Self {
        Self {
            symbol: Some(symbol.into()),
            limit: Some(limit),
            ..Self::default()
        }
    }

    /// Trades for a strategy within a trading-date range.
    #[must_use]
    pub fn by_strategy_between(
        strategy_name: impl Into<String>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Self {
        Self {
            strategy_name: Some(strategy_name.into()),
            from: Some(from),
            to: Some(to),
            ..Self::default()
        }
    }

    /// Check whether a record passes every filter.
    #[must_use]
    pub fn matches(&self, record: &LedgerRecord) -> bool {
        (self.statuses.is_empty() || self.statuses.contains(&record.status))
            && self.symbol.as_ref().is_none_or(|s| *s == record.symbol)
            && self
                .strategy_name
                .as_ref()
                .is_none_or(|s| *s == record.strategy_name)
            && self.from.is_none_or(|d| record.trading_date >= d)
            && self.to.is_none_or(|d| record.trading_date <= d)
    }
}

/// Trade ledger contract.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerPort: Send + Sync {
    /// Record a new instruction with status `Pending`; returns its row id.
    async fn insert_instruction(
        &self,
        instruction: &TradeInstruction,
    ) -> Result<LedgerId, LedgerError>;

    /// Mark a row `Submitted` with the broker order id and resolved price.
    async fn mark_submitted(
        &self,
        ledger_id: LedgerId,
        order_id: BrokerOrderId,
        price: Option<Decimal>,
    ) -> Result<(), LedgerError>;

    /// Move the row for a broker order id to a new status.
    ///
    /// The price is only overwritten when the status is `Filled`.
    async fn mark_status(
        &self,
        order_id: BrokerOrderId,
        status: LedgerStatus,
        fill_price: Option<Decimal>,
    ) -> Result<(), LedgerError>;

    /// Read rows matching a filter, newest first.
    async fn query(&self, query: &TradeQuery) -> Result<Vec<LedgerRecord>, LedgerError>;
}
