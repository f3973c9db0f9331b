//! Trade instructions received from strategy processes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::value_objects::{OrderType, Side};
use crate::domain::shared::{LedgerId, PositionKey};

/// A validated trade instruction.
///
/// Created once per strategy signal and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeInstruction {
    /// Strategy that emitted the signal.
    pub strategy_name: String,
    /// Broker contract identifier.
    pub contract_id: i64,
    /// Exchange the contract trades on.
    pub exchange: String,
    /// Instrument symbol.
    pub symbol: String,
    /// Buy or sell.
    pub side: Side,
    /// Unsigned quantity (always positive).
    pub quantity: Decimal,
    /// Market or limit.
    pub order_type: OrderType,
    /// Broker identifier (e.g. `IB`).
    pub broker: String,
    /// Explicit limit price, if the strategy supplied one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<Decimal>,
}

impl TradeInstruction {
    /// Key of the position this instruction trades.
    #[must_use]
    pub fn position_key(&self) -> PositionKey {
        PositionKey::new(&self.strategy_name, &self.symbol)
    }

    /// Quantity signed by side (BUY positive, SELL negative).
    #[must_use]
    pub fn signed_quantity(&self) -> Decimal {
        self.side.signed(self.quantity)
    }
}

/// An instruction waiting in the intake queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedInstruction {
    /// The instruction.
    pub instruction: TradeInstruction,
    /// Ledger row id, absent when the ledger insert failed.
    pub ledger_id: Option<LedgerId>,
    /// When the intake endpoint accepted it.
    pub received_at: DateTime<Utc>,
}

impl QueuedInstruction {
    /// Wrap an instruction accepted now.
    #[must_use]
    pub fn new(instruction: TradeInstruction, ledger_id: Option<LedgerId>) -> Self {
        Self {
            instruction,
            ledger_id,
            received_at: Utc::now(),
        }
    }
}
