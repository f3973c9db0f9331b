//! Orders sent to the broker and the index key for outstanding ones.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::instruction::TradeInstruction;
use crate::domain::shared::{BrokerOrderId, LedgerId, PositionKey};

/// An instruction bound to its resolved price, ready for transmission.
///
/// Built immediately before submission and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    /// The originating instruction.
    pub instruction: TradeInstruction,
    /// Resolved limit price; `None` lets the broker price a market order.
    pub price: Option<Decimal>,
    /// Submission timestamp.
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Bind an instruction to a price, stamped now.
    #[must_use]
    pub fn new(instruction: TradeInstruction, price: Option<Decimal>) -> Self {
        Self::at(instruction, price, Utc::now())
    }

    /// Bind an instruction to a price with an explicit timestamp.
    #[must_use]
    pub const fn at(
        instruction: TradeInstruction,
        price: Option<Decimal>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            instruction,
            price,
            created_at,
        }
    }
}

/// Index key of an outstanding order: submission time, then broker order id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct OrderKey {
    /// When the order was submitted.
    pub submitted_at: DateTime<Utc>,
    /// Broker-assigned id.
    pub order_id: BrokerOrderId,
}

/// A transmitted order awaiting a terminal report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutstandingOrder {
    /// The transmitted order.
    pub order: Order,
    /// Id the broker assigned on submission.
    pub broker_order_id: BrokerOrderId,
    /// Ledger row to update when the order resolves.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_id: Option<LedgerId>,
}

impl OutstandingOrder {
    /// Pair a transmitted order with its broker id.
    #[must_use]
    pub const fn new(order: Order, broker_order_id: BrokerOrderId, ledger_id: Option<LedgerId>) -> Self {
        Self {
            order,
            broker_order_id,
            ledger_id,
        }
    }

    /// Index key.
    #[must_use]
    pub const fn key(&self) -> OrderKey {
        OrderKey {
            submitted_at: self.order.created_at,
            order_id: self.broker_order_id,
        }
    }

    /// Position this order will move.
    #[must_use]
    pub fn position_key(&self) -> PositionKey {
        self.order.instruction.position_key()
    }

    /// Broker the order was sent to.
    #[must_use]
    pub fn broker(&self) -> &str {
        &self.order.instruction.broker
    }
}
