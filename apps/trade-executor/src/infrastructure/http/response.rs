//! HTTP response DTOs.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::application::ports::LedgerRecord;
use crate::domain::shared::{BrokerOrderId, LedgerId, PositionKey};
use crate::domain::trading::{OrderType, OutstandingOrder, Position, Side};

/// Acknowledgement of `SendTrade`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendTradeResponse {
    /// Always "Trade received and processing".
    pub status: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Application version.
    pub version: String,
    /// Positions held in memory.
    pub positions: usize,
    /// Orders awaiting a terminal report.
    pub outstanding_orders: usize,
}

/// All positions, keyed like the snapshot file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionsResponse {
    /// Number of positions.
    pub count: usize,
    /// Positions by key.
    pub positions: BTreeMap<PositionKey, Position>,
}

/// One position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionResponse {
    /// Position key.
    pub key: PositionKey,
    /// The position.
    #[serde(flatten)]
    pub position: Position,
}

/// An order awaiting resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutstandingOrderResponse {
    /// Broker-assigned id.
    pub broker_order_id: BrokerOrderId,
    /// Position the order moves.
    pub position_key: PositionKey,
    /// Broker.
    pub broker: String,
    /// Side.
    pub side: Side,
    /// Quantity.
    pub quantity: Decimal,
    /// Order type.
    pub order_type: OrderType,
    /// Resolved price.
    pub price: Option<Decimal>,
    /// Submission time.
    pub submitted_at: DateTime<Utc>,
    /// Ledger row.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_id: Option<LedgerId>,
}

impl From<OutstandingOrder> for OutstandingOrderResponse {
    fn from(order: OutstandingOrder) -> Self {
        let position_key = order.position_key();
        let OutstandingOrder {
            order,
            broker_order_id,
            ledger_id,
        } = order;
        Self {
            broker_order_id,
            position_key,
            broker: order.instruction.broker,
            side: order.instruction.side,
            quantity: order.instruction.quantity,
            order_type: order.instruction.order_type,
            price: order.price,
            submitted_at: order.created_at,
            ledger_id,
        }
    }
}

/// Outstanding orders, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutstandingOrdersResponse {
    /// Number of orders.
    pub count: usize,
    /// Orders.
    pub orders: Vec<OutstandingOrderResponse>,
}

/// Ledger rows, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradesResponse {
    /// Number of rows.
    pub count: usize,
    /// Rows.
    pub trades: Vec<LedgerRecord>,
}
