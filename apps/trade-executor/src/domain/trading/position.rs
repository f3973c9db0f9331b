//! Position entity.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::instruction::TradeInstruction;
use super::trade_report::{FillOverflow, TradeReport};
use super::value_objects::{PositionStatus, ReportStatus, Side};

/// Net holding for one strategy/symbol pair.
///
/// Serialized with the snapshot file's field names. Created on first
/// reference, never deleted; a flat position is quantity 0 / `Closed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Instrument symbol.
    pub symbol: String,
    /// Exchange.
    pub exchange: String,
    /// Signed net quantity.
    pub quantity: Decimal,
    /// Price of the most recent fill.
    pub cost_basis: Decimal,
    /// Last update.
    #[serde(rename = "datetime")]
    pub updated_at: DateTime<Utc>,
    /// Broker contract identifier.
    pub contract_id: i64,
    /// Lifecycle status.
    pub status: PositionStatus,
}

impl Position {
    /// A new flat position with an order in flight.
    #[must_use]
    pub fn pending_for(instruction: &TradeInstruction, at: DateTime<Utc>) -> Self {
        Self {
            symbol: instruction.symbol.clone(),
            exchange: instruction.exchange.clone(),
            quantity: Decimal::ZERO,
            cost_basis: Decimal::ZERO,
            updated_at: at,
            contract_id: instruction.contract_id,
            status: PositionStatus::Pending,
        }
    }

    /// Check if an order is in flight for this position.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self.status, PositionStatus::Pending)
    }

    /// Flip to `Pending`, leaving quantity and cost basis alone.
    pub fn mark_pending(&mut self, at: DateTime<Utc>) {
        self.status = PositionStatus::Pending;
        self.updated_at = at;
    }

    /// Net a terminal report into the position.
    ///
    /// Returns the signed quantity change. A cancellation changes nothing but
    /// the status (forced to `Closed`) and the timestamp; a fill adds the
    /// signed quantity and replaces the cost basis with the fill price.
    /// Non-terminal reports are ignored.
    ///
    /// # Errors
    ///
    /// [`FillOverflow`] if the net quantity would leave the `Decimal` range;
    /// the position is left untouched.
    pub fn apply_report(
        &mut self,
        side: Side,
        report: &TradeReport,
        at: DateTime<Utc>,
    ) -> Result<Decimal, FillOverflow> {
        match report.status {
            ReportStatus::Filled => {
                let delta = side.signed(report.quantity);
                self.quantity = self
                    .quantity
                    .checked_add(delta)
                    .ok_or(FillOverflow(report.order_id))?;
                self.cost_basis = report.price;
                self.updated_at = at;
                self.status = if self.quantity.is_zero() {
                    PositionStatus::Closed
                } else {
                    PositionStatus::Filled
                };
                Ok(delta)
            }
            ReportStatus::Cancelled => {
                self.updated_at = at;
                self.status = PositionStatus::Closed;
                Ok(Decimal::ZERO)
            }
            ReportStatus::Other(_) => Ok(Decimal::ZERO),
        }
    }

    /// Settle a `Pending` position whose order can no longer be tracked.
    pub fn settle(&mut self, at: DateTime<Utc>) {
        self.status = if self.quantity.is_zero() {
            PositionStatus::Closed
        } else {
            PositionStatus::Filled
        };
        self.updated_at = at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::shared::BrokerOrderId;
    use crate::domain::trading::value_objects::OrderType;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn instruction() -> TradeInstruction {
        TradeInstruction {
            strategy_name: "S1".to_string(),
            contract_id: 123,
            exchange: "CME".to_string(),
            symbol: "ES".to_string(),
            side: Side::Buy,
            quantity: dec!(1),
            order_type: OrderType::Limit,
            broker: "IB".to_string(),
            limit_price: None,
        }
    }

    fn report(status: &str, quantity: Decimal, price: Decimal) -> TradeReport {
        TradeReport {
            order_id: BrokerOrderId::new(42),
            price,
            quantity,
            status: ReportStatus::from(status),
            time: None,
        }
    }

    #[test]
    fn buy_fill_opens_long() {
        let mut position = Position::pending_for(&instruction(), Utc::now());

        let delta = position
            .apply_report(Side::Buy, &report("Filled", dec!(10), dec!(101.5)), Utc::now())
            .unwrap();

        assert_eq!(delta, dec!(10));
        assert_eq!(position.quantity, dec!(10));
        assert_eq!(position.cost_basis, dec!(101.5));
        assert_eq!(position.status, PositionStatus::Filled);
    }

    #[test]
    fn offsetting_fill_closes() {
        let mut position = Position::pending_for(&instruction(), Utc::now());
        position.apply_report(Side::Buy, &report("Filled", dec!(3), dec!(10)), Utc::now()).unwrap();
        position.apply_report(Side::Sell, &report("Filled", dec!(3), dec!(11)), Utc::now()).unwrap();

        assert!(position.quantity.is_zero());
        assert_eq!(position.status, PositionStatus::Closed);
        assert_eq!(position.cost_basis, dec!(11));
    }

    #[test]
    fn cancel_forces_closed_without_quantity_change() {
        let mut position = Position::pending_for(&instruction(), Utc::now());
        position.apply_report(Side::Sell, &report("Filled", dec!(4), dec!(20)), Utc::now()).unwrap();
        position.mark_pending(Utc::now());

        let delta = position
            .apply_report(Side::Buy, &report("Cancelled", dec!(5), dec!(0)), Utc::now())
            .unwrap();

        assert_eq!(delta, Decimal::ZERO);
        assert_eq!(position.quantity, dec!(-4));
        assert_eq!(position.cost_basis, dec!(20));
        assert_eq!(position.status, PositionStatus::Closed);
    }

    #[test]
    fn overflowing_fill_leaves_position_untouched() {
        let mut position = Position::pending_for(&instruction(), Utc::now());
        position.quantity = Decimal::MAX;
        let before = position.clone();

        let result = position.apply_report(Side::Buy, &report("Filled", dec!(1), dec!(10)), Utc::now());

        assert_eq!(result, Err(FillOverflow(BrokerOrderId::new(42))));
        assert_eq!(position, before);
    }

    #[test]
    fn settle_releases_pending() {
        let mut flat = Position::pending_for(&instruction(), Utc::now());
        flat.settle(Utc::now());
        assert_eq!(flat.status, PositionStatus::Closed);

        let mut long = Position::pending_for(&instruction(), Utc::now());
        long.quantity = dec!(2);
        long.settle(Utc::now());
        assert_eq!(long.status, PositionStatus::Filled);
    }

    #[test]
    fn serializes_with_snapshot_field_names() {
        let position = Position::pending_for(&instruction(), Utc::now());
        let json = serde_json::to_value(&position).unwrap();
        for field in ["symbol", "exchange", "quantity", "cost_basis", "datetime", "contract_id", "status"] {
            assert!(json.get(field).is_some(), "missing field {field}");
        }
        assert_eq!(json["status"], "Pending");
    }

    fn fill_strategy() -> impl Strategy<Value = (bool, bool, i64, i64)> {
        // (is_buy, cancelled, quantity, price in cents)
        (any::<bool>(), prop::bool::weighted(0.2), 1i64..1_000, 1i64..10_000_000)
    }

    proptest! {
        #[test]
        fn net_quantity_is_order_independent(fills in prop::collection::vec(fill_strategy(), 0..20)) {
            let apply = |fills: &[(bool, bool, i64, i64)]| {
                let mut position = Position::pending_for(&instruction(), Utc::now());
                let mut last_cancelled = false;
                for &(is_buy, cancelled, qty, cents) in fills {
                    let side = if is_buy { Side::Buy } else { Side::Sell };
                    let status = if cancelled { "Cancelled" } else { "Filled" };
                    position.apply_report(side, &report(status, Decimal::from(qty), Decimal::new(cents, 2)), Utc::now()).unwrap();
                    last_cancelled = cancelled;
                }
                (position, last_cancelled)
            };

            let expected: Decimal = fills
                .iter()
                .filter(|f| !f.1)
                .map(|&(is_buy, _, qty, _)| if is_buy { Decimal::from(qty) } else { -Decimal::from(qty) })
                .sum();

            let (forward, last_cancelled) = apply(&fills);
            let mut reversed_fills = fills.clone();
            reversed_fills.reverse();
            let (reversed, _) = apply(&reversed_fills);

            prop_assert_eq!(forward.quantity, expected);
            prop_assert_eq!(reversed.quantity, expected);

            if !fills.is_empty() {
                let closed = forward.status == PositionStatus::Closed;
                prop_assert_eq!(closed, forward.quantity.is_zero() || last_cancelled);
            }
        }
    }
}
