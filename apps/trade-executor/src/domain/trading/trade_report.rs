//! Broker trade reports.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::value_objects::ReportStatus;
use crate::domain::shared::BrokerOrderId;

/// One row of the broker's trade/fill report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeReport {
    /// Broker order id the report refers to.
    pub order_id: BrokerOrderId,
    /// Fill price.
    pub price: Decimal,
    /// Filled quantity (magnitude).
    pub quantity: Decimal,
    /// Order status at the broker.
    pub status: ReportStatus,
    /// Broker timestamp, verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

impl TradeReport {
    /// Check if the report closes out its order.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Netting a fill would exceed the range of `Decimal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("fill arithmetic overflowed for broker order {0}")]
pub struct FillOverflow(pub BrokerOrderId);

/// Collapse a report list to one terminal report per broker order id.
///
/// Non-terminal rows are ignored. Several `Filled` rows for the same order
/// (partial executions) are merged: quantities are summed and the price is
/// quantity-weighted. An order with only `Cancelled` rows stays `Cancelled`;
/// if it has any fills, the fills win. An order whose merged fill does not
/// fit in a `Decimal` maps to [`FillOverflow`] and ignores later rows.
#[must_use]
pub fn consolidate_terminal_reports(
    reports: impl IntoIterator<Item = TradeReport>,
) -> HashMap<BrokerOrderId, Result<TradeReport, FillOverflow>> {
    let mut merged: HashMap<BrokerOrderId, Result<TradeReport, FillOverflow>> = HashMap::new();

    for report in reports.into_iter().filter(TradeReport::is_terminal) {
        match merged.entry(report.order_id) {
            Entry::Vacant(slot) => {
                slot.insert(Ok(report));
            }
            Entry::Occupied(mut slot) => {
                let outcome = match slot.get_mut() {
                    Ok(existing) => merge_terminal(existing, report),
                    Err(_) => Ok(()),
                };
                if let Err(overflow) = outcome {
                    slot.insert(Err(overflow));
                }
            }
        }
    }

    merged
}

fn merge_terminal(existing: &mut TradeReport, report: TradeReport) -> Result<(), FillOverflow> {
    let both_filled =
        existing.status == ReportStatus::Filled && report.status == ReportStatus::Filled;
    let fill_after_cancel =
        existing.status == ReportStatus::Cancelled && report.status == ReportStatus::Filled;

    if both_filled {
        let overflow = FillOverflow(report.order_id);
        let total = existing
            .quantity
            .checked_add(report.quantity)
            .ok_or(overflow)?;
        if !total.is_zero() {
            let notional = existing
                .price
                .checked_mul(existing.quantity)
                .zip(report.price.checked_mul(report.quantity))
                .and_then(|(a, b)| a.checked_add(b))
                .ok_or(overflow)?;
            existing.price = notional.checked_div(total).ok_or(overflow)?;
        }
        existing.quantity = total;
        if report.time.is_some() {
            existing.time = report.time;
        }
    } else if fill_after_cancel {
        *existing = report;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn report(id: i64, status: &str, quantity: Decimal, price: Decimal) -> TradeReport {
        TradeReport {
            order_id: BrokerOrderId::new(id),
            price,
            quantity,
            status: ReportStatus::from(status),
            time: None,
        }
    }

    #[test]
    fn drops_non_terminal_reports() {
        let merged = consolidate_terminal_reports(vec![
            report(1, "Submitted", dec!(0), dec!(0)),
            report(2, "Filled", dec!(1), dec!(10)),
        ]);
        assert_eq!(merged.len(), 1);
        assert!(merged[&BrokerOrderId::new(2)].is_ok());
    }

    #[test]
    fn merges_partial_fills_with_weighted_price() {
        let merged = consolidate_terminal_reports(vec![
            report(7, "Filled", dec!(1), dec!(100)),
            report(7, "Filled", dec!(3), dec!(104)),
        ]);
        let fill = merged[&BrokerOrderId::new(7)].as_ref().unwrap();
        assert_eq!(fill.quantity, dec!(4));
        assert_eq!(fill.price, dec!(103));
        assert_eq!(fill.status, ReportStatus::Filled);
    }

    #[test]
    fn fills_take_precedence_over_cancel() {
        let merged = consolidate_terminal_reports(vec![
            report(3, "Cancelled", dec!(0), dec!(0)),
            report(3, "Filled", dec!(2), dec!(50)),
            report(3, "Cancelled", dec!(0), dec!(0)),
        ]);
        let fill = merged[&BrokerOrderId::new(3)].as_ref().unwrap();
        assert_eq!(fill.status, ReportStatus::Filled);
        assert_eq!(fill.quantity, dec!(2));
    }

    #[test]
    fn cancel_only_stays_cancelled() {
        let merged = consolidate_terminal_reports(vec![report(4, "canceled", dec!(5), dec!(0))]);
        assert_eq!(
            merged[&BrokerOrderId::new(4)].as_ref().unwrap().status,
            ReportStatus::Cancelled
        );
    }

    #[test]
    fn oversized_fills_overflow_without_touching_other_orders() {
        let huge = dec!(1_000_000_000_000_000);
        let merged = consolidate_terminal_reports(vec![
            report(9, "Filled", huge, huge),
            report(9, "Filled", dec!(1), huge),
            report(9, "Filled", dec!(1), dec!(10)),
            report(10, "Filled", dec!(2), dec!(50)),
        ]);
        assert_eq!(
            merged[&BrokerOrderId::new(9)],
            Err(FillOverflow(BrokerOrderId::new(9)))
        );
        assert_eq!(merged[&BrokerOrderId::new(10)].as_ref().unwrap().quantity, dec!(2));
    }
}
