//! Reconcile Fills Use Case
//!
//! One reconciliation cycle: poll each broker that has outstanding orders,
//! match terminal reports by broker order id, then update the position
//! store and the ledger and retire the matched orders.

use std::sync::Arc;

use chrono::Utc;

use crate::application::ports::{BrokerPort, LedgerPort};
use crate::domain::trading::{
    FillOverflow, OutstandingOrder, Position, ReportStatus, TradeReport,
    consolidate_terminal_reports,
};
use crate::infrastructure::persistence::{OutstandingOrderIndex, PositionStore};
use crate::observability::{
    record_fill_reconciled, record_reconciliation_error, update_outstanding_orders,
};

/// Result of one reconciliation cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileResult {
    /// Brokers polled.
    pub brokers_polled: usize,
    /// Report rows returned by the brokers.
    pub reports_seen: usize,
    /// Orders resolved as filled.
    pub fills_applied: usize,
    /// Orders resolved as cancelled.
    pub cancels_applied: usize,
    /// Orders still outstanding after the cycle.
    pub still_outstanding: usize,
    /// Errors encountered (poll failures, ledger failures, overflowing fills).
    pub errors: Vec<String>,
}

impl ReconcileResult {
    /// Orders resolved this cycle.
    #[must_use]
    pub const fn resolved(&self) -> usize {
        self.fills_applied + self.cancels_applied
    }
}

/// Use case behind the reconciliation loop.
pub struct ReconcileFillsUseCase<B, L>
where
    B: BrokerPort,
    L: LedgerPort,
{
    broker: Arc<B>,
    ledger: Arc<L>,
    positions: Arc<PositionStore>,
    outstanding: Arc<OutstandingOrderIndex>,
}

impl<B, L> ReconcileFillsUseCase<B, L>
where
    B: BrokerPort,
    L: LedgerPort,
{
    /// Create a new `ReconcileFillsUseCase`.
    pub const fn new(
        broker: Arc<B>,
        ledger: Arc<L>,
        positions: Arc<PositionStore>,
        outstanding: Arc<OutstandingOrderIndex>,
    ) -> Self {
        Self {
            broker,
            ledger,
            positions,
            outstanding,
        }
    }

    /// Run one cycle.
    ///
    /// A failed poll leaves that broker's orders outstanding for the next
    /// cycle, as does a fill too large to net into its position. A failed
    /// ledger update is logged and the fill is still applied to the position.
    pub async fn execute(&self) -> ReconcileResult {
        let mut result = ReconcileResult::default();

        for broker in self.outstanding.brokers() {
            let reports = match self.broker.get_trades(&broker).await {
                Ok(reports) => reports,
                Err(e) => {
                    tracing::warn!(broker = %broker, error = %e, "Failed to poll broker trades");
                    record_reconciliation_error();
                    result.errors.push(format!("{broker}: {e}"));
                    continue;
                }
            };
            result.brokers_polled += 1;
            result.reports_seen += reports.len();

            let terminal = consolidate_terminal_reports(reports);
            if terminal.is_empty() {
                continue;
            }

            for order in self.outstanding.for_broker(&broker) {
                match terminal.get(&order.broker_order_id) {
                    Some(Ok(report)) => self.apply(&order, report, &mut result).await,
                    Some(Err(overflow)) => reject(&order, overflow, &mut result),
                    None => {}
                }
            }
        }

        result.still_outstanding = self.outstanding.len();
        update_outstanding_orders(result.still_outstanding);
        result
    }

    async fn apply(
        &self,
        order: &OutstandingOrder,
        report: &TradeReport,
        result: &mut ReconcileResult,
    ) {
        let Some(ledger_status) = report.status.ledger_status() else {
            return;
        };
        let fill_price = (report.status == ReportStatus::Filled).then_some(report.price);

        let instruction = &order.order.instruction;
        let position_key = order.position_key();
        let now = Utc::now();

        let applied = self
            .positions
            .update(&position_key, |p| {
                p.apply_report(instruction.side, report, now)
                    .map(|delta| (delta, p.clone()))
            })
            .unwrap_or_else(|| {
                let mut position = Position::pending_for(instruction, now);
                let delta = position.apply_report(instruction.side, report, now)?;
                self.positions.store(position_key.clone(), position.clone());
                Ok((delta, position))
            });
        let (delta, position) = match applied {
            Ok(applied) => applied,
            Err(overflow) => {
                reject(order, &overflow, result);
                return;
            }
        };

        if let Err(e) = self
            .ledger
            .mark_status(order.broker_order_id, ledger_status, fill_price)
            .await
        {
            tracing::error!(
                error = %e,
                broker_order_id = %order.broker_order_id,
                "Failed to update ledger for reconciled order"
            );
            result.errors.push(format!("ledger {}: {e}", order.broker_order_id));
        }

        self.positions.persist_or_log().await;
        self.outstanding.remove(&order.key());

        if report.status == ReportStatus::Filled {
            result.fills_applied += 1;
        } else {
            result.cancels_applied += 1;
        }
        record_fill_reconciled(ledger_status.as_str());

        tracing::info!(
            position_key = %position_key,
            broker_order_id = %order.broker_order_id,
            status = %report.status,
            fill_quantity = %delta,
            fill_price = %report.price,
            net_quantity = %position.quantity,
            position_status = %position.status,
            "Applied broker report"
        );
    }
}

/// Leave an order whose fill cannot be netted outstanding and count the error.
fn reject(order: &OutstandingOrder, overflow: &FillOverflow, result: &mut ReconcileResult) {
    tracing::error!(
        position_key = %order.position_key(),
        broker_order_id = %order.broker_order_id,
        error = %overflow,
        "Fill out of range, leaving order outstanding"
    );
    record_reconciliation_error();
    result.errors.push(overflow.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{
        BrokerError, LedgerError, MockLedgerPort, Quote, QuoteRequest,
    };
    use crate::domain::shared::{BrokerOrderId, PositionKey};
    use crate::domain::trading::{
        LedgerStatus, Order, OrderType, PositionStatus, Side, TradeInstruction,
    };
    use crate::infrastructure::persistence::InMemoryLedger;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    /// Broker with a fixed trade list per broker name.
    #[derive(Default)]
    struct ReportingBroker {
        trades: Mutex<HashMap<String, Result<Vec<TradeReport>, BrokerError>>>,
        polls: Mutex<Vec<String>>,
    }

    impl ReportingBroker {
        fn with_reports(broker: &str, reports: Vec<TradeReport>) -> Self {
            let this = Self::default();
            this.trades.lock().insert(broker.to_string(), Ok(reports));
            this
        }
    }

    #[async_trait]
    impl BrokerPort for ReportingBroker {
        async fn get_quote(&self, _request: &QuoteRequest) -> Result<Quote, BrokerError> {
            Ok(Quote::default())
        }

        async fn submit_order(&self, _order: &Order) -> Result<BrokerOrderId, BrokerError> {
            Err(BrokerError::Unknown {
                message: "not used".to_string(),
            })
        }

        async fn get_trades(&self, broker: &str) -> Result<Vec<TradeReport>, BrokerError> {
            self.polls.lock().push(broker.to_string());
            self.trades
                .lock()
                .get(broker)
                .cloned()
                .unwrap_or_else(|| Ok(vec![]))
        }
    }

    fn instruction(side: Side, quantity: Decimal, broker: &str) -> TradeInstruction {
        TradeInstruction {
            strategy_name: "S1".to_string(),
            contract_id: 123,
            exchange: "CME".to_string(),
            symbol: "ES".to_string(),
            side,
            quantity,
            order_type: OrderType::Limit,
            broker: broker.to_string(),
            limit_price: None,
        }
    }

    fn report(id: i64, status: &str, quantity: Decimal, price: Decimal) -> TradeReport {
        TradeReport {
            order_id: BrokerOrderId::new(id),
            price,
            quantity,
            status: ReportStatus::from(status),
            time: None,
        }
    }

    fn key() -> PositionKey {
        PositionKey::new("S1", "ES")
    }

    struct Fixture<L: LedgerPort> {
        positions: Arc<PositionStore>,
        outstanding: Arc<OutstandingOrderIndex>,
        broker: Arc<ReportingBroker>,
        use_case: ReconcileFillsUseCase<ReportingBroker, L>,
    }

    fn fixture<L: LedgerPort>(broker: ReportingBroker, ledger: L) -> Fixture<L> {
        let broker = Arc::new(broker);
        let positions = Arc::new(PositionStore::new());
        let outstanding = Arc::new(OutstandingOrderIndex::new());
        let use_case = ReconcileFillsUseCase::new(
            Arc::clone(&broker),
            Arc::new(ledger),
            Arc::clone(&positions),
            Arc::clone(&outstanding),
        );
        Fixture {
            positions,
            outstanding,
            broker,
            use_case,
        }
    }

    /// Track an order the way a worker leaves it after submission.
    async fn track(f: &Fixture<impl LedgerPort>, instr: TradeInstruction, id: i64) {
        let order = Order::new(instr, Some(dec!(100)));
        f.positions
            .claim(&key())
            .await
            .unwrap()
            .commit(&order.instruction, order.created_at);
        f.outstanding
            .insert(OutstandingOrder::new(order, BrokerOrderId::new(id), None));
    }

    #[tokio::test]
    async fn buy_fill_updates_position_and_retires_order() {
        let f = fixture(
            ReportingBroker::with_reports("IB", vec![report(42, "Filled", dec!(10), dec!(101.5))]),
            InMemoryLedger::new(),
        );
        track(&f, instruction(Side::Buy, dec!(10), "IB"), 42).await;

        let result = f.use_case.execute().await;

        assert_eq!(result.fills_applied, 1);
        assert_eq!(result.still_outstanding, 0);
        let position = f.positions.load(&key()).unwrap();
        assert_eq!(position.quantity, dec!(10));
        assert_eq!(position.cost_basis, dec!(101.5));
        assert_eq!(position.status, PositionStatus::Filled);
        assert!(f.outstanding.is_empty());
    }

    #[tokio::test]
    async fn cancel_closes_without_quantity_change() {
        let f = fixture(
            ReportingBroker::with_reports("IB", vec![report(7, "Cancelled", dec!(5), dec!(0))]),
            InMemoryLedger::new(),
        );
        let instr = instruction(Side::Buy, dec!(5), "IB");
        let mut existing = Position::pending_for(&instr, Utc::now());
        existing.quantity = dec!(-2);
        existing.settle(Utc::now());
        f.positions.store(key(), existing);
        track(&f, instr, 7).await;

        let result = f.use_case.execute().await;

        assert_eq!(result.cancels_applied, 1);
        let position = f.positions.load(&key()).unwrap();
        assert_eq!(position.quantity, dec!(-2));
        assert_eq!(position.status, PositionStatus::Closed);
    }

    #[tokio::test]
    async fn non_terminal_report_keeps_order_outstanding() {
        let f = fixture(
            ReportingBroker::with_reports("IB", vec![report(42, "Submitted", dec!(0), dec!(0))]),
            InMemoryLedger::new(),
        );
        track(&f, instruction(Side::Buy, dec!(1), "IB"), 42).await;

        let result = f.use_case.execute().await;

        assert_eq!(result.resolved(), 0);
        assert_eq!(result.still_outstanding, 1);
        assert!(f.positions.load(&key()).unwrap().is_pending());
    }

    #[tokio::test]
    async fn unmatched_reports_are_ignored() {
        let f = fixture(
            ReportingBroker::with_reports("IB", vec![report(99, "Filled", dec!(1), dec!(10))]),
            InMemoryLedger::new(),
        );
        track(&f, instruction(Side::Buy, dec!(1), "IB"), 42).await;

        let result = f.use_case.execute().await;

        assert_eq!(result.reports_seen, 1);
        assert_eq!(result.resolved(), 0);
        assert_eq!(f.outstanding.len(), 1);
    }

    #[tokio::test]
    async fn poll_failure_keeps_orders_for_next_cycle() {
        let broker = ReportingBroker::default();
        broker.trades.lock().insert(
            "IB".to_string(),
            Err(BrokerError::ConnectionError {
                message: "refused".to_string(),
            }),
        );
        let f = fixture(broker, InMemoryLedger::new());
        track(&f, instruction(Side::Buy, dec!(1), "IB"), 42).await;

        let result = f.use_case.execute().await;

        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.brokers_polled, 0);
        assert_eq!(f.outstanding.len(), 1);
    }

    #[tokio::test]
    async fn nothing_outstanding_means_no_poll() {
        let f = fixture(ReportingBroker::default(), InMemoryLedger::new());

        let result = f.use_case.execute().await;

        assert_eq!(result, ReconcileResult::default());
        assert!(f.broker.polls.lock().is_empty());
    }

    #[tokio::test]
    async fn partial_fills_are_merged_before_applying() {
        let f = fixture(
            ReportingBroker::with_reports(
                "IB",
                vec![
                    report(42, "Filled", dec!(1), dec!(100)),
                    report(42, "Filled", dec!(3), dec!(104)),
                ],
            ),
            InMemoryLedger::new(),
        );
        track(&f, instruction(Side::Sell, dec!(4), "IB"), 42).await;

        f.use_case.execute().await;

        let position = f.positions.load(&key()).unwrap();
        assert_eq!(position.quantity, dec!(-4));
        assert_eq!(position.cost_basis, dec!(103));
    }

    #[tokio::test]
    async fn oversized_merged_fill_stays_outstanding() {
        let huge = dec!(1_000_000_000_000_000);
        let f = fixture(
            ReportingBroker::with_reports(
                "IB",
                vec![
                    report(42, "Filled", huge, huge),
                    report(42, "Filled", dec!(1), huge),
                ],
            ),
            InMemoryLedger::new(),
        );
        track(&f, instruction(Side::Buy, dec!(1), "IB"), 42).await;

        let result = f.use_case.execute().await;

        assert_eq!(result.fills_applied, 0);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.still_outstanding, 1);
        assert!(f.outstanding.has_order_for(&key()));
        assert!(f.positions.load(&key()).unwrap().is_pending());
    }

    #[tokio::test]
    async fn fill_overflowing_net_quantity_stays_outstanding() {
        let f = fixture(
            ReportingBroker::with_reports("IB", vec![report(42, "Filled", dec!(1), dec!(100))]),
            InMemoryLedger::new(),
        );
        track(&f, instruction(Side::Buy, dec!(1), "IB"), 42).await;
        f.positions.update(&key(), |p| p.quantity = Decimal::MAX);

        let result = f.use_case.execute().await;

        assert_eq!(result.errors.len(), 1);
        assert_eq!(f.outstanding.len(), 1);
        let position = f.positions.load(&key()).unwrap();
        assert_eq!(position.quantity, Decimal::MAX);
        assert!(position.is_pending());
    }

    #[tokio::test]
    async fn ledger_row_becomes_filled_at_fill_price() {
        let ledger = Arc::new(InMemoryLedger::new());
        let instr = instruction(Side::Buy, dec!(1), "IB");
        let ledger_id = ledger.insert_instruction(&instr).await.unwrap();
        ledger
            .mark_submitted(ledger_id, BrokerOrderId::new(42), Some(dec!(4500)))
            .await
            .unwrap();

        let positions = Arc::new(PositionStore::new());
        let outstanding = Arc::new(OutstandingOrderIndex::new());
        outstanding.insert(OutstandingOrder::new(
            Order::new(instr, Some(dec!(4500))),
            BrokerOrderId::new(42),
            Some(ledger_id),
        ));
        let use_case = ReconcileFillsUseCase::new(
            Arc::new(ReportingBroker::with_reports(
                "IB",
                vec![report(42, "filled", dec!(1), dec!(4500.25))],
            )),
            Arc::clone(&ledger),
            positions,
            outstanding,
        );

        use_case.execute().await;

        let record = ledger.get(ledger_id).unwrap();
        assert_eq!(record.status, LedgerStatus::Filled);
        assert_eq!(record.price, Some(dec!(4500.25)));
    }

    #[tokio::test]
    async fn ledger_failure_still_applies_fill() {
        let mut ledger = MockLedgerPort::new();
        ledger
            .expect_mark_status()
            .times(1)
            .returning(|id, _, _| Err(LedgerError::NotFound(id.to_string())));
        let f = fixture(
            ReportingBroker::with_reports("IB", vec![report(42, "Filled", dec!(2), dec!(50))]),
            ledger,
        );
        track(&f, instruction(Side::Buy, dec!(2), "IB"), 42).await;

        let result = f.use_case.execute().await;

        assert_eq!(result.fills_applied, 1);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(f.positions.load(&key()).unwrap().quantity, dec!(2));
        assert!(f.outstanding.is_empty());
    }

    #[tokio::test]
    async fn polls_each_broker_once() {
        let broker = ReportingBroker::with_reports("IB", vec![]);
        broker.trades.lock().insert("SIM".to_string(), Ok(vec![]));
        let f = fixture(broker, InMemoryLedger::new());
        track(&f, instruction(Side::Buy, dec!(1), "IB"), 1).await;
        f.outstanding.insert(OutstandingOrder::new(
            Order::new(instruction(Side::Buy, dec!(1), "IB"), None),
            BrokerOrderId::new(2),
            None,
        ));
        f.outstanding.insert(OutstandingOrder::new(
            Order::new(instruction(Side::Buy, dec!(1), "SIM"), None),
            BrokerOrderId::new(3),
            None,
        ));

        let result = f.use_case.execute().await;

        assert_eq!(result.brokers_polled, 2);
        assert_eq!(*f.broker.polls.lock(), vec!["IB".to_string(), "SIM".to_string()]);
    }
}
