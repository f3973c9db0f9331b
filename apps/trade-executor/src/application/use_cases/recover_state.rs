//! Recover State Use Case
//!
//! Startup recovery: hydrate positions from the snapshot, rebuild the
//! outstanding-order index from the ledger, and release any position left
//! `Pending` without an order to track.

use std::sync::Arc;

use chrono::Utc;

use crate::application::ports::{LedgerPort, TradeQuery};
use crate::domain::trading::{Order, OutstandingOrder, Position};
use crate::infrastructure::persistence::{OutstandingOrderIndex, PositionStore, SnapshotError};
use crate::observability::update_outstanding_orders;

/// Result of startup recovery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Positions read from the snapshot.
    pub positions_loaded: usize,
    /// Outstanding orders rebuilt from `Submitted` ledger rows.
    pub orders_restored: usize,
    /// `Pending` positions released because nothing tracks them.
    pub positions_settled: usize,
    /// Non-fatal errors.
    pub errors: Vec<String>,
}

/// Use case run once before the workers start.
pub struct RecoverStateUseCase<L>
where
    L: LedgerPort,
{
    ledger: Arc<L>,
    positions: Arc<PositionStore>,
    outstanding: Arc<OutstandingOrderIndex>,
}

impl<L> RecoverStateUseCase<L>
where
    L: LedgerPort,
{
    /// Create a new `RecoverStateUseCase`.
    pub const fn new(
        ledger: Arc<L>,
        positions: Arc<PositionStore>,
        outstanding: Arc<OutstandingOrderIndex>,
    ) -> Self {
        Self {
            ledger,
            positions,
            outstanding,
        }
    }

    /// Run recovery.
    ///
    /// A ledger failure is not fatal but disables settling, since positions
    /// cannot be told apart from orders that are merely unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot file exists but cannot be read or
    /// parsed.
    pub async fn execute(&self) -> Result<RecoveryResult, SnapshotError> {
        let mut result = RecoveryResult::default();

        if let Some(path) = self.positions.snapshot_path() {
            result.positions_loaded = self.positions.load_from_file(path)?;
            tracing::info!(
                path = %path.display(),
                positions = result.positions_loaded,
                "Loaded position snapshot"
            );
        }

        let ledger_ok = match self.ledger.query(&TradeQuery::submitted()).await {
            Ok(records) => {
                for record in records {
                    let Some(order_id) = record.broker_order_id else {
                        continue;
                    };
                    if self.outstanding.find_by_order_id(order_id).is_some() {
                        continue;
                    }

                    let instruction = record.to_instruction();
                    let key = instruction.position_key();
                    let at = record.last_updated_at;

                    if self.positions.update(&key, |p| p.mark_pending(at)).is_none() {
                        self.positions
                            .store(key.clone(), Position::pending_for(&instruction, at));
                    }
                    self.outstanding.insert(OutstandingOrder::new(
                        Order::at(instruction, record.price, at),
                        order_id,
                        Some(record.id),
                    ));
                    result.orders_restored += 1;

                    tracing::info!(
                        position_key = %key,
                        broker_order_id = %order_id,
                        ledger_id = %record.id,
                        "Restored outstanding order"
                    );
                }
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to read submitted orders from ledger");
                result.errors.push(e.to_string());
                false
            }
        };

        if ledger_ok {
            let now = Utc::now();
            for key in self.positions.pending_keys() {
                if self.outstanding.has_order_for(&key) {
                    continue;
                }
                self.positions.update(&key, |p| p.settle(now));
                result.positions_settled += 1;
                tracing::warn!(
                    position_key = %key,
                    "Released pending position with no outstanding order"
                );
            }
        }

        self.positions.persist_or_log().await;
        update_outstanding_orders(self.outstanding.len());

        Ok(result)
    }
}
