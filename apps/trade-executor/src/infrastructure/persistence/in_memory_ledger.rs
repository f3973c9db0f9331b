//! In-memory trade ledger.
//!
//! Implements the full ledger contract, including the
//! `(broker_order_id, trading_date)` uniqueness rule. Used by tests and by
//! `ledger.backend: memory`.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::application::ports::{LedgerError, LedgerPort, LedgerRecord, TradeQuery};
use crate::domain::shared::{BrokerOrderId, LedgerId};
use crate::domain::trading::{LedgerStatus, TradeInstruction};

#[derive(Debug, Default)]
struct LedgerState {
    next_id: i64,
    records: Vec<LedgerRecord>,
}

/// Ledger held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of a row by id.
    #[must_use]
    pub fn get(&self, id: LedgerId) -> Option<LedgerRecord> {
        self.state.lock().records.iter().find(|r| r.id == id).cloned()
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    /// Check if the ledger is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().records.is_empty()
    }

    /// Append a fully-formed row, e.g. to seed recovery tests.
    pub fn seed(&self, record: LedgerRecord) {
        let mut state = self.state.lock();
        state.next_id = state.next_id.max(record.id.value());
        state.records.push(record);
    }
}

#[async_trait]
impl LedgerPort for InMemoryLedger {
    async fn insert_instruction(
        &self,
        instruction: &TradeInstruction,
    ) -> Result<LedgerId, LedgerError> {
        let now = Utc::now();
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = LedgerId::new(state.next_id);

        state.records.push(LedgerRecord {
            id,
            strategy_name: instruction.strategy_name.clone(),
            contract_id: instruction.contract_id,
            exchange: instruction.exchange.clone(),
            symbol: instruction.symbol.clone(),
            side: instruction.side,
            quantity: instruction.quantity,
            order_type: instruction.order_type,
            broker: instruction.broker.clone(),
            price: instruction.limit_price,
            broker_order_id: None,
            trading_date: now.date_naive(),
            status: LedgerStatus::Pending,
            created_at: now,
            last_updated_at: now,
        });

        Ok(id)
    }

    async fn mark_submitted(
        &self,
        ledger_id: LedgerId,
        order_id: BrokerOrderId,
        price: Option<Decimal>,
    ) -> Result<(), LedgerError> {
        let mut state = self.state.lock();

        let Some(index) = state.records.iter().position(|r| r.id == ledger_id) else {
            return Err(LedgerError::NotFound(format!("ledger id {ledger_id}")));
        };
        let trading_date = state.records[index].trading_date;

        let duplicate = state.records.iter().any(|r| {
            r.id != ledger_id
                && r.broker_order_id == Some(order_id)
                && r.trading_date == trading_date
        });
        if duplicate {
            return Err(LedgerError::Duplicate(order_id));
        }

        let record = &mut state.records[index];
        record.status = LedgerStatus::Submitted;
        record.broker_order_id = Some(order_id);
        record.price = price;
        record.last_updated_at = Utc::now();
        Ok(())
    }

    async fn mark_status(
        &self,
        order_id: BrokerOrderId,
        status: LedgerStatus,
        fill_price: Option<Decimal>,
    ) -> Result<(), LedgerError> {
        let mut state = self.state.lock();

        let Some(record) = state
            .records
            .iter_mut()
            .filter(|r| r.broker_order_id == Some(order_id))
            .max_by_key(|r| (r.trading_date, r.id))
        else {
            tracing::warn!(broker_order_id = %order_id, status = %status, "No ledger row for broker order id");
            return Err(LedgerError::NotFound(format!("broker order id {order_id}")));
        };

        record.status = status;
        if let (LedgerStatus::Filled, Some(price)) = (status, fill_price) {
            record.price = Some(price);
        }
        record.last_updated_at = Utc::now();
        Ok(())
    }

    async fn query(&self, query: &TradeQuery) -> Result<Vec<LedgerRecord>, LedgerError> {
        let state = self.state.lock();
        let mut rows: Vec<LedgerRecord> = state
            .records
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        drop(state);

        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        if let Some(limit) = query.limit {
            rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }
        Ok(rows)
    }
}
