//! Simulated broker for test-trade mode.
//!
//! Quotes a fixed price and fills every submitted order on the next poll.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rand::Rng;
use rust_decimal::Decimal;

use crate::application::ports::{BrokerError, BrokerPort, Quote, QuoteRequest};
use crate::domain::shared::BrokerOrderId;
use crate::domain::trading::{Order, ReportStatus, TradeReport};

/// In-process broker that fills everything.
#[derive(Debug)]
pub struct SimulatedBroker {
    quote: Mutex<Quote>,
    next_order_id: AtomicI64,
    reports: Mutex<HashMap<String, Vec<TradeReport>>>,
}

impl SimulatedBroker {
    /// Quote `price` on both sides and fill market orders at it.
    #[must_use]
    pub fn new(price: Decimal) -> Self {
        Self {
            quote: Mutex::new(Quote {
                bid: Some(price),
                ask: Some(price),
                last: Some(price),
            }),
            next_order_id: AtomicI64::new(rand::rng().random_range(100_000..1_000_000)),
            reports: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the quote returned for every contract.
    pub fn set_quote(&self, quote: Quote) {
        *self.quote.lock() = quote;
    }

    /// Number of orders accepted so far.
    #[must_use]
    pub fn submitted_count(&self) -> usize {
        self.reports.lock().values().map(Vec::len).sum()
    }
}

#[async_trait]
impl BrokerPort for SimulatedBroker {
    async fn get_quote(&self, _request: &QuoteRequest) -> Result<Quote, BrokerError> {
        Ok(*self.quote.lock())
    }

    async fn submit_order(&self, order: &Order) -> Result<BrokerOrderId, BrokerError> {
        let order_id = BrokerOrderId::new(self.next_order_id.fetch_add(1, Ordering::Relaxed));
        let fill_price = order
            .price
            .or_else(|| self.quote.lock().last)
            .unwrap_or(Decimal::ZERO);

        self.reports
            .lock()
            .entry(order.instruction.broker.clone())
            .or_default()
            .push(TradeReport {
                order_id,
                price: fill_price,
                quantity: order.instruction.quantity,
                status: ReportStatus::Filled,
                time: Some(Utc::now().to_rfc3339()),
            });

        tracing::info!(
            broker_order_id = %order_id,
            symbol = %order.instruction.symbol,
            price = %fill_price,
            "Simulated order accepted"
        );
        Ok(order_id)
    }

    async fn get_trades(&self, broker: &str) -> Result<Vec<TradeReport>, BrokerError> {
        Ok(self.reports.lock().get(broker).cloned().unwrap_or_default())
    }
}
