//! Index of transmitted orders awaiting a terminal report.

use std::collections::{BTreeMap, BTreeSet};

use parking_lot::RwLock;

use crate::domain::shared::{BrokerOrderId, PositionKey};
use crate::domain::trading::{OrderKey, OutstandingOrder};

/// Outstanding orders ordered by (submission time, broker order id).
#[derive(Debug, Default)]
pub struct OutstandingOrderIndex {
    orders: RwLock<BTreeMap<OrderKey, OutstandingOrder>>,
}

impl OutstandingOrderIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an order. Returns its key.
    pub fn insert(&self, order: OutstandingOrder) -> OrderKey {
        let key = order.key();
        self.orders.write().insert(key, order);
        key
    }

    /// Remove an order by key.
    pub fn remove(&self, key: &OrderKey) -> Option<OutstandingOrder> {
        self.orders.write().remove(key)
    }

    /// Look up an order by key.
    #[must_use]
    pub fn get(&self, key: &OrderKey) -> Option<OutstandingOrder> {
        self.orders.read().get(key).cloned()
    }

    /// First order carrying `order_id`, in key order.
    #[must_use]
    pub fn find_by_order_id(&self, order_id: BrokerOrderId) -> Option<OutstandingOrder> {
        self.orders
            .read()
            .values()
            .find(|o| o.broker_order_id == order_id)
            .cloned()
    }

    /// Check if any outstanding order moves `position`.
    #[must_use]
    pub fn has_order_for(&self, position: &PositionKey) -> bool {
        self.orders
            .read()
            .values()
            .any(|o| o.position_key() == *position)
    }

    /// Copy of every order, in key order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<OutstandingOrder> {
        self.orders.read().values().cloned().collect()
    }

    /// Distinct brokers with at least one order outstanding.
    #[must_use]
    pub fn brokers(&self) -> BTreeSet<String> {
        self.orders
            .read()
            .values()
            .map(|o| o.broker().to_string())
            .collect()
    }

    /// Orders routed to `broker`, in key order.
    #[must_use]
    pub fn for_broker(&self, broker: &str) -> Vec<OutstandingOrder> {
        self.orders
            .read()
            .values()
            .filter(|o| o.broker() == broker)
            .cloned()
            .collect()
    }

    /// Number of outstanding orders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.orders.read().len()
    }

    /// Check if nothing is outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.read().is_empty()
    }
}
