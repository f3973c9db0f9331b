//! Persistence adapters: position store, outstanding-order index and ledgers.

mod in_memory_ledger;
mod outstanding_orders;
mod position_store;
mod postgres_ledger;

pub use in_memory_ledger::InMemoryLedger;
pub use outstanding_orders::OutstandingOrderIndex;
pub use position_store::{ClaimError, PositionClaim, PositionStore, SnapshotError};
pub use postgres_ledger::PostgresLedger;
