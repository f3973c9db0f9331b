//! Domain layer.
//!
//! Pure value objects and entities for the trade pipeline. Nothing in here
//! performs I/O or knows about the broker, the ledger, or the snapshot file.
//!
//! - `shared`: strongly-typed identifiers
//! - `trading`: instructions, orders, positions and broker trade reports

pub mod shared;
pub mod trading;
