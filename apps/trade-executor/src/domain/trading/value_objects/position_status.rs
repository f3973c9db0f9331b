//! Position lifecycle status.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a position.
///
/// `Pending` while an order for the key is outstanding, `Closed` when flat or
/// after a cancellation, `Filled` otherwise. Only fill reconciliation moves a
/// position out of `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionStatus {
    /// An order for this key is in flight.
    #[serde(alias = "pending")]
    Pending,
    /// Holding a non-zero quantity.
    #[serde(alias = "filled")]
    Filled,
    /// Flat, or the last order was cancelled.
    #[serde(alias = "closed")]
    Closed,
}

impl PositionStatus {
    /// String representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Filled => "Filled",
            Self::Closed => "Closed",
        }
    }
}

impl fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
