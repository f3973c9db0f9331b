//! Status of a trade ledger row.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ParseValueError;

/// Status of a ledger record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LedgerStatus {
    /// Instruction received, not yet submitted.
    Pending,
    /// Submitted to the broker.
    Submitted,
    /// Filled by the broker.
    Filled,
    /// Cancelled at the broker.
    Cancelled,
    /// Rejected by the broker.
    Rejected,
}

impl LedgerStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Submitted,
        Self::Filled,
        Self::Cancelled,
        Self::Rejected,
    ];

    /// Database/wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Submitted => "Submitted",
            Self::Filled => "Filled",
            Self::Cancelled => "Cancelled",
            Self::Rejected => "Rejected",
        }
    }

    /// Check if this is a terminal status.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Filled | Self::Cancelled | Self::Rejected)
    }
}

impl fmt::Display for LedgerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LedgerStatus {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "submitted" => Ok(Self::Submitted),
            "filled" => Ok(Self::Filled),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            "rejected" => Ok(Self::Rejected),
            _ => Err(ParseValueError::new("ledger status", s)),
        }
    }
}
