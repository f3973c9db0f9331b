//! Status carried on a broker trade report.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::LedgerStatus;

/// Status reported by the broker for a trade.
///
/// Only `Filled` and `Cancelled` are terminal; anything else (working,
/// partially filled, unknown strings) is kept verbatim and ignored by
/// reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReportStatus {
    /// Order fully filled.
    Filled,
    /// Order cancelled.
    Cancelled,
    /// Any non-terminal status.
    Other(String),
}

impl ReportStatus {
    /// Check if the broker considers the order finished.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Filled | Self::Cancelled)
    }

    /// Ledger status to record for a terminal report.
    #[must_use]
    pub const fn ledger_status(&self) -> Option<LedgerStatus> {
        match self {
            Self::Filled => Some(LedgerStatus::Filled),
            Self::Cancelled => Some(LedgerStatus::Cancelled),
            Self::Other(_) => None,
        }
    }
}

impl From<String> for ReportStatus {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "filled" => Self::Filled,
            "cancelled" | "canceled" => Self::Cancelled,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for ReportStatus {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<ReportStatus> for String {
    fn from(value: ReportStatus) -> Self {
        match value {
            ReportStatus::Filled => "Filled".to_string(),
            ReportStatus::Cancelled => "Cancelled".to_string(),
            ReportStatus::Other(s) => s,
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Filled => f.write_str("Filled"),
            Self::Cancelled => f.write_str("Cancelled"),
            Self::Other(s) => f.write_str(s),
        }
    }
}
