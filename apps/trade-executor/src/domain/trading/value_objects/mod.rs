//! Value objects for the trading domain.

mod ledger_status;
mod order_type;
mod position_status;
mod report_status;
mod side;

pub use ledger_status::LedgerStatus;
pub use order_type::OrderType;
pub use position_status::PositionStatus;
pub use report_status::ReportStatus;
pub use side::Side;

use thiserror::Error;

/// A string could not be parsed into a value object.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind}: '{value}'")]
pub struct ParseValueError {
    /// Which value object was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

impl ParseValueError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
