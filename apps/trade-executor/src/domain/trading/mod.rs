//! Trading domain: instructions flow in, orders go out, reports come back,
//! positions net the fills.

pub mod instruction;
pub mod order;
pub mod position;
pub mod trade_report;
pub mod value_objects;

pub use instruction::{QueuedInstruction, TradeInstruction};
pub use order::{Order, OrderKey, OutstandingOrder};
pub use position::Position;
pub use trade_report::{FillOverflow, TradeReport, consolidate_terminal_reports};
pub use value_objects::{
    LedgerStatus, OrderType, ParseValueError, PositionStatus, ReportStatus, Side,
};
