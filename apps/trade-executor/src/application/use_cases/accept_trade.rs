//! Accept Trade Use Case
//!
//! Validates a `SendTrade` payload, records it in the ledger and hands it to
//! the execution workers. Returns as soon as the instruction is queued.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::application::dto::SendTradeDto;
use crate::application::ports::LedgerPort;
use crate::application::services::{IntakeSender, QueueClosed};
use crate::domain::shared::LedgerId;
use crate::domain::trading::QueuedInstruction;
use crate::observability::{record_trade_received, update_intake_queue_depth};

/// Acknowledgement returned to the strategy process.
pub const ACK_STATUS: &str = "Trade received and processing";

/// Errors surfaced to the `SendTrade` caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntakeError {
    /// Quantity missing, unparseable or not positive.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    /// Explicit price unparseable or negative.
    #[error("invalid price: {0}")]
    InvalidPrice(String),

    /// Any other malformed field.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Shutdown in progress.
    #[error("intake queue is closed")]
    QueueClosed,
}

impl IntakeError {
    /// Metrics label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::InvalidQuantity(_) => "invalid_quantity",
            Self::InvalidPrice(_) => "invalid_price",
            Self::InvalidRequest(_) => "invalid_request",
            Self::QueueClosed => "queue_closed",
        }
    }
}

impl From<QueueClosed> for IntakeError {
    fn from(_: QueueClosed) -> Self {
        Self::QueueClosed
    }
}

/// Result of an accepted trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TradeAck {
    /// Always [`ACK_STATUS`].
    pub status: &'static str,
    /// Ledger row, absent if the ledger insert failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_id: Option<LedgerId>,
}

/// Use case behind `SendTrade`.
pub struct AcceptTradeUseCase<L>
where
    L: LedgerPort,
{
    ledger: Arc<L>,
    queue: IntakeSender,
}

impl<L> AcceptTradeUseCase<L>
where
    L: LedgerPort,
{
    /// Create a new `AcceptTradeUseCase`.
    pub const fn new(ledger: Arc<L>, queue: IntakeSender) -> Self {
        Self { ledger, queue }
    }

    /// Validate, record and enqueue.
    ///
    /// A ledger failure is logged and the trade still proceeds. Waits while
    /// the queue is full.
    ///
    /// # Errors
    ///
    /// Returns a validation error (nothing recorded or queued) or
    /// `QueueClosed` during shutdown.
    pub async fn execute(&self, dto: SendTradeDto) -> Result<TradeAck, IntakeError> {
        let instruction = match dto.into_instruction() {
            Ok(instruction) => instruction,
            Err(e) => {
                tracing::warn!(error = %e, "Rejected trade instruction");
                record_trade_received(e.label());
                return Err(e);
            }
        };

        if self.queue.is_closed() {
            record_trade_received(IntakeError::QueueClosed.label());
            return Err(IntakeError::QueueClosed);
        }

        let ledger_id = match self.ledger.insert_instruction(&instruction).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    position_key = %instruction.position_key(),
                    "Failed to record instruction in ledger, processing anyway"
                );
                None
            }
        };

        tracing::info!(
            position_key = %instruction.position_key(),
            ledger_id = ?ledger_id.map(|id| id.value()),
            side = %instruction.side,
            quantity = %instruction.quantity,
            order_type = %instruction.order_type,
            "Trade received"
        );

        if let Err(e) = self
            .queue
            .send(QueuedInstruction::new(instruction, ledger_id))
            .await
        {
            record_trade_received(IntakeError::QueueClosed.label());
            return Err(e.into());
        }

        record_trade_received("accepted");
        update_intake_queue_depth(self.queue.depth());

        Ok(TradeAck {
            status: ACK_STATUS,
            ledger_id,
        })
    }
}
