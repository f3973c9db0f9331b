//! Execute Trade Use Case
//!
//! Turns one queued instruction into a submitted broker order: claim the
//! position key, resolve the price, submit, then record the order as
//! outstanding and the position as `Pending`.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;

use crate::application::ports::{BrokerError, BrokerPort, LedgerPort, QuoteRequest};
use crate::domain::shared::BrokerOrderId;
use crate::domain::trading::{
    Order, OrderType, OutstandingOrder, QueuedInstruction, TradeInstruction,
};
use crate::infrastructure::persistence::{ClaimError, OutstandingOrderIndex, PositionStore};
use crate::observability::{
    record_instruction_dropped, record_order_submitted, update_outstanding_orders,
};

/// Why an instruction was dropped after its claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Quote call failed or the market is not live.
    QuoteFailed,
    /// The quote has no usable price on the needed side.
    NoPrice,
    /// Order submission failed.
    SubmitFailed,
}

impl DropReason {
    /// Metrics label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::QuoteFailed => "quote_failed",
            Self::NoPrice => "no_price",
            Self::SubmitFailed => "submit_failed",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What happened to one instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Order accepted by the broker and tracked as outstanding.
    Submitted {
        /// Broker-assigned id.
        broker_order_id: BrokerOrderId,
        /// Resolved limit price, `None` for market orders.
        price: Option<Decimal>,
    },
    /// An order for the same position is already pending.
    Skipped(ClaimError),
    /// Processing aborted; the instruction is not retried.
    Dropped {
        /// Drop category.
        reason: DropReason,
        /// Underlying error.
        error: String,
    },
}

impl ExecutionOutcome {
    fn dropped(reason: DropReason, error: impl ToString) -> Self {
        Self::Dropped {
            reason,
            error: error.to_string(),
        }
    }
}

/// Use case run by each execution worker.
pub struct ExecuteTradeUseCase<B, L>
where
    B: BrokerPort,
    L: LedgerPort,
{
    broker: Arc<B>,
    ledger: Arc<L>,
    positions: Arc<PositionStore>,
    outstanding: Arc<OutstandingOrderIndex>,
}

impl<B, L> ExecuteTradeUseCase<B, L>
where
    B: BrokerPort,
    L: LedgerPort,
{
    /// Create a new `ExecuteTradeUseCase`.
    pub const fn new(
        broker: Arc<B>,
        ledger: Arc<L>,
        positions: Arc<PositionStore>,
        outstanding: Arc<OutstandingOrderIndex>,
    ) -> Self {
        Self {
            broker,
            ledger,
            positions,
            outstanding,
        }
    }

    /// Process one instruction.
    ///
    /// Never fails: every error is terminal for this instruction only and is
    /// reported through the outcome.
    pub async fn execute(&self, queued: QueuedInstruction) -> ExecutionOutcome {
        let QueuedInstruction {
            instruction,
            ledger_id,
            ..
        } = queued;
        let position_key = instruction.position_key();

        let claim = match self.positions.claim(&position_key).await {
            Ok(claim) => claim,
            Err(e) => {
                tracing::warn!(
                    position_key = %position_key,
                    reason = %e,
                    "Skipping instruction, order already pending"
                );
                record_instruction_dropped("duplicate");
                return ExecutionOutcome::Skipped(e);
            }
        };

        let price = match self.resolve_price(&instruction).await {
            Ok(price) => price,
            Err((reason, error)) => {
                tracing::warn!(
                    position_key = %position_key,
                    ledger_id = ?ledger_id.map(|id| id.value()),
                    reason = %reason,
                    error = %error,
                    "Dropping instruction, price resolution failed"
                );
                record_instruction_dropped(reason.label());
                return ExecutionOutcome::dropped(reason, error);
            }
        };

        let order = Order::new(instruction, price);
        let broker_order_id = match self.broker.submit_order(&order).await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(
                    position_key = %position_key,
                    ledger_id = ?ledger_id.map(|id| id.value()),
                    error = %e,
                    "Dropping instruction, order submission failed"
                );
                record_instruction_dropped(DropReason::SubmitFailed.label());
                return ExecutionOutcome::dropped(DropReason::SubmitFailed, e);
            }
        };

        if let Some(ledger_id) = ledger_id {
            if let Err(e) = self
                .ledger
                .mark_submitted(ledger_id, broker_order_id, price)
                .await
            {
                tracing::error!(
                    error = %e,
                    ledger_id = %ledger_id,
                    broker_order_id = %broker_order_id,
                    "Failed to mark ledger record submitted"
                );
            }
        }

        // Pending must be visible before the order can be reconciled.
        claim.commit(&order.instruction, order.created_at);

        let instruction = &order.instruction;
        record_order_submitted(&instruction.broker, instruction.order_type.as_str());
        tracing::info!(
            position_key = %position_key,
            broker_order_id = %broker_order_id,
            price = ?price,
            side = %instruction.side,
            quantity = %instruction.quantity,
            "Order submitted"
        );

        self.outstanding
            .insert(OutstandingOrder::new(order, broker_order_id, ledger_id));
        update_outstanding_orders(self.outstanding.len());

        self.positions.persist_or_log().await;

        ExecutionOutcome::Submitted {
            broker_order_id,
            price,
        }
    }

    /// Explicit price, else none for market orders, else the quote's side.
    async fn resolve_price(
        &self,
        instruction: &TradeInstruction,
    ) -> Result<Option<Decimal>, (DropReason, BrokerError)> {
        if let Some(price) = instruction.limit_price {
            return Ok(Some(price));
        }
        if instruction.order_type == OrderType::Market {
            return Ok(None);
        }

        let quote = self
            .broker
            .get_quote(&QuoteRequest::for_instruction(instruction))
            .await
            .map_err(|e| (DropReason::QuoteFailed, e))?;

        let no_market = || BrokerError::NoLiveMarket {
            contract_id: instruction.contract_id,
        };
        if !quote.has_live_market() {
            return Err((DropReason::QuoteFailed, no_market()));
        }

        quote
            .price_for(instruction.side)
            .map(Some)
            .ok_or_else(|| (DropReason::NoPrice, no_market()))
    }
}
