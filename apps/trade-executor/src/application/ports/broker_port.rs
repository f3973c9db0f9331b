//! Broker Port (Driven Port)
//!
//! Interface to the broker API: quotes, order submission and trade reports.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::shared::BrokerOrderId;
use crate::domain::trading::{Order, Side, TradeInstruction, TradeReport};

/// Identifies the contract to quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRequest {
    /// Broker to ask.
    pub broker: String,
    /// Exchange.
    pub exchange: String,
    /// Broker contract identifier.
    pub contract_id: i64,
}

impl QuoteRequest {
    /// Quote request for an instruction's contract.
    #[must_use]
    pub fn for_instruction(instruction: &TradeInstruction) -> Self {
        Self {
            broker: instruction.broker.clone(),
            exchange: instruction.exchange.clone(),
            contract_id: instruction.contract_id,
        }
    }
}

/// Top-of-book quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Quote {
    /// Best bid.
    pub bid: Option<Decimal>,
    /// Best ask.
    pub ask: Option<Decimal>,
    /// Last traded price; zero or missing means no live market.
    pub last: Option<Decimal>,
}

impl Quote {
    /// Check if the market is live (non-zero last price).
    #[must_use]
    pub fn has_live_market(&self) -> bool {
        self.last.is_some_and(|p| !p.is_zero())
    }

    /// Limit price for a side: the bid when selling, the ask when buying.
    #[must_use]
    pub fn price_for(&self, side: Side) -> Option<Decimal> {
        let price = match side {
            Side::Buy => self.ask,
            Side::Sell => self.bid,
        };
        price.filter(|p| *p > Decimal::ZERO)
    }
}

/// Broker port errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BrokerError {
    /// Connection or transport error.
    #[error("Connection error: {message}")]
    ConnectionError {
        /// Error message.
        message: String,
    },

    /// The call did not complete within its deadline.
    #[error("Broker call timed out: {operation}")]
    Timeout {
        /// Which call timed out.
        operation: String,
    },

    /// Order rejected by broker.
    #[error("Order rejected: {reason}")]
    OrderRejected {
        /// Rejection reason.
        reason: String,
    },

    /// No live market for the contract (zero last price or empty side).
    #[error("No live market for contract {contract_id}")]
    NoLiveMarket {
        /// Contract that could not be priced.
        contract_id: i64,
    },

    /// Non-JSON or unexpected response body.
    #[error("Malformed broker response: {message}")]
    MalformedResponse {
        /// Parse error details.
        message: String,
    },

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Unknown error.
    #[error("Unknown error: {message}")]
    Unknown {
        /// Error message.
        message: String,
    },
}

impl BrokerError {
    /// Short label for metrics and logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ConnectionError { .. } => "connection",
            Self::Timeout { .. } => "timeout",
            Self::OrderRejected { .. } => "rejected",
            Self::NoLiveMarket { .. } => "no_live_market",
            Self::MalformedResponse { .. } => "malformed_response",
            Self::RateLimited => "rate_limited",
            Self::Unknown { .. } => "unknown",
        }
    }
}

/// Broker port for quotes, order submission and fill polling.
#[async_trait]
pub trait BrokerPort: Send + Sync {
    /// Fetch a quote for a contract.
    async fn get_quote(&self, request: &QuoteRequest) -> Result<Quote, BrokerError>;

    /// Transmit an order; returns the broker-assigned order id.
    async fn submit_order(&self, order: &Order) -> Result<BrokerOrderId, BrokerError>;

    /// Fetch the broker's current trade/fill report list.
    async fn get_trades(&self, broker: &str) -> Result<Vec<TradeReport>, BrokerError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn zero_last_is_not_live() {
        let quote = Quote {
            bid: Some(dec!(99)),
            ask: Some(dec!(101)),
            last: Some(Decimal::ZERO),
        };
        assert!(!quote.has_live_market());
        assert!(!Quote::default().has_live_market());
    }

    #[test]
    fn buy_prices_at_ask_sell_at_bid() {
        let quote = Quote {
            bid: Some(dec!(4500.00)),
            ask: Some(dec!(4500.25)),
            last: Some(dec!(4500.25)),
        };
        assert_eq!(quote.price_for(Side::Buy), Some(dec!(4500.25)));
        assert_eq!(quote.price_for(Side::Sell), Some(dec!(4500.00)));
    }

    #[test]
    fn empty_side_has_no_price() {
        let quote = Quote {
            bid: Some(Decimal::ZERO),
            ask: None,
            last: Some(dec!(10)),
        };
        assert_eq!(quote.price_for(Side::Buy), None);
        assert_eq!(quote.price_for(Side::Sell), None);
    }

    #[test]
    fn error_kinds_are_stable_labels() {
        assert_eq!(BrokerError::RateLimited.kind(), "rate_limited");
        assert_eq!(
            BrokerError::NoLiveMarket { contract_id: 1 }.kind(),
            "no_live_market"
        );
    }
}
