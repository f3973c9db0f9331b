//! Broker REST API request and response types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::application::ports::Quote;
use crate::domain::shared::BrokerOrderId;
use crate::domain::trading::{Order, OrderType, ReportStatus, Side, TradeReport};

/// Quote response: `{"bid", "ask", "last"}`, any of which may be null or absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuoteResponse {
    /// Best bid.
    #[serde(default)]
    pub bid: Option<Decimal>,
    /// Best ask.
    #[serde(default)]
    pub ask: Option<Decimal>,
    /// Last traded price.
    #[serde(default)]
    pub last: Option<Decimal>,
}

impl From<QuoteResponse> for Quote {
    fn from(response: QuoteResponse) -> Self {
        Self {
            bid: response.bid,
            ask: response.ask,
            last: response.last,
        }
    }
}

/// Order submission body.
#[derive(Debug, Clone, Serialize)]
pub struct OrderRequest<'a> {
    /// Strategy name.
    pub strategy_name: &'a str,
    /// Contract id.
    pub contract_id: i64,
    /// Exchange.
    pub exchange: &'a str,
    /// Symbol.
    pub symbol: &'a str,
    /// BUY / SELL.
    pub side: Side,
    /// Unsigned quantity.
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    /// MKT / LMT.
    pub order_type: OrderType,
    /// Broker identifier.
    pub broker: &'a str,
    /// Resolved limit price, omitted for broker-priced market orders.
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub limit_price: Option<Decimal>,
    /// Submission time.
    pub timestamp: DateTime<Utc>,
}

impl<'a> From<&'a Order> for OrderRequest<'a> {
    fn from(order: &'a Order) -> Self {
        let instruction = &order.instruction;
        Self {
            strategy_name: &instruction.strategy_name,
            contract_id: instruction.contract_id,
            exchange: &instruction.exchange,
            symbol: &instruction.symbol,
            side: instruction.side,
            quantity: instruction.quantity,
            order_type: instruction.order_type,
            broker: &instruction.broker,
            limit_price: order.price,
            timestamp: order.created_at,
        }
    }
}

/// Order id as the broker encodes it: a JSON number or a numeric string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RawOrderId {
    /// `123`
    Number(i64),
    /// `"123"`
    Text(String),
}

impl RawOrderId {
    /// Parse into a broker order id.
    #[must_use]
    pub fn parse(&self) -> Option<BrokerOrderId> {
        match self {
            Self::Number(n) => Some(BrokerOrderId::new(*n)),
            Self::Text(s) => BrokerOrderId::parse(s),
        }
    }
}

/// One entry of the trades list.
#[derive(Debug, Clone, Deserialize)]
pub struct TradeReportResponse {
    /// Broker order id.
    #[serde(rename = "orderId", alias = "order_id", alias = "id")]
    pub order_id: RawOrderId,
    /// Fill price.
    #[serde(default)]
    pub price: Decimal,
    /// Fill quantity.
    #[serde(default)]
    pub quantity: Decimal,
    /// Broker status string.
    pub status: String,
    /// Broker-reported time.
    #[serde(default)]
    pub time: Option<String>,
}

impl TradeReportResponse {
    /// Convert to a domain report. `None` if the order id is not numeric.
    #[must_use]
    pub fn into_report(self) -> Option<TradeReport> {
        let order_id = self.order_id.parse()?;
        Some(TradeReport {
            order_id,
            price: self.price,
            quantity: self.quantity.abs(),
            status: ReportStatus::from(self.status),
            time: self.time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trading::TradeInstruction;
    use rust_decimal_macros::dec;

    #[test]
    fn quote_accepts_nulls_and_missing_fields() {
        let quote: QuoteResponse = serde_json::from_str(r#"{"bid": 4500.0, "ask": null}"#).unwrap();
        assert_eq!(quote.bid, Some(dec!(4500)));
        assert_eq!(quote.ask, None);
        assert_eq!(quote.last, None);
    }

    #[test]
    fn trade_report_accepts_id_aliases() {
        let camel: TradeReportResponse = serde_json::from_str(
            r#"{"orderId": 42, "price": 101.5, "quantity": 10, "status": "Filled", "time": "2024-03-01 10:00:00"}"#,
        )
        .unwrap();
        let snake: TradeReportResponse =
            serde_json::from_str(r#"{"order_id": "42", "price": 101.5, "quantity": 10, "status": "Filled"}"#).unwrap();
        let bare: TradeReportResponse =
            serde_json::from_str(r#"{"id": 42, "price": "101.5", "quantity": "10", "status": "filled"}"#).unwrap();

        for response in [camel, snake, bare] {
            let report = response.into_report().unwrap();
            assert_eq!(report.order_id, BrokerOrderId::new(42));
            assert_eq!(report.price, dec!(101.5));
            assert_eq!(report.quantity, dec!(10));
            assert_eq!(report.status, ReportStatus::Filled);
        }
    }

    #[test]
    fn non_numeric_order_id_is_skipped() {
        let response: TradeReportResponse =
            serde_json::from_str(r#"{"orderId": "abc", "price": 1, "quantity": 1, "status": "Filled"}"#).unwrap();
        assert!(response.into_report().is_none());
    }

    #[test]
    fn order_request_omits_missing_price() {
        let instruction = TradeInstruction {
            strategy_name: "S1".to_string(),
            contract_id: 123,
            exchange: "CME".to_string(),
            symbol: "ES".to_string(),
            side: Side::Buy,
            quantity: dec!(1),
            order_type: OrderType::Market,
            broker: "IB".to_string(),
            limit_price: None,
        };
        let order = Order::new(instruction, None);

        let json = serde_json::to_value(OrderRequest::from(&order)).unwrap();
        assert_eq!(json["side"], "BUY");
        assert_eq!(json["order_type"], "MKT");
        assert_eq!(json["quantity"], 1.0);
        assert!(json.get("limit_price").is_none());
    }
}
