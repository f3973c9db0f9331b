//! `SendTrade` payload.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::application::use_cases::IntakeError;
use crate::domain::trading::{OrderType, Side, TradeInstruction};

/// Trade instruction as sent by a strategy process.
///
/// Quantity and price arrive as JSON strings or numbers and are only
/// validated in [`SendTradeDto::into_instruction`], so a bad value produces
/// a typed intake error instead of a body-decoding failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendTradeDto {
    /// Strategy name.
    pub strategy_name: String,
    /// Broker contract identifier.
    pub contract_id: i64,
    /// Exchange.
    pub exchange: String,
    /// Symbol.
    pub symbol: String,
    /// `BUY` or `SELL`.
    pub side: String,
    /// Quantity, string or number.
    pub quantity: Value,
    /// `MKT` or `LMT`.
    pub order_type: String,
    /// Broker identifier.
    pub broker: String,
    /// Optional explicit price; zero or null means none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Value>,
}

impl SendTradeDto {
    /// Validate into a domain instruction.
    ///
    /// # Errors
    ///
    /// `InvalidQuantity` unless the quantity parses to a positive decimal,
    /// `InvalidPrice` for a present, non-zero price that is not a positive
    /// decimal, `InvalidRequest` for unknown side/order type or empty names.
    pub fn into_instruction(self) -> Result<TradeInstruction, IntakeError> {
        let quantity = parse_decimal(&self.quantity)
            .filter(|q| *q > Decimal::ZERO)
            .ok_or_else(|| IntakeError::InvalidQuantity(display_value(&self.quantity)))?;

        let limit_price = match self.price.as_ref().filter(|v| !is_blank(v)) {
            None => None,
            Some(raw) => {
                let price = parse_decimal(raw)
                    .filter(|p| *p >= Decimal::ZERO)
                    .ok_or_else(|| IntakeError::InvalidPrice(display_value(raw)))?;
                (!price.is_zero()).then_some(price)
            }
        };

        let side = Side::from_str(&self.side).map_err(|e| IntakeError::InvalidRequest(e.to_string()))?;
        let order_type =
            OrderType::from_str(&self.order_type).map_err(|e| IntakeError::InvalidRequest(e.to_string()))?;

        for (field, value) in [
            ("strategy_name", &self.strategy_name),
            ("symbol", &self.symbol),
            ("broker", &self.broker),
        ] {
            if value.trim().is_empty() {
                return Err(IntakeError::InvalidRequest(format!("{field} must not be empty")));
            }
        }

        Ok(TradeInstruction {
            strategy_name: self.strategy_name.trim().to_string(),
            contract_id: self.contract_id,
            exchange: self.exchange.trim().to_string(),
            symbol: self.symbol.trim().to_string(),
            side,
            quantity,
            order_type,
            broker: self.broker.trim().to_string(),
            limit_price,
        })
    }
}

fn parse_decimal(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
