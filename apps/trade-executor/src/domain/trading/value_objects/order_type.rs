//! Order type (market or limit).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ParseValueError;

/// Order type as sent by strategy processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    /// Market order; the broker resolves the price.
    #[serde(rename = "MKT")]
    Market,
    /// Limit order; priced from the instruction or a live quote.
    #[serde(rename = "LMT")]
    Limit,
}

impl OrderType {
    /// Wire representation (`MKT` / `LMT`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Market => "MKT",
            Self::Limit => "LMT",
        }
    }

    /// Whether the broker resolves the execution price.
    #[must_use]
    pub const fn is_market(&self) -> bool {
        matches!(self, Self::Market)
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderType {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MKT" | "MARKET" => Ok(Self::Market),
            "LMT" | "LIMIT" => Ok(Self::Limit),
            _ => Err(ParseValueError::new("order type", s)),
        }
    }
}
