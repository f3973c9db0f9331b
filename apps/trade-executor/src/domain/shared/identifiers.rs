//! Strongly-typed identifiers for domain entities.
//!
//! These prevent mixing up ledger row ids with broker order ids.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_numeric_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wrap a raw identifier value.
            #[must_use]
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Get the raw identifier value.
            #[must_use]
            pub const fn value(&self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }
    };
}

define_numeric_id!(LedgerId, "Row identifier assigned by the trade ledger.");
define_numeric_id!(
    BrokerOrderId,
    "Order identifier assigned by the broker on submission."
);

impl BrokerOrderId {
    /// Parse a broker order id from a string-encoded integer.
    ///
    /// Surrounding whitespace and JSON string quotes are tolerated, since the
    /// broker API answers with either `123` or `"123"`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim().trim_matches('"').trim();
        trimmed.parse::<i64>().ok().map(Self)
    }
}

/// Identifier of a position: `{strategy}-{symbol}`.
///
/// One position exists per key, and at most one order may be in flight per key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionKey(String);

impl PositionKey {
    /// Build the key for a strategy/symbol pair.
    #[must_use]
    pub fn new(strategy_name: &str, symbol: &str) -> Self {
        Self(format!("{strategy_name}-{symbol}"))
    }

    /// Wrap an already-formatted key (e.g. read back from a snapshot).
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Get the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PositionKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_key_joins_strategy_and_symbol() {
        let key = PositionKey::new("S1", "ES");
        assert_eq!(key.as_str(), "S1-ES");
        assert_eq!(key.to_string(), "S1-ES");
    }

    #[test]
    fn position_key_serializes_as_plain_string() {
        let key = PositionKey::new("mean_revert", "NQ");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"mean_revert-NQ\"");
    }

    #[test]
    fn broker_order_id_parses_raw_and_quoted() {
        assert_eq!(BrokerOrderId::parse("42"), Some(BrokerOrderId::new(42)));
        assert_eq!(BrokerOrderId::parse("\"42\"\n"), Some(BrokerOrderId::new(42)));
        assert_eq!(BrokerOrderId::parse(" 7 "), Some(BrokerOrderId::new(7)));
        assert_eq!(BrokerOrderId::parse("abc"), None);
        assert_eq!(BrokerOrderId::parse(""), None);
    }

    #[test]
    fn ids_are_ordered_by_value() {
        assert!(LedgerId::new(1) < LedgerId::new(2));
        assert!(BrokerOrderId::new(10) > BrokerOrderId::new(9));
    }
}
