//! HTTP request DTOs.

use std::str::FromStr;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::application::ports::TradeQuery;
use crate::domain::trading::LedgerStatus;
use crate::error::ApiError;

/// Query string of `GET /api/v1/trades`.
///
/// Every filter is optional. `status` takes a comma-separated list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradesParams {
    /// Statuses to include, e.g. `Pending,Submitted`.
    pub status: Option<String>,
    /// Exact symbol.
    pub symbol: Option<String>,
    /// Exact strategy name.
    pub strategy: Option<String>,
    /// First trading date, inclusive.
    pub from: Option<NaiveDate>,
    /// Last trading date, inclusive.
    pub to: Option<NaiveDate>,
    /// Maximum rows.
    pub limit: Option<u32>,
    /// Restrict both bounds to the current UTC date.
    #[serde(default)]
    pub today: bool,
}

impl TradesParams {
    /// Convert to a ledger query.
    pub fn into_query(self) -> Result<TradeQuery, ApiError> {
        let statuses = match self.status.as_deref() {
            None => Vec::new(),
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    LedgerStatus::from_str(s)
                        .map_err(|e| ApiError::invalid_request(e.to_string()).with_context("status", s))
                })
                .collect::<Result<_, _>>()?,
        };

        let (from, to) = if self.today {
            let today = Utc::now().date_naive();
            (Some(today), Some(today))
        } else {
            (self.from, self.to)
        };

        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(ApiError::invalid_request(format!(
                    "from ({from}) is after to ({to})"
                )));
            }
        }

        Ok(TradeQuery {
            statuses,
            symbol: self.symbol.filter(|s| !s.is_empty()),
            strategy_name: self.strategy.filter(|s| !s.is_empty()),
            from,
            to,
            limit: self.limit,
        })
    }
}
