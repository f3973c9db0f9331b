//! PostgreSQL trade ledger.
//!
//! One `trades` row per instruction. Row ids come from `BIGSERIAL`; broker
//! order ids are unique per trading date once assigned.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::{debug, info, warn};

use crate::application::ports::{LedgerError, LedgerPort, LedgerRecord, TradeQuery};
use crate::config::LedgerConfig;
use crate::domain::shared::{BrokerOrderId, LedgerId};
use crate::domain::trading::{LedgerStatus, TradeInstruction};

const SCHEMA: [&str; 3] = [
    r"
    CREATE TABLE IF NOT EXISTS trades (
        id BIGSERIAL PRIMARY KEY,
        strategy_name TEXT NOT NULL,
        contract_id BIGINT NOT NULL,
        exchange TEXT NOT NULL,
        symbol TEXT NOT NULL,
        side TEXT NOT NULL,
        quantity NUMERIC NOT NULL,
        order_type TEXT NOT NULL,
        broker TEXT NOT NULL,
        price NUMERIC NULL,
        broker_order_id BIGINT NOT NULL DEFAULT 0,
        trading_date DATE NOT NULL,
        status TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        last_updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    ",
    r"
    CREATE UNIQUE INDEX IF NOT EXISTS trades_broker_order_id_trading_date_key
        ON trades (broker_order_id, trading_date)
        WHERE broker_order_id > 0
    ",
    r"CREATE INDEX IF NOT EXISTS trades_created_at_idx ON trades (created_at DESC)",
];

const SELECT_COLUMNS: &str = "SELECT id, strategy_name, contract_id, exchange, symbol, side, \
     quantity, order_type, broker, price, broker_order_id, trading_date, status, \
     created_at, last_updated_at FROM trades WHERE TRUE";

fn query_error(err: sqlx::Error) -> LedgerError {
    LedgerError::Query(err.to_string())
}

/// Ledger backed by a `PostgreSQL` pool.
#[derive(Debug, Clone)]
pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    /// Connect, retrying `connect_attempts` times, and create the schema if configured.
    ///
    /// # Errors
    ///
    /// Returns an error if no connection could be established or the schema
    /// could not be created.
    pub async fn connect(config: &LedgerConfig) -> Result<Self, LedgerError> {
        let attempts = config.connect_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match PgPoolOptions::new()
                .max_connections(config.max_connections)
                .connect(&config.database_url)
                .await
            {
                Ok(pool) => {
                    info!(
                        max_connections = config.max_connections,
                        attempt, "PostgreSQL connection pool initialized"
                    );
                    let ledger = Self { pool };
                    if config.run_migrations {
                        ledger.migrate().await?;
                    }
                    return Ok(ledger);
                }
                Err(e) => {
                    warn!(attempt, max_attempts = attempts, error = %e, "Ledger connection failed");
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(config.connect_retry_delay()).await;
                    }
                }
            }
        }

        Err(LedgerError::Connection(
            last_error.map_or_else(|| "no connection attempt made".to_string(), |e| e.to_string()),
        ))
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the `trades` table and its indexes if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if any DDL statement fails.
    pub async fn migrate(&self) -> Result<(), LedgerError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(query_error)?;
        }
        info!("Ledger schema ready");
        Ok(())
    }

    fn row_to_record(row: &PgRow) -> Result<LedgerRecord, LedgerError> {
        let field = |name: &str, e: sqlx::Error| LedgerError::Integrity(format!("{name}: {e}"));
        let parsed = |name: &str, e: crate::domain::trading::ParseValueError| {
            LedgerError::Integrity(format!("{name}: {e}"))
        };

        let side: String = row.try_get("side").map_err(|e| field("side", e))?;
        let order_type: String = row.try_get("order_type").map_err(|e| field("order_type", e))?;
        let status: String = row.try_get("status").map_err(|e| field("status", e))?;
        let broker_order_id: i64 = row
            .try_get("broker_order_id")
            .map_err(|e| field("broker_order_id", e))?;

        Ok(LedgerRecord {
            id: LedgerId::new(row.try_get("id").map_err(|e| field("id", e))?),
            strategy_name: row
                .try_get("strategy_name")
                .map_err(|e| field("strategy_name", e))?,
            contract_id: row.try_get("contract_id").map_err(|e| field("contract_id", e))?,
            exchange: row.try_get("exchange").map_err(|e| field("exchange", e))?,
            symbol: row.try_get("symbol").map_err(|e| field("symbol", e))?,
            side: side.parse().map_err(|e| parsed("side", e))?,
            quantity: row.try_get("quantity").map_err(|e| field("quantity", e))?,
            order_type: order_type.parse().map_err(|e| parsed("order_type", e))?,
            broker: row.try_get("broker").map_err(|e| field("broker", e))?,
            price: row
                .try_get::<Option<Decimal>, _>("price")
                .map_err(|e| field("price", e))?,
            broker_order_id: (broker_order_id > 0).then(|| BrokerOrderId::new(broker_order_id)),
            trading_date: row
                .try_get::<NaiveDate, _>("trading_date")
                .map_err(|e| field("trading_date", e))?,
            status: status.parse().map_err(|e| parsed("status", e))?,
            created_at: row
                .try_get::<DateTime<Utc>, _>("created_at")
                .map_err(|e| field("created_at", e))?,
            last_updated_at: row
                .try_get::<DateTime<Utc>, _>("last_updated_at")
                .map_err(|e| field("last_updated_at", e))?,
        })
    }
}

/// Build the SELECT for a [`TradeQuery`].
pub(crate) fn build_select(query: &TradeQuery) -> QueryBuilder<'_, Postgres> {
    let mut qb = QueryBuilder::new(SELECT_COLUMNS);

    if !query.statuses.is_empty() {
        let statuses: Vec<String> = query.statuses.iter().map(|s| s.as_str().to_string()).collect();
        qb.push(" AND status = ANY(").push_bind(statuses).push(")");
    }
    if let Some(symbol) = &query.symbol {
        qb.push(" AND symbol = ").push_bind(symbol);
    }
    if let Some(strategy) = &query.strategy_name {
        qb.push(" AND strategy_name = ").push_bind(strategy);
    }
    if let Some(from) = query.from {
        qb.push(" AND trading_date >= ").push_bind(from);
    }
    if let Some(to) = query.to {
        qb.push(" AND trading_date <= ").push_bind(to);
    }

    qb.push(" ORDER BY created_at DESC, id DESC");

    if let Some(limit) = query.limit {
        qb.push(" LIMIT ").push_bind(i64::from(limit));
    }
    qb
}

#[async_trait]
impl LedgerPort for PostgresLedger {
    async fn insert_instruction(
        &self,
        instruction: &TradeInstruction,
    ) -> Result<LedgerId, LedgerError> {
        let now = Utc::now();
        let row = sqlx::query(
            r"
            INSERT INTO trades (
                strategy_name, contract_id, exchange, symbol, side, quantity,
                order_type, broker, price, broker_order_id, trading_date, status,
                created_at, last_updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 0, $10, $11, $12, $12)
            RETURNING id
            ",
        )
        .bind(&instruction.strategy_name)
        .bind(instruction.contract_id)
        .bind(&instruction.exchange)
        .bind(&instruction.symbol)
        .bind(instruction.side.as_str())
        .bind(instruction.quantity)
        .bind(instruction.order_type.as_str())
        .bind(&instruction.broker)
        .bind(instruction.limit_price)
        .bind(now.date_naive())
        .bind(LedgerStatus::Pending.as_str())
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(query_error)?;

        let id: i64 = row
            .try_get("id")
            .map_err(|e| LedgerError::Integrity(format!("id: {e}")))?;
        debug!(ledger_id = id, strategy = %instruction.strategy_name, "Ledger row inserted");
        Ok(LedgerId::new(id))
    }

    async fn mark_submitted(
        &self,
        ledger_id: LedgerId,
        order_id: BrokerOrderId,
        price: Option<Decimal>,
    ) -> Result<(), LedgerError> {
        let result = sqlx::query(
            r"
            UPDATE trades
            SET status = $1, broker_order_id = $2, price = $3, last_updated_at = NOW()
            WHERE id = $4
            ",
        )
        .bind(LedgerStatus::Submitted.as_str())
        .bind(order_id.value())
        .bind(price)
        .bind(ledger_id.value())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation()) {
                LedgerError::Duplicate(order_id)
            } else {
                query_error(e)
            }
        })?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::NotFound(format!("ledger id {ledger_id}")));
        }
        Ok(())
    }

    async fn mark_status(
        &self,
        order_id: BrokerOrderId,
        status: LedgerStatus,
        fill_price: Option<Decimal>,
    ) -> Result<(), LedgerError> {
        let price = if status == LedgerStatus::Filled {
            fill_price
        } else {
            None
        };

        let result = sqlx::query(
            r"
            UPDATE trades
            SET status = $1, price = COALESCE($2, price), last_updated_at = NOW()
            WHERE id = (
                SELECT id FROM trades
                WHERE broker_order_id = $3
                ORDER BY trading_date DESC, id DESC
                LIMIT 1
            )
            ",
        )
        .bind(status.as_str())
        .bind(price)
        .bind(order_id.value())
        .execute(&self.pool)
        .await
        .map_err(query_error)?;

        if result.rows_affected() == 0 {
            warn!(broker_order_id = %order_id, status = %status, "No ledger row for broker order id");
            return Err(LedgerError::NotFound(format!("broker order id {order_id}")));
        }
        Ok(())
    }

    async fn query(&self, query: &TradeQuery) -> Result<Vec<LedgerRecord>, LedgerError> {
        let mut qb = build_select(query);
        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(query_error)?;

        rows.iter().map(Self::row_to_record).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unfiltered_query_orders_newest_first() {
        let query = TradeQuery::default();
        let qb = build_select(&query);
        assert!(qb.sql().ends_with("WHERE TRUE ORDER BY created_at DESC, id DESC"));
    }

    #[test]
    fn pending_query_binds_status_set() {
        let query = TradeQuery::pending();
        let qb = build_select(&query);
        assert!(qb.sql().contains(" AND status = ANY($1)"));
    }

    #[test]
    fn filters_bind_in_order() {
        let from = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        let mut query = TradeQuery::by_strategy_between("S1", from, to);
        query.symbol = Some("ES".to_string());
        query.limit = Some(50);

        let qb = build_select(&query);
        let sql = qb.sql();

        assert!(sql.contains(" AND symbol = $1"));
        assert!(sql.contains(" AND strategy_name = $2"));
        assert!(sql.contains(" AND trading_date >= $3"));
        assert!(sql.contains(" AND trading_date <= $4"));
        assert!(sql.ends_with(" LIMIT $5"));
    }

    #[test]
    fn schema_declares_partial_unique_index() {
        assert!(SCHEMA[1].contains("WHERE broker_order_id > 0"));
        assert!(SCHEMA[0].contains("broker_order_id BIGINT NOT NULL DEFAULT 0"));
    }
}
