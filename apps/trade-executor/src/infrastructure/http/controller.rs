//! HTTP Controller (Driver Adapter)
//!
//! Axum routes for the `SendTrade` intake and the read-only query API.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection, rejection::QueryRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use crate::application::dto::SendTradeDto;
use crate::application::ports::LedgerPort;
use crate::application::use_cases::AcceptTradeUseCase;
use crate::domain::shared::PositionKey;
use crate::error::ApiError;
use crate::infrastructure::persistence::{OutstandingOrderIndex, PositionStore};

use super::request::TradesParams;
use super::response::{
    HealthResponse, OutstandingOrdersResponse, PositionResponse, PositionsResponse,
    SendTradeResponse, TradesResponse,
};

/// Application state shared across handlers.
pub struct AppState<L>
where
    L: LedgerPort,
{
    /// Use case behind `SendTrade`.
    pub accept_trade: Arc<AcceptTradeUseCase<L>>,
    /// Ledger for trade history queries.
    pub ledger: Arc<L>,
    /// Current positions.
    pub positions: Arc<PositionStore>,
    /// Orders awaiting resolution.
    pub outstanding: Arc<OutstandingOrderIndex>,
    /// Application version.
    pub version: String,
}

impl<L> Clone for AppState<L>
where
    L: LedgerPort,
{
    fn clone(&self) -> Self {
        Self {
            accept_trade: Arc::clone(&self.accept_trade),
            ledger: Arc::clone(&self.ledger),
            positions: Arc::clone(&self.positions),
            outstanding: Arc::clone(&self.outstanding),
            version: self.version.clone(),
        }
    }
}

/// Create the HTTP router with all endpoints.
pub fn create_router<L>(state: AppState<L>) -> Router
where
    L: LedgerPort + 'static,
{
    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/send-trade", post(send_trade))
        .route("/api/v1/positions", get(list_positions))
        .route("/api/v1/positions/{key}", get(get_position))
        .route("/api/v1/orders/outstanding", get(list_outstanding))
        .route("/api/v1/trades", get(list_trades))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check<L>(State(state): State<AppState<L>>) -> impl IntoResponse
where
    L: LedgerPort,
{
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        positions: state.positions.len(),
        outstanding_orders: state.outstanding.len(),
    })
}

/// `SendTrade`: validate, record, enqueue, acknowledge.
async fn send_trade<L>(
    State(state): State<AppState<L>>,
    payload: Result<Json<SendTradeDto>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
    L: LedgerPort,
{
    let Json(dto) = payload.map_err(|rejection| {
        tracing::warn!(error = %rejection.body_text(), "Rejected malformed SendTrade body");
        ApiError::invalid_request(rejection.body_text())
    })?;

    let ack = state.accept_trade.execute(dto).await?;

    Ok((
        StatusCode::OK,
        Json(SendTradeResponse {
            status: ack.status.to_string(),
        }),
    ))
}

/// All positions.
async fn list_positions<L>(State(state): State<AppState<L>>) -> impl IntoResponse
where
    L: LedgerPort,
{
    let positions = state.positions.all();
    Json(PositionsResponse {
        count: positions.len(),
        positions,
    })
}

/// One position by key (`{strategy}-{symbol}`).
async fn get_position<L>(
    State(state): State<AppState<L>>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    L: LedgerPort,
{
    let key = PositionKey::from_raw(key);
    state
        .positions
        .load(&key)
        .map(|position| Json(PositionResponse { key: key.clone(), position }))
        .ok_or_else(|| ApiError::not_found("position", key.as_str()))
}

/// Orders awaiting a terminal report, oldest first.
async fn list_outstanding<L>(State(state): State<AppState<L>>) -> impl IntoResponse
where
    L: LedgerPort,
{
    let orders: Vec<_> = state
        .outstanding
        .snapshot()
        .into_iter()
        .map(Into::into)
        .collect();
    Json(OutstandingOrdersResponse {
        count: orders.len(),
        orders,
    })
}

/// Ledger history, newest first.
async fn list_trades<L>(
    State(state): State<AppState<L>>,
    params: Result<Query<TradesParams>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError>
where
    L: LedgerPort,
{
    let Query(params) =
        params.map_err(|rejection| ApiError::invalid_request(rejection.body_text()))?;
    let query = params.into_query()?;

    let trades = state.ledger.query(&query).await.map_err(|e| {
        tracing::error!(error = %e, "Trade history query failed");
        ApiError::from(e)
    })?;

    Ok(Json(TradesResponse {
        count: trades.len(),
        trades,
    }))
}
