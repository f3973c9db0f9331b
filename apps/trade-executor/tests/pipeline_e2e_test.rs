//! Pipeline Integration Tests
//!
//! Drive instructions through the whole pipeline: HTTP intake, ledger,
//! intake queue, execution workers, broker, reconciliation and recovery.
//! The broker is the in-process simulated broker and the ledger is the
//! in-memory ledger.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use tower::ServiceExt;
use trade_executor::application::ports::{LedgerPort, Quote, TradeQuery};
use trade_executor::application::services::{IntakeSender, WorkerPool, intake_queue};
use trade_executor::application::use_cases::{
    ACK_STATUS, AcceptTradeUseCase, ExecuteTradeUseCase, ReconcileFillsUseCase,
    RecoverStateUseCase,
};
use trade_executor::domain::shared::PositionKey;
use trade_executor::domain::trading::{LedgerStatus, PositionStatus};
use trade_executor::infrastructure::broker::SimulatedBroker;
use trade_executor::infrastructure::http::{AppState, create_router};
use trade_executor::infrastructure::persistence::{
    InMemoryLedger, OutstandingOrderIndex, PositionStore,
};

/// Load a `SendTrade` body from the fixtures directory.
fn load_fixture(name: &str) -> Value {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/fixtures");
    path.push(name);

    let content = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read fixture {}: {e}", path.display()));
    serde_json::from_str(&content)
        .unwrap_or_else(|e| panic!("Failed to parse fixture {}: {e}", path.display()))
}

struct Pipeline {
    router: Router,
    queue: IntakeSender,
    workers: WorkerPool,
    broker: Arc<SimulatedBroker>,
    ledger: Arc<InMemoryLedger>,
    positions: Arc<PositionStore>,
    outstanding: Arc<OutstandingOrderIndex>,
    reconcile: ReconcileFillsUseCase<SimulatedBroker, InMemoryLedger>,
}

impl Pipeline {
    fn start(snapshot: &Path, ledger: Arc<InMemoryLedger>) -> Self {
        let broker = Arc::new(SimulatedBroker::new(dec!(100)));
        broker.set_quote(Quote {
            bid: Some(dec!(4500.00)),
            ask: Some(dec!(4500.25)),
            last: Some(dec!(4500.25)),
        });
        let positions = Arc::new(PositionStore::with_snapshot_path(snapshot));
        let outstanding = Arc::new(OutstandingOrderIndex::new());

        let (queue, receiver) = intake_queue(16);
        let execute = Arc::new(ExecuteTradeUseCase::new(
            Arc::clone(&broker),
            Arc::clone(&ledger),
            Arc::clone(&positions),
            Arc::clone(&outstanding),
        ));
        let workers = WorkerPool::spawn(4, receiver, execute);

        let router = create_router(AppState {
            accept_trade: Arc::new(AcceptTradeUseCase::new(Arc::clone(&ledger), queue.clone())),
            ledger: Arc::clone(&ledger),
            positions: Arc::clone(&positions),
            outstanding: Arc::clone(&outstanding),
            version: "test".to_string(),
        });

        let reconcile = ReconcileFillsUseCase::new(
            Arc::clone(&broker),
            Arc::clone(&ledger),
            Arc::clone(&positions),
            Arc::clone(&outstanding),
        );

        Self {
            router,
            queue,
            workers,
            broker,
            ledger,
            positions,
            outstanding,
            reconcile,
        }
    }

    async fn send_trade(&self, body: &Value) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/send-trade")
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_vec(body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn get_json(&self, uri: &str) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn wait_for_outstanding(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.outstanding.len() < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("workers did not submit in time");
    }

    async fn shutdown(self) {
        self.queue.close();
        assert!(self.workers.join(Duration::from_secs(5)).await);
    }
}

#[tokio::test]
async fn limit_buy_flows_from_intake_to_fill() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = dir.path().join("positions.json");
    let pipeline = Pipeline::start(&snapshot, Arc::new(InMemoryLedger::new()));
    let key = PositionKey::new("S1", "ES");

    // Intake: acknowledged, ledger row Pending.
    let (status, body) = pipeline
        .send_trade(&load_fixture("send_trade_es_limit_buy.json"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], ACK_STATUS);

    // Worker: quoted at the ask, submitted, position Pending and flat.
    pipeline.wait_for_outstanding(1).await;
    let rows = pipeline.ledger.query(&TradeQuery::default()).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, LedgerStatus::Submitted);
    assert_eq!(rows[0].price, Some(dec!(4500.25)));
    let position = pipeline.positions.load(&key).unwrap();
    assert_eq!(position.status, PositionStatus::Pending);
    assert_eq!(position.quantity, Decimal::ZERO);

    // Reconciliation: filled at 4500.25 for 1.
    let result = pipeline.reconcile.execute().await;
    assert_eq!(result.fills_applied, 1);

    let position = pipeline.positions.load(&key).unwrap();
    assert_eq!(position.quantity, dec!(1));
    assert_eq!(position.cost_basis, dec!(4500.25));
    assert_eq!(position.status, PositionStatus::Filled);
    assert!(pipeline.outstanding.is_empty());

    let rows = pipeline.ledger.query(&TradeQuery::default()).await.unwrap();
    assert_eq!(rows[0].status, LedgerStatus::Filled);
    assert_eq!(rows[0].price, Some(dec!(4500.25)));

    // Snapshot reflects the fill.
    let restored = PositionStore::new();
    restored.load_from_file(&snapshot).unwrap();
    assert_eq!(restored.load(&key), Some(position));

    pipeline.shutdown().await;
}

#[tokio::test]
async fn market_sell_opens_short_at_broker_price() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::start(
        &dir.path().join("positions.json"),
        Arc::new(InMemoryLedger::new()),
    );

    let (status, _) = pipeline
        .send_trade(&load_fixture("send_trade_nq_market_sell.json"))
        .await;
    assert_eq!(status, StatusCode::OK);
    pipeline.wait_for_outstanding(1).await;

    let order = &pipeline.outstanding.snapshot()[0];
    assert_eq!(order.order.price, None);

    pipeline.reconcile.execute().await;

    let position = pipeline.positions.load(&PositionKey::new("S1", "NQ")).unwrap();
    assert_eq!(position.quantity, dec!(-2));
    assert_eq!(position.cost_basis, dec!(4500.25));

    pipeline.shutdown().await;
}

#[tokio::test]
async fn duplicate_instruction_is_not_submitted_while_pending() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::start(
        &dir.path().join("positions.json"),
        Arc::new(InMemoryLedger::new()),
    );
    let body = load_fixture("send_trade_es_limit_buy.json");

    pipeline.send_trade(&body).await;
    pipeline.wait_for_outstanding(1).await;
    pipeline.send_trade(&body).await;
    pipeline.send_trade(&body).await;

    pipeline.queue.close();
    let Pipeline {
        workers,
        broker,
        ledger,
        outstanding,
        ..
    } = pipeline;
    assert!(workers.join(Duration::from_secs(5)).await);

    assert_eq!(broker.submitted_count(), 1);
    assert_eq!(outstanding.len(), 1);
    let pending = ledger
        .query(&TradeQuery {
            statuses: vec![LedgerStatus::Pending],
            ..TradeQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(pending.len(), 2);
}

#[tokio::test]
async fn second_trade_submits_after_fill() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::start(
        &dir.path().join("positions.json"),
        Arc::new(InMemoryLedger::new()),
    );
    let mut body = load_fixture("send_trade_es_limit_buy.json");

    pipeline.send_trade(&body).await;
    pipeline.wait_for_outstanding(1).await;
    pipeline.reconcile.execute().await;

    body["side"] = Value::from("SELL");
    pipeline.send_trade(&body).await;
    pipeline.wait_for_outstanding(1).await;
    pipeline.reconcile.execute().await;

    let position = pipeline.positions.load(&PositionKey::new("S1", "ES")).unwrap();
    assert_eq!(position.quantity, Decimal::ZERO);
    assert_eq!(position.status, PositionStatus::Closed);
    assert_eq!(position.cost_basis, dec!(4500.00));
    assert_eq!(pipeline.broker.submitted_count(), 2);

    pipeline.shutdown().await;
}

#[tokio::test]
async fn restart_restores_outstanding_order_from_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = dir.path().join("positions.json");
    let ledger = Arc::new(InMemoryLedger::new());

    let first = Pipeline::start(&snapshot, Arc::clone(&ledger));
    first
        .send_trade(&load_fixture("send_trade_es_limit_buy.json"))
        .await;
    first.wait_for_outstanding(1).await;
    let order_id = first.outstanding.snapshot()[0].broker_order_id;
    first.shutdown().await;

    // Fresh process state over the same snapshot and ledger.
    let positions = Arc::new(PositionStore::with_snapshot_path(&snapshot));
    let outstanding = Arc::new(OutstandingOrderIndex::new());
    let recovery = RecoverStateUseCase::new(
        Arc::clone(&ledger),
        Arc::clone(&positions),
        Arc::clone(&outstanding),
    )
    .execute()
    .await
    .unwrap();

    assert_eq!(recovery.positions_loaded, 1);
    assert_eq!(recovery.orders_restored, 1);
    assert_eq!(recovery.positions_settled, 0);
    assert!(outstanding.find_by_order_id(order_id).is_some());
    assert!(positions.load(&PositionKey::new("S1", "ES")).unwrap().is_pending());
}

#[tokio::test]
async fn invalid_quantity_is_rejected_without_side_effects() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::start(
        &dir.path().join("positions.json"),
        Arc::new(InMemoryLedger::new()),
    );
    let mut body = load_fixture("send_trade_es_limit_buy.json");
    body["quantity"] = Value::from("one");

    let (status, error) = pipeline.send_trade(&body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "INVALID_QUANTITY");
    assert!(pipeline.ledger.is_empty());
    assert!(pipeline.positions.is_empty());

    pipeline.shutdown().await;
}

#[tokio::test]
async fn query_endpoints_follow_the_order_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::start(
        &dir.path().join("positions.json"),
        Arc::new(InMemoryLedger::new()),
    );

    pipeline
        .send_trade(&load_fixture("send_trade_es_limit_buy.json"))
        .await;
    pipeline.wait_for_outstanding(1).await;

    let (status, orders) = pipeline.get_json("/api/v1/orders/outstanding").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(orders["count"], 1);

    let (_, position) = pipeline.get_json("/api/v1/positions/S1-ES").await;
    assert_eq!(position["status"], "Pending");

    pipeline.reconcile.execute().await;

    let (_, orders) = pipeline.get_json("/api/v1/orders/outstanding").await;
    assert_eq!(orders["count"], 0);

    let (_, positions) = pipeline.get_json("/api/v1/positions").await;
    assert_eq!(positions["count"], 1);
    assert_eq!(positions["positions"]["S1-ES"]["status"], "Filled");

    let (status, trades) = pipeline.get_json("/api/v1/trades?status=Filled&symbol=ES").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(trades["count"], 1);
    assert_eq!(trades["trades"][0]["status"], "Filled");

    let (status, _) = pipeline.get_json("/api/v1/positions/S1-NQ").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, health) = pipeline.get_json("/health").await;
    assert_eq!(health["positions"], 1);
    assert_eq!(health["outstanding_orders"], 0);

    pipeline.shutdown().await;
}
