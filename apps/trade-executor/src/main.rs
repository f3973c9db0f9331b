//! Trade Executor Binary
//!
//! Starts the intake endpoint, the execution workers and the reconciliation
//! loop.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin trade-executor
//! ```
//!
//! # Environment Variables
//!
//! - `TRADE_EXECUTOR_CONFIG`: config file path (default: config.yaml)
//! - `RUST_LOG`: extra log directives
//! - anything referenced as `${VAR}` in the config file

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use trade_executor::application::ports::{BrokerPort, LedgerPort};
use trade_executor::application::services::{ReconciliationLoop, WorkerPool, intake_queue};
use trade_executor::application::use_cases::{
    AcceptTradeUseCase, ExecuteTradeUseCase, ReconcileFillsUseCase, RecoverStateUseCase,
};
use trade_executor::config::{BrokerMode, Config, LedgerBackend, LoggingConfig, load_config};
use trade_executor::infrastructure::broker::{HttpBrokerAdapter, SimulatedBroker};
use trade_executor::infrastructure::http::{AppState, create_router};
use trade_executor::infrastructure::persistence::{
    InMemoryLedger, OutstandingOrderIndex, PositionStore, PostgresLedger,
};
use trade_executor::observability::{MetricsConfig, init_metrics};

/// Graceful shutdown timeout for draining the workers.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    let config = load_config(None).context("failed to load configuration")?;
    init_tracing(&config.observability.logging)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting Trade Executor");
    log_config(&config);

    if config.observability.metrics.enabled {
        let addr: SocketAddr = format!(
            "{}:{}",
            config.server.bind_address, config.observability.metrics.port
        )
        .parse()
        .context("invalid metrics address")?;
        init_metrics(&MetricsConfig::with_addr(addr))?;
        tracing::info!(%addr, "Prometheus exporter listening");
    }

    match (config.broker.mode, config.ledger.backend) {
        (BrokerMode::Http, LedgerBackend::Postgres) => {
            let ledger = create_postgres_ledger(&config).await?;
            run(&config, create_http_broker(&config)?, ledger).await
        }
        (BrokerMode::Http, LedgerBackend::Memory) => {
            let ledger = Arc::new(InMemoryLedger::new());
            run(&config, create_http_broker(&config)?, ledger).await
        }
        (BrokerMode::Simulated, LedgerBackend::Postgres) => {
            let ledger = create_postgres_ledger(&config).await?;
            run(&config, create_simulated_broker(&config), ledger).await
        }
        (BrokerMode::Simulated, LedgerBackend::Memory) => {
            let ledger = Arc::new(InMemoryLedger::new());
            run(&config, create_simulated_broker(&config), ledger).await
        }
    }
}

/// Wire the pipeline and run until a shutdown signal.
async fn run<B, L>(config: &Config, broker: Arc<B>, ledger: Arc<L>) -> anyhow::Result<()>
where
    B: BrokerPort + 'static,
    L: LedgerPort + 'static,
{
    let positions = Arc::new(PositionStore::with_snapshot_path(
        config.persistence.snapshot_path.clone(),
    ));
    let outstanding = Arc::new(OutstandingOrderIndex::new());

    let recovery = RecoverStateUseCase::new(
        Arc::clone(&ledger),
        Arc::clone(&positions),
        Arc::clone(&outstanding),
    )
    .execute()
    .await
    .context("failed to load position snapshot")?;
    tracing::info!(
        positions = recovery.positions_loaded,
        outstanding_orders = recovery.orders_restored,
        settled = recovery.positions_settled,
        errors = recovery.errors.len(),
        "State recovered"
    );

    let (queue_tx, queue_rx) = intake_queue(config.execution.queue_capacity);
    let execute = Arc::new(ExecuteTradeUseCase::new(
        Arc::clone(&broker),
        Arc::clone(&ledger),
        Arc::clone(&positions),
        Arc::clone(&outstanding),
    ));
    let workers = WorkerPool::spawn(config.execution.workers, queue_rx, execute);
    tracing::info!(
        workers = workers.len(),
        capacity = config.execution.queue_capacity,
        "Execution workers started"
    );

    let reconciliation_token = CancellationToken::new();
    let reconciliation_handle = if config.reconciliation.enabled {
        let use_case = Arc::new(ReconcileFillsUseCase::new(
            Arc::clone(&broker),
            Arc::clone(&ledger),
            Arc::clone(&positions),
            Arc::clone(&outstanding),
        ));
        Some(
            ReconciliationLoop::new(use_case, config.reconciliation.interval())
                .spawn(reconciliation_token.clone()),
        )
    } else {
        tracing::warn!("Reconciliation disabled, positions will stay pending");
        None
    };

    let state = AppState {
        accept_trade: Arc::new(AcceptTradeUseCase::new(
            Arc::clone(&ledger),
            queue_tx.clone(),
        )),
        ledger,
        positions: Arc::clone(&positions),
        outstanding,
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let mut http_handle = start_http_server(config, state, shutdown_tx.clone()).await?;

    tracing::info!("Trade executor ready");

    let http_finished = tokio::select! {
        () = shutdown_signal() => false,
        _ = &mut http_handle => {
            tracing::error!("HTTP server stopped unexpectedly");
            true
        }
    };

    tracing::info!(timeout_secs = SHUTDOWN_TIMEOUT.as_secs(), "Graceful shutdown started");

    reconciliation_token.cancel();
    if let Some(handle) = reconciliation_handle {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Reconciliation loop terminated abnormally");
        }
    }

    if !http_finished {
        let _ = shutdown_tx.send(());
        if let Err(e) = http_handle.await {
            tracing::error!(error = %e, "HTTP server task failed");
        }
    }
    tracing::info!("HTTP server stopped");

    positions.persist_or_log().await;

    queue_tx.close();
    if workers.join(SHUTDOWN_TIMEOUT).await {
        tracing::info!("Execution workers drained");
    }

    positions.persist_or_log().await;

    tracing::info!("Trade executor stopped");
    Ok(())
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` is honoured; the configured level applies to this crate.
fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    let directive: tracing_subscriber::filter::Directive =
        format!("trade_executor={}", logging.level)
            .parse()
            .with_context(|| format!("invalid log level '{}'", logging.level))?;
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(directive);

    if logging.is_json() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().pretty().with_env_filter(filter).init();
    }
    Ok(())
}

/// Log the loaded configuration.
fn log_config(config: &Config) {
    tracing::info!(
        http_addr = %config.server.http_addr(),
        broker_mode = ?config.broker.mode,
        broker_url = %config.broker.base_url,
        ledger_backend = ?config.ledger.backend,
        workers = config.execution.workers,
        queue_capacity = config.execution.queue_capacity,
        reconciliation_interval_secs = config.reconciliation.interval_secs,
        snapshot_path = %config.persistence.snapshot_path.display(),
        "Configuration loaded"
    );
}

/// Create the HTTP broker adapter.
fn create_http_broker(config: &Config) -> anyhow::Result<Arc<HttpBrokerAdapter>> {
    let broker = HttpBrokerAdapter::new(&config.broker.http_config())
        .context("failed to build broker HTTP client")?;
    tracing::info!(base_url = %broker.base_url(), "HTTP broker adapter initialized");
    Ok(Arc::new(broker))
}

/// Create the simulated broker.
fn create_simulated_broker(config: &Config) -> Arc<SimulatedBroker> {
    tracing::warn!(
        price = %config.broker.simulated_price,
        "Using simulated broker, no real orders will be sent"
    );
    Arc::new(SimulatedBroker::new(config.broker.simulated_price))
}

/// Connect to the PostgreSQL ledger.
async fn create_postgres_ledger(config: &Config) -> anyhow::Result<Arc<PostgresLedger>> {
    let ledger = PostgresLedger::connect(&config.ledger)
        .await
        .context("failed to connect to the trade ledger")?;
    tracing::info!("PostgreSQL ledger connected");
    Ok(Arc::new(ledger))
}

/// Start the HTTP server with graceful shutdown support.
async fn start_http_server<L>(
    config: &Config,
    state: AppState<L>,
    shutdown_tx: broadcast::Sender<()>,
) -> anyhow::Result<JoinHandle<()>>
where
    L: LedgerPort + 'static,
{
    let app = create_router(state);
    let http_addr: SocketAddr = config
        .server
        .http_addr()
        .parse()
        .context("invalid HTTP bind address")?;

    tracing::info!(%http_addr, "HTTP server starting");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health");
    tracing::info!("  POST /api/v1/send-trade");
    tracing::info!("  GET  /api/v1/positions");
    tracing::info!("  GET  /api/v1/positions/{{key}}");
    tracing::info!("  GET  /api/v1/orders/outstanding");
    tracing::info!("  GET  /api/v1/trades");

    let listener = TcpListener::bind(http_addr)
        .await
        .with_context(|| format!("failed to bind {http_addr}"))?;
    let mut shutdown_rx = shutdown_tx.subscribe();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = shutdown_rx.recv().await;
        tracing::info!("HTTP server shutting down");
    });

    Ok(tokio::spawn(async move {
        if let Err(e) = server.await {
            tracing::error!("HTTP server error: {e}");
        }
    }))
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
