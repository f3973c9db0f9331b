//! Periodic reconciliation task.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{BrokerPort, LedgerPort};
use crate::application::use_cases::ReconcileFillsUseCase;

/// Runs [`ReconcileFillsUseCase`] on a fixed interval until cancelled.
pub struct ReconciliationLoop<B, L>
where
    B: BrokerPort,
    L: LedgerPort,
{
    use_case: Arc<ReconcileFillsUseCase<B, L>>,
    interval: Duration,
}

impl<B, L> ReconciliationLoop<B, L>
where
    B: BrokerPort + 'static,
    L: LedgerPort + 'static,
{
    /// Create a loop ticking every `interval`.
    pub const fn new(use_case: Arc<ReconcileFillsUseCase<B, L>>, interval: Duration) -> Self {
        Self { use_case, interval }
    }

    /// Run until `shutdown` is cancelled.
    ///
    /// The first cycle runs one interval after start. A slow cycle delays
    /// the next tick instead of bunching ticks up.
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Starting reconciliation loop");

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await;

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    tracing::info!("Reconciliation loop shutting down");
                    break;
                }
                _ = interval.tick() => {
                    let result = self.use_case.execute().await;
                    tracing::debug!(
                        brokers_polled = result.brokers_polled,
                        reports_seen = result.reports_seen,
                        fills = result.fills_applied,
                        cancels = result.cancels_applied,
                        outstanding = result.still_outstanding,
                        errors = result.errors.len(),
                        "Reconciliation cycle complete"
                    );
                }
            }
        }
    }

    /// Spawn the loop on the runtime.
    pub fn spawn(self, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }
}
