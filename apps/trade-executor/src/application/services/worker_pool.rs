//! Execution worker pool.
//!
//! N tasks share one intake receiver; each dequeued instruction is handled
//! by exactly one worker.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use super::intake_queue::IntakeReceiver;
use crate::application::ports::{BrokerPort, LedgerPort};
use crate::application::use_cases::{ExecuteTradeUseCase, ExecutionOutcome};

/// Handles of the running execution workers.
#[derive(Debug)]
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `workers` tasks (at least one) draining `receiver`.
    ///
    /// Workers exit once the queue is closed and empty.
    pub fn spawn<B, L>(
        workers: usize,
        receiver: IntakeReceiver,
        use_case: Arc<ExecuteTradeUseCase<B, L>>,
    ) -> Self
    where
        B: BrokerPort + 'static,
        L: LedgerPort + 'static,
    {
        let handles = (0..workers.max(1))
            .map(|worker_id| {
                let receiver = receiver.clone();
                let use_case = Arc::clone(&use_case);
                tokio::spawn(async move {
                    run_worker(worker_id, receiver, use_case).await;
                })
            })
            .collect();

        Self { handles }
    }

    /// Number of workers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Check if the pool has no workers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every worker to finish, up to `timeout`.
    ///
    /// Returns `false` if the deadline passed first; the remaining workers
    /// are aborted.
    pub async fn join(self, timeout: Duration) -> bool {
        let aborts: Vec<_> = self.handles.iter().map(JoinHandle::abort_handle).collect();

        let drained = tokio::time::timeout(timeout, async {
            for handle in self.handles {
                if let Err(e) = handle.await {
                    tracing::error!(error = %e, "Execution worker terminated abnormally");
                }
            }
        })
        .await
        .is_ok();

        if !drained {
            tracing::warn!(
                timeout_secs = timeout.as_secs(),
                "Execution workers did not drain in time"
            );
            for abort in aborts {
                abort.abort();
            }
        }
        drained
    }
}

async fn run_worker<B, L>(
    worker_id: usize,
    receiver: IntakeReceiver,
    use_case: Arc<ExecuteTradeUseCase<B, L>>,
) where
    B: BrokerPort,
    L: LedgerPort,
{
    tracing::debug!(worker_id, "Execution worker started");

    while let Some(queued) = receiver.recv().await {
        let position_key = queued.instruction.position_key();
        match use_case.execute(queued).await {
            ExecutionOutcome::Submitted { broker_order_id, .. } => {
                tracing::debug!(
                    worker_id,
                    position_key = %position_key,
                    broker_order_id = %broker_order_id,
                    "Instruction submitted"
                );
            }
            ExecutionOutcome::Skipped(_) | ExecutionOutcome::Dropped { .. } => {
                tracing::debug!(
                    worker_id,
                    position_key = %position_key,
                    "Instruction not submitted"
                );
            }
        }
    }

    tracing::debug!(worker_id, "Execution worker stopped");
}
