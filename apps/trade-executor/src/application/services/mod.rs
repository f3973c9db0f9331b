//! Long-running application services.
//!
//! - `intake_queue`: bounded FIFO between intake and the workers
//! - `WorkerPool`: execution workers draining the queue
//! - `ReconciliationLoop`: periodic fill reconciliation

mod intake_queue;
mod reconciliation_loop;
mod worker_pool;

pub use intake_queue::{IntakeReceiver, IntakeSender, QueueClosed, intake_queue};
pub use reconciliation_loop::ReconciliationLoop;
pub use worker_pool::WorkerPool;
