//! Bounded FIFO between the intake endpoint and the execution workers.

use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};

use crate::domain::trading::QueuedInstruction;

/// The queue no longer accepts instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("intake queue is closed")]
pub struct QueueClosed;

/// Create a queue holding at most `capacity` instructions.
#[must_use]
pub fn intake_queue(capacity: usize) -> (IntakeSender, IntakeReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        IntakeSender {
            tx: Arc::new(RwLock::new(Some(tx))),
        },
        IntakeReceiver {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

/// Producer half. Clones share one underlying sender, so [`IntakeSender::close`]
/// closes the queue for every clone.
#[derive(Debug, Clone)]
pub struct IntakeSender {
    tx: Arc<RwLock<Option<mpsc::Sender<QueuedInstruction>>>>,
}

impl IntakeSender {
    /// Enqueue, waiting while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`QueueClosed`] once the queue has been closed.
    pub async fn send(&self, item: QueuedInstruction) -> Result<(), QueueClosed> {
        let tx = self.tx.read().clone().ok_or(QueueClosed)?;
        tx.send(item).await.map_err(|_| QueueClosed)
    }

    /// Stop accepting instructions. Buffered ones are still delivered.
    pub fn close(&self) {
        self.tx.write().take();
    }

    /// Check if the queue has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.read().is_none()
    }

    /// Number of buffered instructions.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.tx
            .read()
            .as_ref()
            .map_or(0, |tx| tx.max_capacity() - tx.capacity())
    }
}

/// Consumer half, shared by every worker.
#[derive(Debug, Clone)]
pub struct IntakeReceiver {
    rx: Arc<Mutex<mpsc::Receiver<QueuedInstruction>>>,
}

impl IntakeReceiver {
    /// Next instruction in FIFO order; `None` once closed and drained.
    pub async fn recv(&self) -> Option<QueuedInstruction> {
        self.rx.lock().await.recv().await
    }
}
