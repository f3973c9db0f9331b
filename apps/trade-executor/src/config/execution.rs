//! Intake queue and worker pool sizing.

use serde::{Deserialize, Serialize};

/// Execution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Number of execution workers.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Intake queue capacity; `SendTrade` blocks when full.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

const fn default_workers() -> usize {
    5
}

const fn default_queue_capacity() -> usize {
    100
}
