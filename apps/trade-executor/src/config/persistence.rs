//! Position snapshot configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Position snapshot file, rewritten after every position change.
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
        }
    }
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("./data/positions.json")
}

pub(crate) const fn default_true() -> bool {
    true
}
