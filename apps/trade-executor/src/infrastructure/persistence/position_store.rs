//! Position store with JSON snapshot persistence.
//!
//! The store is the synchronization boundary for positions: callers never
//! hold a reference into the map, they load copies and store whole records.
//! Deduplication goes through [`PositionStore::claim`], which serializes
//! processing per key and makes "check not pending, then mark pending"
//! atomic.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tokio::sync::OwnedMutexGuard;

use crate::domain::shared::PositionKey;
use crate::domain::trading::{Position, TradeInstruction};

/// Errors from snapshot reads and writes.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// File system error.
    #[error("Snapshot I/O error on '{path}': {source}")]
    Io {
        /// File involved.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Snapshot content could not be encoded or decoded.
    #[error("Snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SnapshotError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Why a claim was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimError {
    /// An order for this key is already outstanding.
    #[error("position {0} already has an order outstanding")]
    AlreadyPending(PositionKey),
}

#[derive(Debug, Default)]
struct StoreInner {
    positions: HashMap<PositionKey, Position>,
}

/// Concurrent position store.
#[derive(Debug, Default)]
pub struct PositionStore {
    inner: RwLock<StoreInner>,
    key_locks: Mutex<HashMap<PositionKey, Arc<tokio::sync::Mutex<()>>>>,
    snapshot_path: Option<PathBuf>,
    snapshot_lock: tokio::sync::Mutex<()>,
}

impl PositionStore {
    /// Create an empty store without a snapshot file.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store that persists to `path`.
    #[must_use]
    pub fn with_snapshot_path(path: impl Into<PathBuf>) -> Self {
        Self {
            snapshot_path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Configured snapshot file, if any.
    #[must_use]
    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    /// Copy of the position for `key`.
    #[must_use]
    pub fn load(&self, key: &PositionKey) -> Option<Position> {
        self.inner.read().positions.get(key).cloned()
    }

    /// Insert or replace the position for `key`.
    pub fn store(&self, key: PositionKey, position: Position) {
        self.inner.write().positions.insert(key, position);
    }

    /// Atomically read-modify-write an existing position.
    ///
    /// Returns `None` if there is no position for `key`.
    pub fn update<R>(&self, key: &PositionKey, f: impl FnOnce(&mut Position) -> R) -> Option<R> {
        self.inner.write().positions.get_mut(key).map(f)
    }

    /// Number of positions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().positions.len()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().positions.is_empty()
    }

    /// Ordered copy of every position.
    #[must_use]
    pub fn all(&self) -> BTreeMap<PositionKey, Position> {
        self.inner
            .read()
            .positions
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Keys whose position is `Pending`.
    #[must_use]
    pub fn pending_keys(&self) -> Vec<PositionKey> {
        let mut keys: Vec<PositionKey> = self
            .inner
            .read()
            .positions
            .iter()
            .filter(|(_, p)| p.is_pending())
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Claim exclusive processing of `key`.
    ///
    /// Waits while another claim for the key is live, in FIFO order, then
    /// fails if the position is `Pending`. The claim does not change the
    /// stored position; [`PositionClaim::commit`] marks it `Pending`, and
    /// dropping the claim uncommitted hands the key to the next waiter.
    pub async fn claim(&self, key: &PositionKey) -> Result<PositionClaim<'_>, ClaimError> {
        let key_lock = Arc::clone(self.key_locks.lock().entry(key.clone()).or_default());
        let guard = key_lock.lock_owned().await;

        if self.inner.read().positions.get(key).is_some_and(Position::is_pending) {
            return Err(ClaimError::AlreadyPending(key.clone()));
        }

        Ok(PositionClaim {
            store: self,
            key: key.clone(),
            _guard: guard,
        })
    }

    /// Serialize the store to a JSON object keyed by position key.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        let positions = self.all();
        Ok(serde_json::to_string_pretty(&positions)?)
    }

    /// Replace the store's contents with a JSON snapshot.
    ///
    /// Returns the number of positions loaded.
    pub fn restore_json(&self, json: &str) -> Result<usize, SnapshotError> {
        let positions: HashMap<PositionKey, Position> = if json.trim().is_empty() {
            HashMap::new()
        } else {
            serde_json::from_str(json)?
        };
        let count = positions.len();

        let mut inner = self.inner.write();
        inner.positions = positions;
        Ok(count)
    }

    /// Write a full snapshot to `path` (temp file + rename).
    ///
    /// Returns the number of positions written.
    pub fn snapshot_to_file(&self, path: &Path) -> Result<usize, SnapshotError> {
        let positions = self.all();
        let json = serde_json::to_string_pretty(&positions)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| SnapshotError::io(parent, e))?;
        }
        let tmp = temp_path(path);
        std::fs::write(&tmp, json).map_err(|e| SnapshotError::io(&tmp, e))?;
        std::fs::rename(&tmp, path).map_err(|e| SnapshotError::io(path, e))?;

        Ok(positions.len())
    }

    /// Replace the store's contents with the snapshot at `path`.
    ///
    /// A missing file yields an empty store.
    pub fn load_from_file(&self, path: &Path) -> Result<usize, SnapshotError> {
        match std::fs::read_to_string(path) {
            Ok(json) => self.restore_json(&json),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.inner.write().positions.clear();
                Ok(0)
            }
            Err(e) => Err(SnapshotError::io(path, e)),
        }
    }

    /// Persist to the configured snapshot path.
    ///
    /// Writes are serialized, and the state is captured after the write lock
    /// is taken, so a slower writer can never replace a newer snapshot with
    /// an older one. No-op without a configured path.
    pub async fn persist(&self) -> Result<usize, SnapshotError> {
        let Some(path) = self.snapshot_path.as_deref() else {
            return Ok(0);
        };

        let _guard = self.snapshot_lock.lock().await;

        let positions = self.all();
        let json = serde_json::to_string_pretty(&positions)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SnapshotError::io(parent, e))?;
        }
        let tmp = temp_path(path);
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| SnapshotError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| SnapshotError::io(path, e))?;

        tracing::debug!(
            path = %path.display(),
            positions = positions.len(),
            "Position snapshot written"
        );
        Ok(positions.len())
    }

    /// Persist, logging instead of failing.
    ///
    /// On failure the in-memory store stays authoritative until the next
    /// successful write.
    pub async fn persist_or_log(&self) {
        if let Err(e) = self.persist().await {
            tracing::error!(error = %e, "Failed to write position snapshot");
        }
    }

    fn commit_pending(
        &self,
        key: &PositionKey,
        instruction: &TradeInstruction,
        at: DateTime<Utc>,
    ) -> Position {
        let mut inner = self.inner.write();
        let position = inner
            .positions
            .entry(key.clone())
            .and_modify(|p| p.mark_pending(at))
            .or_insert_with(|| Position::pending_for(instruction, at));
        position.clone()
    }
}

/// Exclusive right to submit an order for one position key.
///
/// Released on drop, committed or not.
#[derive(Debug)]
pub struct PositionClaim<'a> {
    store: &'a PositionStore,
    key: PositionKey,
    _guard: OwnedMutexGuard<()>,
}

impl PositionClaim<'_> {
    /// Claimed key.
    #[must_use]
    pub const fn key(&self) -> &PositionKey {
        &self.key
    }

    /// Mark the position `Pending` (creating it flat if absent) and release the claim.
    pub fn commit(self, instruction: &TradeInstruction, at: DateTime<Utc>) -> Position {
        self.store.commit_pending(&self.key, instruction, at)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
