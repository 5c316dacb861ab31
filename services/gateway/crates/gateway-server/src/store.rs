//! Run store port and its in-memory backend.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reclaim_common::{RunRecord, RunUpdate};
use thiserror::Error;
use tokio::sync::RwLock;

/// Status stored when the upstream dispatch did not go through.
pub const DISPATCH_FAILED: &str = "dispatch_failed";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("run store backend error: {0}")]
    Backend(String),

    #[error("stored run {run_id} is unreadable: {message}")]
    Corrupt { run_id: String, message: String },
}

/// Result of [`RunStore::insert_if_absent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A record with this id already exists; it is returned unchanged.
    Exists(RunRecord),
}

/// Persistence for run rows, keyed by run id.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Store `record` unless its id is already present.
    async fn insert_if_absent(&self, record: &RunRecord) -> Result<InsertOutcome, StoreError>;

    async fn get(&self, run_id: &str) -> Result<Option<RunRecord>, StoreError>;

    /// Replace the row for `record.run_id` with `record`, but only while the
    /// stored row is in [`DISPATCH_FAILED`]. Returns whether this caller won
    /// the row; of several concurrent callers exactly one does.
    async fn reclaim_failed(&self, record: &RunRecord) -> Result<bool, StoreError>;

    /// Apply `update` to the stored row as one atomic read-modify-write and
    /// return the result. `None` when no row exists.
    async fn apply_update(
        &self,
        run_id: &str,
        update: &RunUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<RunRecord>, StoreError>;
}

/// Process-local store, used when no Valkey URL is configured.
#[derive(Default)]
pub struct MemoryRunStore {
    runs: RwLock<HashMap<String, RunRecord>>,
}

impl MemoryRunStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn insert_if_absent(&self, record: &RunRecord) -> Result<InsertOutcome, StoreError> {
        let mut runs = self.runs.write().await;
        if let Some(existing) = runs.get(&record.run_id) {
            return Ok(InsertOutcome::Exists(existing.clone()));
        }
        runs.insert(record.run_id.clone(), record.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn get(&self, run_id: &str) -> Result<Option<RunRecord>, StoreError> {
        Ok(self.runs.read().await.get(run_id).cloned())
    }

    async fn reclaim_failed(&self, record: &RunRecord) -> Result<bool, StoreError> {
        let mut runs = self.runs.write().await;
        match runs.get_mut(&record.run_id) {
            Some(existing) if existing.status == DISPATCH_FAILED => {
                *existing = record.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn apply_update(
        &self,
        run_id: &str,
        update: &RunUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<RunRecord>, StoreError> {
        let mut runs = self.runs.write().await;
        Ok(runs.get_mut(run_id).map(|record| {
            record.apply(update, now);
            record.clone()
        }))
    }
}
