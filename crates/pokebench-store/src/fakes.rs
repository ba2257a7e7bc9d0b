//! In-memory store for tests.
//!
//! Shares the upsert logic with [`crate::JsonFileStore`], so contract tests
//! written against one hold for the other.

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::merge::{apply_upsert, typed_rows, UpsertOutcome};
use crate::record::{ResultRecord, ScoreUpsert};
use crate::store::ResultsStore;

/// Rows held in a `Mutex<Vec<Value>>`.
#[derive(Debug, Default)]
pub struct MemoryResultsStore {
    rows: Mutex<Vec<Value>>,
    upserts: Mutex<Vec<ScoreUpsert>>,
    fail_writes: bool,
}

impl MemoryResultsStore {
    /// Empty store that accepts every write.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every upsert fails with a lock timeout.
    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    /// Every upsert request received, in call order (including failed ones).
    pub fn upserts(&self) -> Vec<ScoreUpsert> {
        self.upserts.lock().unwrap().clone()
    }

    /// Number of rows held.
    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    /// Whether no row is held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultsStore for MemoryResultsStore {
    fn upsert(&self, req: &ScoreUpsert) -> StoreResult<UpsertOutcome> {
        self.upserts.lock().unwrap().push(req.clone());
        if self.fail_writes {
            return Err(StoreError::LockTimeout {
                path: self.location(),
                waited: Duration::ZERO,
            });
        }
        let mut rows = self.rows.lock().unwrap();
        Ok(apply_upsert(&mut rows, req))
    }

    fn read_all(&self) -> StoreResult<Vec<ResultRecord>> {
        Ok(typed_rows(&self.rows.lock().unwrap()))
    }

    fn location(&self) -> PathBuf {
        PathBuf::from("memory://leaderboard")
    }
}
