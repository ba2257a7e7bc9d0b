//! The `ResultsStore` seam and its best-effort wrapper.

use pokebench_core::{obs, METRICS};

use crate::error::StoreResult;
use crate::merge::UpsertOutcome;
use crate::record::{ResultRecord, ScoreUpsert};

/// Keyed leaderboard storage: at most one row per `(benchmark, model)`.
///
/// Implementations re-read their backing state on every call; nothing is
/// cached between calls.
pub trait ResultsStore: Send + Sync {
    /// Insert or update the row for `req`'s key. Blocks while another writer
    /// holds the store.
    fn upsert(&self, req: &ScoreUpsert) -> StoreResult<UpsertOutcome>;

    /// All rows in stored order.
    fn read_all(&self) -> StoreResult<Vec<ResultRecord>>;

    /// Human-readable location, used in log records.
    fn location(&self) -> std::path::PathBuf;
}

/// Upsert without failing the caller.
///
/// A store error is logged as `store.write_failed`, counted, and turned into
/// `None`; the caller's control flow continues as if the write happened.
pub fn upsert_best_effort(store: &dyn ResultsStore, req: &ScoreUpsert) -> Option<UpsertOutcome> {
    match store.upsert(req) {
        Ok(outcome) => {
            METRICS.inc_records_upserted();
            obs::emit_store_upserted(&outcome.benchmark, &outcome.model, outcome.inserted);
            Some(outcome)
        }
        Err(e) => {
            METRICS.inc_store_write_failures();
            obs::emit_store_write_failed(&store.location(), &req.model, &e);
            None
        }
    }
}
