//! PokeBench Store: the shared leaderboard file
//!
//! ## Layer 0 - Persistence
//!
//! One JSON array of [`ResultRecord`] rows, keyed by `(benchmark, model)`.
//! Several benchmark runs, possibly in separate processes, write to it
//! concurrently; the [`JsonFileStore`] lock discipline keeps each
//! read-modify-write atomic.
//!
//! ## Key Components
//!
//! - [`ResultsStore`]: upsert / read-all seam
//! - [`JsonFileStore`]: locked, atomically replaced JSON file
//! - [`fakes::MemoryResultsStore`]: in-memory implementation for tests
//! - [`compute_model_averages`]: per-model ranking across benchmarks

mod error;
pub mod fakes;
mod json_file;
mod merge;
mod record;
mod store;
mod summary;

pub use error::{StoreError, StoreResult};
pub use json_file::JsonFileStore;
pub use merge::{apply_upsert, UpsertOutcome};
pub use record::{
    deserialize_usage, round4, ResultRecord, ScoreMetrics, ScoreUpsert, Usage, TASK, TEAM,
};
pub use store::{upsert_best_effort, ResultsStore};
pub use summary::{compute_model_averages, records_for_benchmark, ModelAverage};
