//! Structured lifecycle events for benchmark runs and leaderboard writes.
//!
//! Every function emits one record with a stable `event` field so log
//! pipelines can filter on it, e.g. `event=run.finished`.

use tracing::{info, warn};

/// Span tagged with the run id, benchmark and model.
///
/// Concurrent batch runs interleave their log lines; the span fields keep
/// them attributable. Attach it to futures with `tracing::Instrument`.
pub fn run_span(run_id: &str, bench: &str, model: &str) -> tracing::Span {
    tracing::info_span!(
        "pokebench.run",
        run_id = %run_id,
        bench = %bench,
        model = %model
    )
}

/// RAII guard entering [`run_span`] for synchronous code.
///
/// Not `Send`: never hold one across an `.await`.
pub struct RunSpan {
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    /// Create and enter the span until the guard drops.
    pub fn enter(run_id: &str, bench: &str, model: &str) -> Self {
        Self {
            _span: run_span(run_id, bench, model).entered(),
        }
    }
}

/// A run passed planning and is about to spawn its first process.
pub fn emit_run_started(run_id: &str, bench: &str, model: &str) {
    info!(event = "run.started", run_id = %run_id, bench = %bench, model = %model);
}

/// A run completed; `duration_ms` covers the whole pipeline.
pub fn emit_run_finished(run_id: &str, bench: &str, model: &str, duration_ms: u64) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        bench = %bench,
        model = %model,
        duration_ms = duration_ms,
    );
}

/// A run stopped at `error`.
pub fn emit_run_failed(run_id: &str, bench: &str, model: &str, error: &dyn std::fmt::Display) {
    warn!(event = "run.failed", run_id = %run_id, bench = %bench, model = %model, error = %error);
}

/// A leaderboard row was written; `inserted` is false for in-place updates.
pub fn emit_store_upserted(benchmark: &str, model: &str, inserted: bool) {
    info!(event = "store.upserted", benchmark = %benchmark, model = %model, inserted = inserted);
}

/// A leaderboard write was dropped. The run itself still counts as done.
pub fn emit_store_write_failed(path: &std::path::Path, model: &str, error: &dyn std::fmt::Display) {
    warn!(
        event = "store.write_failed",
        path = %path.display(),
        model = %model,
        error = %error,
    );
}

/// Totals of a completed batch.
pub fn emit_batch_finished(bench: &str, total: usize, failed: usize, reconciled: usize) {
    info!(
        event = "batch.finished",
        bench = %bench,
        total = total,
        failed = failed,
        reconciled = reconciled,
    );
}
