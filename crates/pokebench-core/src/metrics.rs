//! Process-wide run counters.
//!
//! Incremented at the call site; [`Metrics::flush`] emits them as one
//! `info!` record at the end of a command.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    runs_started: AtomicU64,
    runs_succeeded: AtomicU64,
    runs_failed: AtomicU64,
    processes_spawned: AtomicU64,
    records_upserted: AtomicU64,
    store_write_failures: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// All counters at zero.
    pub const fn new() -> Self {
        Self {
            runs_started: AtomicU64::new(0),
            runs_succeeded: AtomicU64::new(0),
            runs_failed: AtomicU64::new(0),
            processes_spawned: AtomicU64::new(0),
            records_upserted: AtomicU64::new(0),
            store_write_failures: AtomicU64::new(0),
        }
    }

    /// A planned run began.
    pub fn inc_runs_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
    }

    /// A run got through every stage.
    pub fn inc_runs_succeeded(&self) {
        self.runs_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    /// A run stopped with an error.
    pub fn inc_runs_failed(&self) {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// A prediction or scoring child was started.
    pub fn inc_processes_spawned(&self) {
        self.processes_spawned.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "processes_spawned", "counter incremented");
    }

    /// A leaderboard row was written.
    pub fn inc_records_upserted(&self) {
        self.records_upserted.fetch_add(1, Ordering::Relaxed);
    }

    /// Leaderboard writes that were dropped (lock or I/O failure).
    pub fn inc_store_write_failures(&self) {
        self.store_write_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "store_write_failures", "counter incremented");
    }

    /// Emit every counter as one `info!` record.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            runs_started = self.runs_started(),
            runs_succeeded = self.runs_succeeded(),
            runs_failed = self.runs_failed(),
            processes_spawned = self.processes_spawned(),
            records_upserted = self.records_upserted(),
            store_write_failures = self.store_write_failures(),
        );
    }

    /// Read the runs-started count.
    pub fn runs_started(&self) -> u64 {
        self.runs_started.load(Ordering::Relaxed)
    }

    /// Read the runs-succeeded count.
    pub fn runs_succeeded(&self) -> u64 {
        self.runs_succeeded.load(Ordering::Relaxed)
    }

    /// Read the runs-failed count.
    pub fn runs_failed(&self) -> u64 {
        self.runs_failed.load(Ordering::Relaxed)
    }

    /// Read the processes-spawned count.
    pub fn processes_spawned(&self) -> u64 {
        self.processes_spawned.load(Ordering::Relaxed)
    }

    /// Read the records-upserted count.
    pub fn records_upserted(&self) -> u64 {
        self.records_upserted.load(Ordering::Relaxed)
    }

    /// Read the dropped-write count.
    pub fn store_write_failures(&self) -> u64 {
        self.store_write_failures.load(Ordering::Relaxed)
    }
}
