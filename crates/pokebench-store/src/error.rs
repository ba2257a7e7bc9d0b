//! Error types for pokebench-store

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while reading or writing the leaderboard file
#[derive(Error, Debug)]
pub enum StoreError {
    /// Lock file or its directory could not be created/opened
    #[error("Failed to open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Advisory lock could not be taken
    #[error("Failed to lock {}: {source}", .path.display())]
    Lock {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Lock still held by another writer when the timeout elapsed
    #[error("Timed out after {waited:?} waiting for lock on {}", .path.display())]
    LockTimeout { path: PathBuf, waited: Duration },

    /// Reading the leaderboard failed for a reason other than absence
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Writing or replacing the leaderboard failed
    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Rows could not be encoded
    #[error("Failed to encode leaderboard: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;
