//! Configuration error taxonomy.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised before any external process is spawned.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Benchmark slug is not one of gen1..gen9
    #[error("Invalid benchmark '{0}'. Expected one of: gen1..gen9")]
    InvalidBenchmark(String),

    /// Model identifier was empty or absent
    #[error("Missing --model")]
    MissingModel,

    /// Image mode is neither `url` nor `base64`
    #[error("Invalid image mode '{0}'. Expected url or base64")]
    InvalidImageMode(String),

    /// Benchmark asset folder does not exist
    #[error("Benchmark folder not found: {}", .0.display())]
    BenchmarkFolderMissing(PathBuf),

    /// An environment or flag value could not be parsed
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}
