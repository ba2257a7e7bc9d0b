//! PokeBench Core
//!
//! Shared vocabulary for the leaderboard runner: the benchmark registry and
//! asset layout, model slugs and the batch roster, runtime configuration,
//! and the tracing/metrics setup used by every binary.

pub mod benchmark;
pub mod config;
pub mod error;
pub mod metrics;
pub mod model;
pub mod obs;
pub mod telemetry;

pub use benchmark::{canonical_benchmark_name, Benchmark, BenchmarkAssets};
pub use config::PokeBenchConfig;
pub use error::ConfigError;
pub use metrics::METRICS;
pub use model::{default_roster, model_slug, ImageMode, DEFAULT_ROSTER, SUGGESTED_VISION_MODELS};
pub use obs::{run_span, RunSpan};
pub use telemetry::init_tracing;

/// PokeBench version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
