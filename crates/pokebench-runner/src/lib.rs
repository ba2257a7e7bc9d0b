//! PokeBench Runner: benchmark process orchestration
//!
//! ## Layer 1 - Orchestration
//!
//! Drives the external prediction and scoring processes for a
//! `(benchmark, model)` pair and records the result in a
//! [`pokebench_store::ResultsStore`].
//!
//! ## Key Components
//!
//! - [`RunInvoker`]: process seam; [`ProcessInvoker`] spawns real children
//! - [`RunValidator`]: rejects empty or probability-free predictions
//! - [`SingleRunOrchestrator`]: run, validate, score, upsert
//! - [`BatchRunOrchestrator`]: concurrent roster runs plus score reconciliation
//! - [`fakes`]: scripted invoker and collecting sink for tests

pub mod batch;
pub mod command;
pub mod error;
pub mod fakes;
pub mod invoker;
pub mod score;
pub mod single;
pub mod sink;
pub mod validator;

pub use batch::{reconcile_scores, BatchRequest, BatchResult, BatchRunOrchestrator, ModelOutcome};
pub use command::{PredictionRequest, ProcessSpec, ScoringRequest, Step};
pub use error::RunError;
pub use invoker::{ExitResult, ProcessInvoker, RunInvoker};
pub use score::ScoreReport;
pub use single::{RunOutcome, RunPlan, RunRequest, ScoredRun, SingleRunOrchestrator};
pub use sink::{ConsoleSink, NullSink, OutputSink, PrefixedSink, Stream};
pub use validator::{PredictionStats, RunValidator};
