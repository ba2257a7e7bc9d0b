//! Run failure taxonomy.

use std::path::PathBuf;
use std::time::Duration;

use pokebench_core::{ConfigError, SUGGESTED_VISION_MODELS};
use thiserror::Error;

use crate::command::Step;

/// Why a benchmark run stopped. Every variant aborts the run before the
/// leaderboard is touched.
#[derive(Error, Debug)]
pub enum RunError {
    /// Bad benchmark, model, image mode or asset folder; nothing was spawned
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The resolved command line has no executable
    #[error("{step} command is empty")]
    EmptyCommand { step: Step },

    /// The process could not be started
    #[error("failed to spawn {step} process `{program}`: {source}")]
    Spawn {
        step: Step,
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Waiting on the process failed
    #[error("{step} process I/O failed: {source}")]
    Io {
        step: Step,
        #[source]
        source: std::io::Error,
    },

    /// The process outlived its time limit and was killed
    #[error("{step} timed out after {}s", .limit.as_secs())]
    Timeout { step: Step, limit: Duration },

    /// Non-zero exit; `stderr` holds what the process printed there
    #[error("{} failed: {}", .step.failure_label(), .stderr.trim_end())]
    ProcessFailed {
        step: Step,
        exit_code: i32,
        stderr: String,
    },

    /// The prediction file is missing, unreadable or has no entries
    #[error("No predictions were produced (entries=0). Skipping score.")]
    NoPredictions,

    /// Entries exist but none carries a probability map
    #[error("Predictions contain no probabilities for any image. Skipping score.")]
    NoUsableProbabilities { entries: usize },

    /// The score report could not be read or decoded
    #[error("Unreadable score report {}: {reason}", .path.display())]
    ScoreReport { path: PathBuf, reason: String },
}

impl RunError {
    /// Actionable follow-up for failures caused by the choice of model.
    pub fn hint(&self) -> Option<String> {
        match self {
            RunError::NoPredictions => Some(
                "Hint: the provider may require an extra key or a different model id. \
                 Try e.g. \"openai/gpt-4o-mini\" or \"google/gemini-2.0-flash-001\"."
                    .to_string(),
            ),
            RunError::NoUsableProbabilities { .. } => Some(format!(
                "Hint: this often means the model is text-only or ignored the image input. \
                 Try a vision model like {}.",
                quoted_list(SUGGESTED_VISION_MODELS)
            )),
            _ => None,
        }
    }

    /// True for errors raised before any process was spawned.
    pub fn is_config(&self) -> bool {
        matches!(self, RunError::Config(_))
    }
}

/// `"a", "b" or "c"`
fn quoted_list(items: &[&str]) -> String {
    let quoted: Vec<String> = items.iter().map(|m| format!("\"{m}\"")).collect();
    match quoted.split_last() {
        Some((last, rest)) if !rest.is_empty() => format!("{} or {}", rest.join(", "), last),
        Some((last, _)) => last.clone(),
        None => String::new(),
    }
}
