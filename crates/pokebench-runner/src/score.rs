//! The score report written by the scoring process.

use std::path::Path;

use pokebench_store::{deserialize_usage, ScoreMetrics, Usage};
use serde::{Deserialize, Serialize};

use crate::error::RunError;

/// `{task?, metrics, usage?, duration_ms?}`. Missing metric keys read as 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,

    #[serde(default)]
    pub metrics: ScoreMetrics,

    #[serde(
        default,
        deserialize_with = "deserialize_usage",
        skip_serializing_if = "Option::is_none"
    )]
    pub usage: Option<Usage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl ScoreReport {
    /// Decode a report document.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Read and decode the report at `path`.
    pub fn read(path: &Path) -> Result<Self, RunError> {
        let raw = std::fs::read_to_string(path).map_err(|e| RunError::ScoreReport {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_json(&raw).map_err(|e| RunError::ScoreReport {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Async variant of [`ScoreReport::read`].
    pub async fn load(path: &Path) -> Result<Self, RunError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| RunError::ScoreReport {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        Self::from_json(&raw).map_err(|e| RunError::ScoreReport {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Prompt tokens, 0 without usage.
    pub fn prompt_tokens(&self) -> u64 {
        self.usage.as_ref().map_or(0, |u| u.prompt_tokens)
    }

    /// Completion tokens, 0 without usage.
    pub fn completion_tokens(&self) -> u64 {
        self.usage.as_ref().map_or(0, |u| u.completion_tokens)
    }
}
