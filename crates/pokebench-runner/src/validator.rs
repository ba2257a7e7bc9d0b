//! Degenerate-output checks on a prediction file.

use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::RunError;

/// Shape of a prediction document: how many entries, and how many of them
/// carry a non-empty `probs` map or list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PredictionStats {
    pub entry_count: usize,
    pub non_empty_count: usize,
}

impl PredictionStats {
    /// Stats of a prediction document; anything unparseable counts as empty.
    pub fn from_json(raw: &str) -> Self {
        let doc: Value = match serde_json::from_str(raw) {
            Ok(doc) => doc,
            Err(e) => {
                debug!(error = %e, "prediction file is not valid JSON");
                return Self::default();
            }
        };
        let Some(entries) = doc.get("entries").and_then(Value::as_array) else {
            return Self::default();
        };
        let non_empty_count = entries
            .iter()
            .filter(|entry| {
                match entry.get("probs") {
                    Some(Value::Object(probs)) => !probs.is_empty(),
                    Some(Value::Array(probs)) => !probs.is_empty(),
                    _ => false,
                }
            })
            .count();
        Self {
            entry_count: entries.len(),
            non_empty_count,
        }
    }

    /// Reject runs that produced nothing worth scoring.
    pub fn ensure_usable(&self) -> Result<(), RunError> {
        if self.entry_count == 0 {
            return Err(RunError::NoPredictions);
        }
        if self.non_empty_count == 0 {
            return Err(RunError::NoUsableProbabilities {
                entries: self.entry_count,
            });
        }
        Ok(())
    }
}

/// Reads prediction files.
pub struct RunValidator;

impl RunValidator {
    /// Stats of the prediction file at `path`; a missing file has no entries.
    pub async fn validate(path: &Path) -> PredictionStats {
        match tokio::fs::read_to_string(path).await {
            Ok(raw) => PredictionStats::from_json(&raw),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "prediction file unreadable");
                PredictionStats::default()
            }
        }
    }
}
