//! One benchmark across a roster of models, all at once.
//!
//! Legacy benchmarks run the full single-run pipeline per model, each run
//! upserting its own row. Every other benchmark only predicts and scores per
//! model; rows are written afterwards by [`reconcile_scores`] for the models
//! whose pipeline succeeded.

use std::sync::Arc;

use futures::future::join_all;
use pokebench_core::{
    default_roster, model_slug, obs, Benchmark, BenchmarkAssets, ConfigError, ImageMode, RunSpan,
};
use pokebench_store::{upsert_best_effort, ResultsStore, ScoreUpsert};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::RunError;
use crate::score::ScoreReport;
use crate::single::{RunRequest, SingleRunOrchestrator};
use crate::sink::{OutputSink, PrefixedSink};

/// What to run in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    pub bench: String,
    /// Models in run and reconciliation order.
    pub models: Vec<String>,
    pub image_mode: ImageMode,
    pub tolerant: bool,
}

impl BatchRequest {
    /// Batch over the default roster.
    pub fn new(bench: impl Into<String>) -> Self {
        Self {
            bench: bench.into(),
            models: default_roster(),
            image_mode: ImageMode::default(),
            tolerant: false,
        }
    }

    /// Replace the roster; an empty list keeps the default one.
    pub fn with_models(mut self, models: Vec<String>) -> Self {
        if !models.is_empty() {
            self.models = models;
        }
        self
    }

    /// Image mode for every model in the batch.
    pub fn with_image_mode(mut self, image_mode: ImageMode) -> Self {
        self.image_mode = image_mode;
        self
    }

    /// Pass `--tolerant` to every prediction process.
    pub fn tolerant(mut self, tolerant: bool) -> Self {
        self.tolerant = tolerant;
        self
    }
}

/// How one model's pipeline ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelOutcome {
    pub model: String,
    /// Failure message; `None` on success.
    pub error: Option<String>,
    pub hint: Option<String>,
    /// Summary line of a legacy run that recorded its own row.
    pub summary: Option<String>,
}

impl ModelOutcome {
    /// Whether the model's pipeline succeeded.
    pub fn passed(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of a complete batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub bench: Benchmark,
    /// One entry per roster model, in roster order.
    pub outcomes: Vec<ModelOutcome>,
    /// Rows written by reconciliation; always 0 for legacy benchmarks.
    pub reconciled: usize,
    /// Whether every pipeline succeeded.
    pub success: bool,
}

impl BatchResult {
    /// Models whose pipeline succeeded.
    pub fn passed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed()).count()
    }

    /// Models whose pipeline failed.
    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.passed()).count()
    }
}

/// Fans a benchmark out over a model roster.
///
/// Pipelines are independent tasks: no ordering, no cross-model
/// cancellation, no overall timeout. A failed pipeline marks the batch
/// failed but never stops its siblings or the reconciliation.
#[derive(Clone)]
pub struct BatchRunOrchestrator {
    single: SingleRunOrchestrator,
}

impl BatchRunOrchestrator {
    /// Batch runs reuse `single` for every model.
    pub fn new(single: SingleRunOrchestrator) -> Self {
        Self { single }
    }

    /// Run every model, then reconcile the successful ones (non-legacy only).
    ///
    /// Configuration errors are returned before anything is spawned; per-model
    /// failures land in [`BatchResult::outcomes`].
    pub async fn run(
        &self,
        req: &BatchRequest,
        sink: Arc<dyn OutputSink>,
    ) -> Result<BatchResult, RunError> {
        let bench: Benchmark = req.bench.parse()?;
        let assets = bench.assets(&self.single.config().benchmarks_dir);
        assets.ensure_exists()?;
        if req.models.iter().all(|m| m.trim().is_empty()) {
            return Err(ConfigError::MissingModel.into());
        }

        sink.status(&format!("Starting parallel benchmark run for {bench}"));
        sink.status(&format!("Description: {}", bench.description()));
        sink.status(&format!("Models: {}", req.models.len()));
        sink.status(&format!("Image mode: {}", req.image_mode));
        sink.status(&format!(
            "Tolerant mode: {}",
            if req.tolerant { "ON" } else { "OFF" }
        ));

        let legacy = bench.is_legacy();
        let handles: Vec<_> = req
            .models
            .iter()
            .map(|model| {
                let single = self.single.clone();
                let run_req = RunRequest::new(bench.slug(), model.clone())
                    .with_image_mode(req.image_mode)
                    .tolerant(req.tolerant);
                let model_sink = PrefixedSink::new(&model_slug(model), Arc::clone(&sink));
                tokio::spawn(async move {
                    if legacy {
                        single
                            .run(&run_req, &model_sink)
                            .await
                            .map(|outcome| Some(outcome.summary_line()))
                    } else {
                        single.run_deferred(&run_req, &model_sink).await.map(|_| None)
                    }
                })
            })
            .collect();

        let joined = join_all(handles).await;

        let outcomes: Vec<ModelOutcome> = req
            .models
            .iter()
            .zip(joined)
            .map(|(model, joined)| match joined {
                Ok(Ok(summary)) => ModelOutcome {
                    model: model.clone(),
                    error: None,
                    hint: None,
                    summary,
                },
                Ok(Err(e)) => ModelOutcome {
                    model: model.clone(),
                    hint: e.hint(),
                    error: Some(e.to_string()),
                    summary: None,
                },
                Err(e) => {
                    warn!(model = %model, error = %e, "benchmark task aborted");
                    ModelOutcome {
                        model: model.clone(),
                        error: Some(format!("task aborted: {e}")),
                        hint: None,
                        summary: None,
                    }
                }
            })
            .collect();

        let reconciled = if legacy {
            0
        } else {
            let store = self.single.store();
            let models: Vec<String> = outcomes
                .iter()
                .filter(|o| o.passed())
                .map(|o| o.model.clone())
                .collect();
            match tokio::task::spawn_blocking(move || {
                reconcile_scores(store.as_ref(), bench, &assets, &models)
            })
            .await
            {
                Ok(n) => n,
                Err(e) => {
                    warn!(error = %e, "reconciliation task failed");
                    0
                }
            }
        };

        let result = BatchResult {
            bench,
            success: outcomes.iter().all(ModelOutcome::passed),
            outcomes,
            reconciled,
        };
        obs::emit_batch_finished(
            &bench.slug(),
            result.outcomes.len(),
            result.failed_count(),
            result.reconciled,
        );
        Ok(result)
    }
}

/// Upsert the score file of each of `models` that exists and parses.
///
/// Callers pass only models whose pipeline succeeded, so a score file left
/// behind by an earlier run never reaches the leaderboard.
///
/// Missing or unreadable reports are skipped. The row's duration is the
/// report's `duration_ms`, or 0. Returns the number of rows written.
pub fn reconcile_scores(
    store: &dyn ResultsStore,
    bench: Benchmark,
    assets: &BenchmarkAssets,
    models: &[String],
) -> usize {
    let item_count = assets.item_count();
    let mut written = 0;

    for model in models {
        let path = assets.scores_for(&model_slug(model));
        if !path.is_file() {
            debug!(model = %model, "no score file; skipping");
            continue;
        }
        let _span = RunSpan::enter(&Uuid::new_v4().to_string(), &bench.slug(), model);
        let report = match ScoreReport::read(&path) {
            Ok(report) => report,
            Err(e) => {
                debug!(error = %e, "skipping unreadable score report");
                continue;
            }
        };
        let upsert = ScoreUpsert::new(
            bench.slug(),
            item_count,
            model.clone(),
            report.metrics,
            report.duration_ms.unwrap_or(0),
            report.usage,
        );
        if upsert_best_effort(store, &upsert).is_some() {
            written += 1;
        }
    }

    info!(bench = %bench, reconciled = written, "score files reconciled");
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use pokebench_store::fakes::MemoryResultsStore;

    fn assets_with_scores(files: &[(&str, &str)]) -> (tempfile::TempDir, BenchmarkAssets) {
        let dir = tempfile::tempdir().unwrap();
        let assets = BenchmarkAssets::new(dir.path().join("gen6"));
        std::fs::create_dir_all(&assets.dir).unwrap();
        std::fs::write(&assets.labels, "a\nb\nc\n").unwrap();
        for (model, body) in files {
            std::fs::write(assets.scores_for(&model_slug(model)), body).unwrap();
        }
        (dir, assets)
    }

    #[test]
    fn test_batch_request_roster_override() {
        let req = BatchRequest::new("gen3");
        assert_eq!(req.models.len(), 21);

        let req = req.with_models(vec!["a/b".to_string()]);
        assert_eq!(req.models, vec!["a/b"]);

        let req = BatchRequest::new("gen3").with_models(Vec::new());
        assert_eq!(req.models.len(), 21);
    }

    #[test]
    fn test_reconcile_skips_missing_and_corrupt() {
        let (_dir, assets) = assets_with_scores(&[
            (
                "good/model",
                r#"{"metrics": {"top1": 0.6, "top5": 0.9, "macro_f1": 0.5}, "duration_ms": 700}"#,
            ),
            ("broken/model", "{ nope"),
        ]);
        let store = MemoryResultsStore::new();
        let bench: Benchmark = "gen6".parse().unwrap();
        let models = vec![
            "good/model".to_string(),
            "broken/model".to_string(),
            "absent/model".to_string(),
        ];

        let written = reconcile_scores(&store, bench, &assets, &models);
        assert_eq!(written, 1);

        let rows = store.read_all().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].model, "good/model");
        assert_eq!(rows[0].benchmark, "PokeBench v1 (Gen6 3)");
        assert_eq!(rows[0].duration_ms, 700);
    }

    #[test]
    fn test_reconcile_without_duration_records_zero() {
        let (_dir, assets) = assets_with_scores(&[("a/b", r#"{"metrics": {"top1": 0.1}}"#)]);
        let store = MemoryResultsStore::new();
        reconcile_scores(&store, "gen6".parse().unwrap(), &assets, &["a/b".to_string()]);
        assert_eq!(store.read_all().unwrap()[0].duration_ms, 0);
    }

    #[test]
    fn test_reconcile_counts_only_stored_rows() {
        let (_dir, assets) = assets_with_scores(&[("a/b", r#"{"metrics": {}}"#)]);
        let store = MemoryResultsStore::failing();
        let written =
            reconcile_scores(&store, "gen6".parse().unwrap(), &assets, &["a/b".to_string()]);
        assert_eq!(written, 0);
        assert_eq!(store.upserts().len(), 1);
    }
}
