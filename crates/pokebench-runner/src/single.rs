//! One model on one benchmark: predict, validate, score, record.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use pokebench_core::{
    model_slug, obs, run_span, Benchmark, BenchmarkAssets, ConfigError, ImageMode,
    PokeBenchConfig, METRICS,
};
use pokebench_store::{upsert_best_effort, ResultRecord, ResultsStore, ScoreUpsert, UpsertOutcome};
use serde::Serialize;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use crate::command::{PredictionRequest, ScoringRequest};
use crate::error::RunError;
use crate::invoker::RunInvoker;
use crate::score::ScoreReport;
use crate::sink::OutputSink;
use crate::validator::{PredictionStats, RunValidator};

/// What to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    /// Benchmark slug as given by the caller; validated before anything runs.
    pub bench: String,
    pub model: String,
    pub image_mode: ImageMode,
    pub tolerant: bool,
}

impl RunRequest {
    /// Base64 images, strict mode.
    pub fn new(bench: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            bench: bench.into(),
            model: model.into(),
            image_mode: ImageMode::default(),
            tolerant: false,
        }
    }

    /// How images reach the provider.
    pub fn with_image_mode(mut self, image_mode: ImageMode) -> Self {
        self.image_mode = image_mode;
        self
    }

    /// Keep going past individual image failures.
    pub fn tolerant(mut self, tolerant: bool) -> Self {
        self.tolerant = tolerant;
        self
    }
}

/// Resolved paths and identity of one run.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub run_id: String,
    pub bench: Benchmark,
    pub model: String,
    pub assets: BenchmarkAssets,
    pub predictions: PathBuf,
    pub scores: PathBuf,
    pub image_mode: ImageMode,
    pub tolerant: bool,
}

impl RunPlan {
    /// Inputs of the prediction process.
    pub fn prediction_request(&self) -> PredictionRequest {
        PredictionRequest {
            model: self.model.clone(),
            images: self.assets.images.clone(),
            labels: self.assets.labels.clone(),
            out: self.predictions.clone(),
            image_mode: self.image_mode,
            tolerant: self.tolerant,
        }
    }

    /// Inputs of the scoring process; `duration_ms` is echoed into the report.
    pub fn scoring_request(&self, duration_ms: u64) -> ScoringRequest {
        ScoringRequest {
            ground_truth: self.assets.ground_truth.clone(),
            predictions: self.predictions.clone(),
            out: self.scores.clone(),
            duration_ms: Some(duration_ms),
        }
    }
}

/// A run that got through scoring; the report is on disk at `scores`.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredRun {
    pub run_id: String,
    pub stats: PredictionStats,
    /// Prediction plus validation time, as handed to the scoring process.
    pub duration_ms: u64,
    pub scores: PathBuf,
}

/// A completed run and the leaderboard row it produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub run_id: String,
    pub stats: PredictionStats,
    pub report: ScoreReport,
    /// Duration recorded on the row: the report's own, else the measured one.
    pub duration_ms: u64,
    pub record: ResultRecord,
    /// `None` when the leaderboard write was dropped.
    pub stored: Option<UpsertOutcome>,
}

impl RunOutcome {
    /// `Done. Top1 85.24% Top5 95.00% F1 81.00% Duration 5150ms Tokens 4000/300`
    pub fn summary_line(&self) -> String {
        let m = &self.report.metrics;
        format!(
            "Done. Top1 {:.2}% Top5 {:.2}% F1 {:.2}% Duration {}ms Tokens {}/{}",
            m.top1 * 100.0,
            m.top5 * 100.0,
            m.macro_f1 * 100.0,
            self.duration_ms,
            self.report.prompt_tokens(),
            self.report.completion_tokens(),
        )
    }
}

/// Runs the full pipeline for one `(benchmark, model)` pair.
///
/// No retries: the first failing stage aborts the run and the leaderboard is
/// left untouched. A failed leaderboard write does not fail the run.
#[derive(Clone)]
pub struct SingleRunOrchestrator {
    config: Arc<PokeBenchConfig>,
    invoker: Arc<dyn RunInvoker>,
    store: Arc<dyn ResultsStore>,
}

impl SingleRunOrchestrator {
    /// Wire an orchestrator from its configuration and seams.
    pub fn new(
        config: Arc<PokeBenchConfig>,
        invoker: Arc<dyn RunInvoker>,
        store: Arc<dyn ResultsStore>,
    ) -> Self {
        Self {
            config,
            invoker,
            store,
        }
    }

    /// Configuration the plans resolve against.
    pub fn config(&self) -> &PokeBenchConfig {
        &self.config
    }

    /// Shared handle to the leaderboard store.
    pub fn store(&self) -> Arc<dyn ResultsStore> {
        Arc::clone(&self.store)
    }

    /// Validate `req` and resolve its paths. Spawns nothing.
    pub fn plan(&self, req: &RunRequest) -> Result<RunPlan, ConfigError> {
        if req.model.trim().is_empty() {
            return Err(ConfigError::MissingModel);
        }
        let bench: Benchmark = req.bench.parse()?;
        let assets = bench.assets(&self.config.benchmarks_dir);
        assets.ensure_exists()?;

        let slug = model_slug(&req.model);
        Ok(RunPlan {
            run_id: Uuid::new_v4().to_string(),
            bench,
            model: req.model.clone(),
            predictions: assets.predictions_for(&slug),
            scores: assets.scores_for(&slug),
            assets,
            image_mode: req.image_mode,
            tolerant: req.tolerant,
        })
    }

    /// Predict, validate, score and upsert the result.
    pub async fn run(
        &self,
        req: &RunRequest,
        sink: &dyn OutputSink,
    ) -> Result<RunOutcome, RunError> {
        let plan = self.plan(req)?;
        let span = run_span(&plan.run_id, &plan.bench.slug(), &plan.model);
        let pipeline = async {
            let scored = self.predict_and_score(&plan, sink).await?;
            self.record(&plan, scored).await
        };
        observe(&plan, pipeline.instrument(span)).await
    }

    /// Predict, validate and score; leave the score file for a later
    /// reconciliation instead of touching the leaderboard.
    pub async fn run_deferred(
        &self,
        req: &RunRequest,
        sink: &dyn OutputSink,
    ) -> Result<ScoredRun, RunError> {
        let plan = self.plan(req)?;
        let span = run_span(&plan.run_id, &plan.bench.slug(), &plan.model);
        observe(&plan, self.predict_and_score(&plan, sink).instrument(span)).await
    }

    async fn predict_and_score(
        &self,
        plan: &RunPlan,
        sink: &dyn OutputSink,
    ) -> Result<ScoredRun, RunError> {
        sink.status(&format!("Running {} on {}...", plan.bench, plan.model));
        remove_stale_scores(&plan.scores).await;
        let started = Instant::now();

        self.invoker
            .run_prediction(&plan.prediction_request(), sink)
            .await?
            .into_result()?;

        let stats = RunValidator::validate(&plan.predictions).await;
        info!(
            entries = stats.entry_count,
            non_empty = stats.non_empty_count,
            "predictions validated"
        );
        stats.ensure_usable()?;
        let duration_ms = started.elapsed().as_millis() as u64;

        sink.status("Scoring...");
        self.invoker
            .run_scoring(&plan.scoring_request(duration_ms), sink)
            .await?
            .into_result()?;

        Ok(ScoredRun {
            run_id: plan.run_id.clone(),
            stats,
            duration_ms,
            scores: plan.scores.clone(),
        })
    }

    async fn record(&self, plan: &RunPlan, scored: ScoredRun) -> Result<RunOutcome, RunError> {
        let report = ScoreReport::load(&scored.scores).await?;
        let duration_ms = report.duration_ms.unwrap_or(scored.duration_ms);

        let upsert = ScoreUpsert::new(
            plan.bench.slug(),
            plan.assets.item_count(),
            plan.model.clone(),
            report.metrics,
            duration_ms,
            report.usage.clone(),
        );
        let record = upsert.to_record();

        let store = Arc::clone(&self.store);
        let stored = match tokio::task::spawn_blocking(move || {
            upsert_best_effort(store.as_ref(), &upsert)
        })
        .await
        {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "leaderboard write task failed");
                METRICS.inc_store_write_failures();
                None
            }
        };

        Ok(RunOutcome {
            run_id: scored.run_id,
            stats: scored.stats,
            report,
            duration_ms,
            record,
            stored,
        })
    }
}

/// Drop a score file left behind by an earlier run of the same pair.
async fn remove_stale_scores(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed stale score file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "could not remove stale score file"),
    }
}

/// Count and log the start and end of a planned run.
async fn observe<T, F>(plan: &RunPlan, run: F) -> Result<T, RunError>
where
    F: Future<Output = Result<T, RunError>>,
{
    let bench = plan.bench.slug();
    METRICS.inc_runs_started();
    obs::emit_run_started(&plan.run_id, &bench, &plan.model);
    let started = Instant::now();

    let result = run.await;
    match &result {
        Ok(_) => {
            METRICS.inc_runs_succeeded();
            obs::emit_run_finished(
                &plan.run_id,
                &bench,
                &plan.model,
                started.elapsed().as_millis() as u64,
            );
        }
        Err(e) => {
            METRICS.inc_runs_failed();
            obs::emit_run_failed(&plan.run_id, &bench, &plan.model, e);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{CollectingSink, ScriptedInvoker};
    use pokebench_store::fakes::MemoryResultsStore;
    use pokebench_store::ScoreMetrics;

    fn fixture() -> (tempfile::TempDir, Arc<PokeBenchConfig>) {
        let dir = tempfile::tempdir().unwrap();
        let config = PokeBenchConfig::with_root(dir.path());
        std::fs::create_dir_all(config.benchmarks_dir.join("gen4")).unwrap();
        (dir, Arc::new(config))
    }

    fn orchestrator(
        config: Arc<PokeBenchConfig>,
        invoker: Arc<ScriptedInvoker>,
    ) -> (SingleRunOrchestrator, Arc<MemoryResultsStore>) {
        let store = Arc::new(MemoryResultsStore::new());
        (
            SingleRunOrchestrator::new(config, invoker, store.clone()),
            store,
        )
    }

    #[test]
    fn test_plan_resolves_model_files() {
        let (_dir, config) = fixture();
        let (orch, _) = orchestrator(config.clone(), Arc::new(ScriptedInvoker::new()));

        let plan = orch
            .plan(&RunRequest::new("gen4", "Google/Gemini-2.0 Flash_001"))
            .unwrap();
        let dir = config.benchmarks_dir.join("gen4");
        assert_eq!(
            plan.predictions,
            dir.join("predictions_google-gemini-2-0-flash-001.json")
        );
        assert_eq!(plan.scores, dir.join("scores_google-gemini-2-0-flash-001.json"));
        assert_eq!(plan.image_mode, ImageMode::Base64);
        assert!(!plan.tolerant);
    }

    #[test]
    fn test_plan_config_errors() {
        let (_dir, config) = fixture();
        let (orch, _) = orchestrator(config, Arc::new(ScriptedInvoker::new()));

        assert!(matches!(
            orch.plan(&RunRequest::new("gen4", "  ")),
            Err(ConfigError::MissingModel)
        ));
        assert!(matches!(
            orch.plan(&RunRequest::new("gen10", "a/b")),
            Err(ConfigError::InvalidBenchmark(_))
        ));
        assert!(matches!(
            orch.plan(&RunRequest::new("gen5", "a/b")),
            Err(ConfigError::BenchmarkFolderMissing(_))
        ));
    }

    #[tokio::test]
    async fn test_config_error_spawns_nothing() {
        let (_dir, config) = fixture();
        let invoker = Arc::new(ScriptedInvoker::new());
        let (orch, store) = orchestrator(config, invoker.clone());

        let err = orch
            .run(&RunRequest::new("gen7", "a/b"), &CollectingSink::new())
            .await
            .unwrap_err();
        assert!(err.is_config());
        assert!(invoker.calls().is_empty());
        assert!(store.upserts().is_empty());
    }

    #[tokio::test]
    async fn test_report_duration_overrides_measured() {
        let (_dir, config) = fixture();
        let invoker = Arc::new(
            ScriptedInvoker::new()
                .with_predictions(5, 5)
                .with_report_duration(Some(9_999)),
        );
        let (orch, store) = orchestrator(config, invoker);

        let outcome = orch
            .run(&RunRequest::new("gen4", "a/b"), &CollectingSink::new())
            .await
            .unwrap();
        assert_eq!(outcome.duration_ms, 9_999);
        assert_eq!(store.upserts()[0].duration_ms, 9_999);
    }

    #[tokio::test]
    async fn test_prediction_failure_skips_scoring_and_store() {
        let (_dir, config) = fixture();
        let invoker = Arc::new(ScriptedInvoker::new().fail_prediction(2, "provider 401"));
        let (orch, store) = orchestrator(config, invoker.clone());

        let err = orch
            .run(&RunRequest::new("gen4", "a/b"), &CollectingSink::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Run failed: provider 401");
        assert_eq!(invoker.scoring_calls(), 0);
        assert!(store.upserts().is_empty());
    }

    #[tokio::test]
    async fn test_failed_run_removes_stale_scores() {
        let (_dir, config) = fixture();
        let stale = config.benchmarks_dir.join("gen4").join("scores_a-b.json");
        std::fs::write(&stale, r#"{"metrics": {"top1": 0.25}}"#).unwrap();
        let invoker = Arc::new(ScriptedInvoker::new().fail_prediction(1, "boom"));
        let (orch, _) = orchestrator(config, invoker);

        orch.run_deferred(&RunRequest::new("gen4", "a/b"), &CollectingSink::new())
            .await
            .unwrap_err();
        assert!(!stale.exists());
    }

    #[tokio::test]
    async fn test_store_failure_does_not_fail_run() {
        let (_dir, config) = fixture();
        let invoker = Arc::new(ScriptedInvoker::new().with_metrics(ScoreMetrics::new(
            0.5, 0.75, 0.25,
        )));
        let store = Arc::new(MemoryResultsStore::failing());
        let orch = SingleRunOrchestrator::new(config, invoker, store.clone());

        let outcome = orch
            .run(&RunRequest::new("gen4", "a/b"), &CollectingSink::new())
            .await
            .unwrap();
        assert!(outcome.stored.is_none());
        assert_eq!(outcome.record.metrics.top5, 0.75);
        assert_eq!(store.upserts().len(), 1);
    }

    #[test]
    fn test_summary_line_format() {
        let outcome = RunOutcome {
            run_id: "r".to_string(),
            stats: PredictionStats::default(),
            report: ScoreReport {
                metrics: ScoreMetrics::new(0.852_44, 0.95, 0.81),
                usage: Some(pokebench_store::Usage {
                    prompt_tokens: 4000,
                    completion_tokens: 300,
                    total_tokens: 4300,
                    input_images: None,
                }),
                ..Default::default()
            },
            duration_ms: 5150,
            record: ResultRecord::default(),
            stored: None,
        };
        assert_eq!(
            outcome.summary_line(),
            "Done. Top1 85.24% Top5 95.00% F1 81.00% Duration 5150ms Tokens 4000/300"
        );
    }
}
