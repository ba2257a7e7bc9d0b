//! Test doubles for the invoker and output seams.
//!
//! [`ScriptedInvoker`] writes the same artifacts the real scripts would,
//! so orchestrators run unchanged against it.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use pokebench_store::{ScoreMetrics, Usage};
use serde_json::{json, Map, Value};

use crate::command::{PredictionRequest, ScoringRequest, Step};
use crate::error::RunError;
use crate::invoker::{ExitResult, RunInvoker};
use crate::sink::{OutputSink, Stream};

/// A recorded invoker call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvokerCall {
    Prediction(PredictionRequest),
    Scoring(ScoringRequest),
}

#[derive(Debug, Clone)]
enum ReportDuration {
    /// Copy the requested `--duration-ms`, like the real scorer.
    Echo,
    Fixed(Option<u64>),
}

#[derive(Debug, Clone)]
struct Failure {
    exit_code: i32,
    stderr: String,
}

/// Scriptable [`RunInvoker`] that writes prediction and score files.
#[derive(Debug)]
pub struct ScriptedInvoker {
    entries: usize,
    non_empty: usize,
    write_predictions: bool,
    metrics: ScoreMetrics,
    usage: Option<Usage>,
    report_duration: ReportDuration,
    prediction_failure: Option<Failure>,
    scoring_failure: Option<Failure>,
    failing_models: HashSet<String>,
    delay: Duration,
    calls: Mutex<Vec<InvokerCall>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for ScriptedInvoker {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedInvoker {
    /// Three fully populated entries; metrics 0.8 / 0.9 / 0.7.
    pub fn new() -> Self {
        Self {
            entries: 3,
            non_empty: 3,
            write_predictions: true,
            metrics: ScoreMetrics::new(0.8, 0.9, 0.7),
            usage: Some(Usage {
                prompt_tokens: 100,
                completion_tokens: 10,
                total_tokens: 110,
                input_images: Some(3),
            }),
            report_duration: ReportDuration::Echo,
            prediction_failure: None,
            scoring_failure: None,
            failing_models: HashSet::new(),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// `entries` prediction rows, the first `non_empty` with probabilities.
    pub fn with_predictions(mut self, entries: usize, non_empty: usize) -> Self {
        self.entries = entries;
        self.non_empty = non_empty.min(entries);
        self
    }

    /// Exit 0 from prediction without writing a file.
    pub fn without_prediction_file(mut self) -> Self {
        self.write_predictions = false;
        self
    }

    /// Metrics written into every score report.
    pub fn with_metrics(mut self, metrics: ScoreMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Usage written into prediction and score files (`None` omits it).
    pub fn with_usage(mut self, usage: Option<Usage>) -> Self {
        self.usage = usage;
        self
    }

    /// Write this `duration_ms` into score reports (`None` omits the key).
    pub fn with_report_duration(mut self, duration_ms: Option<u64>) -> Self {
        self.report_duration = ReportDuration::Fixed(duration_ms);
        self
    }

    /// Every prediction exits with `exit_code`, printing `stderr`.
    pub fn fail_prediction(mut self, exit_code: i32, stderr: &str) -> Self {
        self.prediction_failure = Some(Failure {
            exit_code,
            stderr: stderr.to_string(),
        });
        self
    }

    /// Every scoring run exits with `exit_code`, printing `stderr`.
    pub fn fail_scoring(mut self, exit_code: i32, stderr: &str) -> Self {
        self.scoring_failure = Some(Failure {
            exit_code,
            stderr: stderr.to_string(),
        });
        self
    }

    /// Prediction for `model` exits 1 without output.
    pub fn fail_model(mut self, model: &str) -> Self {
        self.failing_models.insert(model.to_string());
        self
    }

    /// Sleep this long inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Every call received, in order.
    pub fn calls(&self) -> Vec<InvokerCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of prediction calls.
    pub fn prediction_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, InvokerCall::Prediction(_)))
            .count()
    }

    /// Number of scoring calls.
    pub fn scoring_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, InvokerCall::Scoring(_)))
            .count()
    }

    /// Highest number of calls that were in progress at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self, call: InvokerCall) {
        self.calls.lock().unwrap().push(call);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn prediction_document(&self) -> Value {
        let entries: Vec<Value> = (0..self.entries)
            .map(|i| {
                let probs = if i < self.non_empty {
                    json!({"bulbasaur": 0.7, "ivysaur": 0.2, "venusaur": 0.1})
                } else {
                    Value::Object(Map::new())
                };
                json!({"image_id": format!("{:04}.png", i + 1), "probs": probs})
            })
            .collect();
        let mut doc = json!({ "entries": entries });
        if let Some(usage) = &self.usage {
            doc["usage"] = json!(usage);
        }
        doc
    }

    fn score_document(&self, req: &ScoringRequest) -> Value {
        let mut doc = json!({
            "task": "T1",
            "metrics": {
                "top1": self.metrics.top1,
                "top5": self.metrics.top5,
                "macro_f1": self.metrics.macro_f1,
            },
        });
        if let Some(usage) = &self.usage {
            doc["usage"] = json!(usage);
        }
        let duration = match self.report_duration {
            ReportDuration::Echo => req.duration_ms,
            ReportDuration::Fixed(ms) => ms,
        };
        if let Some(ms) = duration {
            doc["duration_ms"] = json!(ms);
        }
        doc
    }
}

fn failed(step: Step, failure: &Failure, sink: &dyn OutputSink) -> ExitResult {
    for line in failure.stderr.lines() {
        sink.line(Stream::Stderr, line);
    }
    ExitResult {
        step,
        exit_code: failure.exit_code,
        stderr: failure.stderr.clone(),
        duration_ms: 1,
        success: false,
    }
}

fn passed(step: Step) -> ExitResult {
    ExitResult {
        step,
        exit_code: 0,
        stderr: String::new(),
        duration_ms: 1,
        success: true,
    }
}

fn write_json(step: Step, path: &std::path::Path, doc: &Value) -> Result<(), RunError> {
    std::fs::write(path, doc.to_string()).map_err(|source| RunError::Io { step, source })
}

#[async_trait]
impl RunInvoker for ScriptedInvoker {
    async fn run_prediction(
        &self,
        req: &PredictionRequest,
        sink: &dyn OutputSink,
    ) -> Result<ExitResult, RunError> {
        self.enter(InvokerCall::Prediction(req.clone())).await;

        if self.failing_models.contains(&req.model) {
            let failure = Failure {
                exit_code: 1,
                stderr: format!("model {} is unavailable", req.model),
            };
            return Ok(failed(Step::Prediction, &failure, sink));
        }
        if let Some(failure) = &self.prediction_failure {
            return Ok(failed(Step::Prediction, failure, sink));
        }

        sink.line(
            Stream::Stdout,
            &format!("[{}/{}] predicted", self.entries, self.entries),
        );
        if self.write_predictions {
            write_json(Step::Prediction, &req.out, &self.prediction_document())?;
        }
        Ok(passed(Step::Prediction))
    }

    async fn run_scoring(
        &self,
        req: &ScoringRequest,
        sink: &dyn OutputSink,
    ) -> Result<ExitResult, RunError> {
        self.enter(InvokerCall::Scoring(req.clone())).await;

        if let Some(failure) = &self.scoring_failure {
            return Ok(failed(Step::Scoring, failure, sink));
        }
        write_json(Step::Scoring, &req.out, &self.score_document(req))?;
        Ok(passed(Step::Scoring))
    }
}

/// [`OutputSink`] that keeps every line.
#[derive(Debug, Default)]
pub struct CollectingSink {
    lines: Mutex<Vec<(Stream, String)>>,
}

impl CollectingSink {
    /// Sink with no lines yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every line with its stream, in arrival order.
    pub fn lines(&self) -> Vec<(Stream, String)> {
        self.lines.lock().unwrap().clone()
    }

    /// Just the text, in arrival order.
    pub fn text(&self) -> Vec<String> {
        self.lines().into_iter().map(|(_, line)| line).collect()
    }

    /// Whether any line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|(_, line)| line.contains(needle))
    }
}

impl OutputSink for CollectingSink {
    fn line(&self, stream: Stream, line: &str) {
        self.lines.lock().unwrap().push((stream, line.to_string()));
    }
}
