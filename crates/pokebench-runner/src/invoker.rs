//! Launching the prediction and scoring processes.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use pokebench_core::{PokeBenchConfig, METRICS};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::command::{PredictionRequest, ProcessSpec, ScoringRequest, Step};
use crate::error::RunError;
use crate::sink::{OutputSink, Stream};

/// How a finished process exited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitResult {
    pub step: Step,

    /// Exit code; -1 when the process was ended by a signal.
    pub exit_code: i32,

    /// Everything the process wrote to stderr.
    pub stderr: String,

    /// Wall-clock time from spawn to exit.
    pub duration_ms: u64,

    pub success: bool,
}

impl ExitResult {
    /// Whether the process exited with code 0.
    pub fn passed(&self) -> bool {
        self.success && self.exit_code == 0
    }

    /// `Ok(self)` on a clean exit, [`RunError::ProcessFailed`] otherwise.
    pub fn into_result(self) -> Result<Self, RunError> {
        if self.passed() {
            Ok(self)
        } else {
            Err(RunError::ProcessFailed {
                step: self.step,
                exit_code: self.exit_code,
                stderr: self.stderr,
            })
        }
    }
}

/// Runs the two external processes of a benchmark run.
///
/// Implementations report a non-zero exit through [`ExitResult`]; only
/// spawn failures and timeouts are errors. Artifacts are never parsed here.
#[async_trait]
pub trait RunInvoker: Send + Sync {
    async fn run_prediction(
        &self,
        req: &PredictionRequest,
        sink: &dyn OutputSink,
    ) -> Result<ExitResult, RunError>;

    async fn run_scoring(
        &self,
        req: &ScoringRequest,
        sink: &dyn OutputSink,
    ) -> Result<ExitResult, RunError>;
}

/// [`RunInvoker`] that spawns real child processes.
///
/// Children run in the project root with `PYTHONUNBUFFERED=1` and the
/// provider API key (when known) in their environment. Output is streamed
/// to the sink line by line; a child that exceeds its time limit is killed.
#[derive(Debug, Clone)]
pub struct ProcessInvoker {
    python: String,
    predict_script: PathBuf,
    score_script: PathBuf,
    working_dir: PathBuf,
    prediction_timeout: std::time::Duration,
    scoring_timeout: Option<std::time::Duration>,
    api_key: Option<(String, String)>,
}

impl ProcessInvoker {
    /// Build from configuration, picking up the API key from the environment.
    pub fn new(config: &PokeBenchConfig) -> Self {
        let api_key = std::env::var(&config.api_key_var)
            .ok()
            .filter(|v| !v.is_empty())
            .map(|v| (config.api_key_var.clone(), v));
        Self {
            python: config.python.clone(),
            predict_script: config.predict_script.clone(),
            score_script: config.score_script.clone(),
            working_dir: config.root.clone(),
            prediction_timeout: config.prediction_timeout,
            scoring_timeout: config.scoring_timeout,
            api_key,
        }
    }

    /// Forward `name=value` to every child instead of the inherited value.
    pub fn with_api_key(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.api_key = Some((name.into(), value.into()));
        self
    }

    /// Command line and time limit for `req`.
    pub fn prediction_spec(&self, req: &PredictionRequest) -> ProcessSpec {
        ProcessSpec::prediction(
            &self.python,
            &self.predict_script,
            req,
            self.prediction_timeout,
        )
    }

    /// Command line and time limit for `req`.
    pub fn scoring_spec(&self, req: &ScoringRequest) -> ProcessSpec {
        ProcessSpec::scoring(&self.python, &self.score_script, req, self.scoring_timeout)
    }

    /// Spawn `spec`, stream its output and wait for it within its time limit.
    pub async fn execute(
        &self,
        spec: &ProcessSpec,
        sink: &dyn OutputSink,
    ) -> Result<ExitResult, RunError> {
        let start = Instant::now();
        let step = spec.step;

        let (program, args) = spec
            .command
            .split_first()
            .ok_or(RunError::EmptyCommand { step })?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(&self.working_dir)
            .env("PYTHONUNBUFFERED", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some((name, value)) = &self.api_key {
            cmd.env(name, value);
        }

        let mut child = cmd.spawn().map_err(|source| RunError::Spawn {
            step,
            program: program.clone(),
            source,
        })?;
        METRICS.inc_processes_spawned();
        info!(step = %step, pid = child.id(), "process spawned");

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let run = async {
            let (_, captured, status) = tokio::join!(
                pump(stdout, Stream::Stdout, sink, false),
                pump(stderr, Stream::Stderr, sink, true),
                child.wait(),
            );
            (captured, status)
        };

        let (captured, status) = match spec.timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(done) => done,
                Err(_) => {
                    if let Err(e) = child.kill().await {
                        warn!(step = %step, error = %e, "failed to kill timed-out process");
                    }
                    return Err(RunError::Timeout { step, limit });
                }
            },
            None => run.await,
        };
        let status = status.map_err(|source| RunError::Io { step, source })?;

        let result = ExitResult {
            step,
            exit_code: status.code().unwrap_or(-1),
            stderr: captured,
            duration_ms: start.elapsed().as_millis() as u64,
            success: status.success(),
        };
        debug!(
            step = %step,
            exit_code = result.exit_code,
            duration_ms = result.duration_ms,
            "process exited"
        );
        Ok(result)
    }
}

#[async_trait]
impl RunInvoker for ProcessInvoker {
    async fn run_prediction(
        &self,
        req: &PredictionRequest,
        sink: &dyn OutputSink,
    ) -> Result<ExitResult, RunError> {
        self.execute(&self.prediction_spec(req), sink).await
    }

    async fn run_scoring(
        &self,
        req: &ScoringRequest,
        sink: &dyn OutputSink,
    ) -> Result<ExitResult, RunError> {
        self.execute(&self.scoring_spec(req), sink).await
    }
}

/// Forward lines from `reader` to the sink until EOF; return them when
/// `capture` is set.
async fn pump<R>(reader: Option<R>, stream: Stream, sink: &dyn OutputSink, capture: bool) -> String
where
    R: AsyncRead + Unpin,
{
    let mut captured = String::new();
    let Some(reader) = reader else {
        return captured;
    };
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                while matches!(buf.last(), Some(b'\n' | b'\r')) {
                    buf.pop();
                }
                // Invalid UTF-8 is replaced; reading continues to EOF.
                let line = String::from_utf8_lossy(&buf);
                sink.line(stream, &line);
                if capture {
                    captured.push_str(&line);
                    captured.push('\n');
                }
            }
            Err(e) => {
                debug!(error = %e, "stopped reading process output");
                break;
            }
        }
    }
    captured
}
