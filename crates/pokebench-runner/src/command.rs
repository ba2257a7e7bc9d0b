//! External process invocations and their argument vectors.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use pokebench_core::ImageMode;
use serde::Serialize;

/// Which external process a result or error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// `run_openrouter.py`: model inference over every benchmark image.
    Prediction,

    /// `score.py`: metrics from predictions against ground truth.
    Scoring,
}

impl Step {
    /// Lowercase name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Step::Prediction => "prediction",
            Step::Scoring => "scoring",
        }
    }

    /// Prefix of the user-facing failure line.
    pub fn failure_label(&self) -> &'static str {
        match self {
            Step::Prediction => "Run",
            Step::Scoring => "Score",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Inputs of one prediction process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionRequest {
    pub model: String,
    pub images: PathBuf,
    pub labels: PathBuf,
    /// Where the process writes its `{entries, usage}` document.
    pub out: PathBuf,
    pub image_mode: ImageMode,
    pub tolerant: bool,
}

impl PredictionRequest {
    /// Script arguments, without the interpreter or script path.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "--model".to_string(),
            self.model.clone(),
            "--images".to_string(),
            path_arg(&self.images),
            "--labels".to_string(),
            path_arg(&self.labels),
            "--out".to_string(),
            path_arg(&self.out),
            "--progress".to_string(),
            "--image-mode".to_string(),
            self.image_mode.as_str().to_string(),
        ];
        if self.tolerant {
            args.push("--tolerant".to_string());
        }
        args
    }
}

/// Inputs of one scoring process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoringRequest {
    pub ground_truth: PathBuf,
    pub predictions: PathBuf,
    /// Where the process writes its score report.
    pub out: PathBuf,
    /// Echoed back as the report's `duration_ms` when set.
    pub duration_ms: Option<u64>,
}

impl ScoringRequest {
    /// Script arguments, without the interpreter or script path.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "--ground-truth".to_string(),
            path_arg(&self.ground_truth),
            "--predictions".to_string(),
            path_arg(&self.predictions),
            "--out".to_string(),
            path_arg(&self.out),
        ];
        if let Some(ms) = self.duration_ms {
            args.push("--duration-ms".to_string());
            args.push(ms.to_string());
        }
        args
    }
}

/// A fully resolved command line with its time limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub step: Step,

    /// Command to execute (first element is the executable).
    pub command: Vec<String>,

    /// `None` waits for the process indefinitely.
    pub timeout: Option<Duration>,
}

impl ProcessSpec {
    /// `<python> -u <script> <args...>`; `-u` keeps progress output unbuffered.
    pub fn prediction(
        python: &str,
        script: &std::path::Path,
        req: &PredictionRequest,
        timeout: Duration,
    ) -> Self {
        let mut command = vec![python.to_string(), "-u".to_string(), path_arg(script)];
        command.extend(req.args());
        Self {
            step: Step::Prediction,
            command,
            timeout: Some(timeout),
        }
    }

    /// `<python> <script> <args...>`.
    pub fn scoring(
        python: &str,
        script: &std::path::Path,
        req: &ScoringRequest,
        timeout: Option<Duration>,
    ) -> Self {
        let mut command = vec![python.to_string(), path_arg(script)];
        command.extend(req.args());
        Self {
            step: Step::Scoring,
            command,
            timeout,
        }
    }
}

fn path_arg(path: &std::path::Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn prediction_request(tolerant: bool) -> PredictionRequest {
        PredictionRequest {
            model: "acme/vision-1".to_string(),
            images: PathBuf::from("public/benchmarks/gen1/images.json"),
            labels: PathBuf::from("public/benchmarks/gen1/labels.txt"),
            out: PathBuf::from("public/benchmarks/gen1/predictions_acme-vision-1.json"),
            image_mode: ImageMode::Base64,
            tolerant,
        }
    }

    #[test]
    fn test_prediction_command_line() {
        let spec = ProcessSpec::prediction(
            "python",
            Path::new("eval/run_openrouter.py"),
            &prediction_request(false),
            Duration::from_secs(3600),
        );

        assert_eq!(spec.step, Step::Prediction);
        assert_eq!(spec.timeout, Some(Duration::from_secs(3600)));
        assert_eq!(
            spec.command,
            vec![
                "python",
                "-u",
                "eval/run_openrouter.py",
                "--model",
                "acme/vision-1",
                "--images",
                "public/benchmarks/gen1/images.json",
                "--labels",
                "public/benchmarks/gen1/labels.txt",
                "--out",
                "public/benchmarks/gen1/predictions_acme-vision-1.json",
                "--progress",
                "--image-mode",
                "base64",
            ]
        );
    }

    #[test]
    fn test_tolerant_flag_is_last() {
        let args = prediction_request(true).args();
        assert_eq!(args.last().map(String::as_str), Some("--tolerant"));
    }

    #[test]
    fn test_scoring_command_line_with_duration() {
        let req = ScoringRequest {
            ground_truth: PathBuf::from("gt.jsonl"),
            predictions: PathBuf::from("p.json"),
            out: PathBuf::from("s.json"),
            duration_ms: Some(5150),
        };
        let spec = ProcessSpec::scoring("python3", Path::new("eval/score.py"), &req, None);

        assert_eq!(spec.timeout, None);
        assert_eq!(
            spec.command,
            vec![
                "python3",
                "eval/score.py",
                "--ground-truth",
                "gt.jsonl",
                "--predictions",
                "p.json",
                "--out",
                "s.json",
                "--duration-ms",
                "5150",
            ]
        );
    }

    #[test]
    fn test_scoring_without_duration_omits_flag() {
        let req = ScoringRequest {
            ground_truth: PathBuf::from("gt.jsonl"),
            predictions: PathBuf::from("p.json"),
            out: PathBuf::from("s.json"),
            duration_ms: None,
        };
        assert!(!req.args().iter().any(|a| a == "--duration-ms"));
    }

    #[test]
    fn test_step_labels() {
        assert_eq!(Step::Prediction.to_string(), "prediction");
        assert_eq!(Step::Scoring.failure_label(), "Score");
    }
}
