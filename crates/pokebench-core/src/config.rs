//! Runtime configuration.
//!
//! Every path defaults relative to the project root:
//!
//! | setting | default | env |
//! |---|---|---|
//! | root | `.` | `POKEBENCH_ROOT` |
//! | benchmarks dir | `<root>/public/benchmarks` | `POKEBENCH_BENCHMARKS_DIR` |
//! | leaderboard | `<root>/resources/data/leaderboard.json` | `POKEBENCH_LEADERBOARD` |
//! | python | `python` | `POKEBENCH_PYTHON` |
//! | predict script | `<root>/eval/run_openrouter.py` | `POKEBENCH_PREDICT_SCRIPT` |
//! | score script | `<root>/eval/score.py` | `POKEBENCH_SCORE_SCRIPT` |
//! | prediction timeout | 3600 s | `POKEBENCH_PREDICTION_TIMEOUT_SECS` |
//! | scoring timeout | 600 s (`0` disables) | `POKEBENCH_SCORING_TIMEOUT_SECS` |
//! | store lock timeout | none (block) | `POKEBENCH_LOCK_TIMEOUT_SECS` |

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_PREDICTION_TIMEOUT: Duration = Duration::from_secs(3600);
pub const DEFAULT_SCORING_TIMEOUT: Duration = Duration::from_secs(600);
pub const DEFAULT_API_KEY_VAR: &str = "OPENROUTER_API_KEY";

/// Resolved settings shared by the store, the invoker and the orchestrators.
#[derive(Debug, Clone, PartialEq)]
pub struct PokeBenchConfig {
    pub root: PathBuf,
    pub benchmarks_dir: PathBuf,
    pub leaderboard_path: PathBuf,
    pub python: String,
    pub predict_script: PathBuf,
    pub score_script: PathBuf,
    pub prediction_timeout: Duration,
    /// `None` lets scoring run unbounded.
    pub scoring_timeout: Option<Duration>,
    /// Name of the provider API-key variable forwarded to child processes.
    pub api_key_var: String,
    /// `None` blocks until the leaderboard lock is free.
    pub lock_timeout: Option<Duration>,
}

impl PokeBenchConfig {
    /// Defaults rooted at `root`.
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            benchmarks_dir: root.join("public").join("benchmarks"),
            leaderboard_path: root.join("resources").join("data").join("leaderboard.json"),
            python: "python".to_string(),
            predict_script: root.join("eval").join("run_openrouter.py"),
            score_script: root.join("eval").join("score.py"),
            prediction_timeout: DEFAULT_PREDICTION_TIMEOUT,
            scoring_timeout: Some(DEFAULT_SCORING_TIMEOUT),
            api_key_var: DEFAULT_API_KEY_VAR.to_string(),
            lock_timeout: None,
            root,
        }
    }

    /// Build from `POKEBENCH_*` process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let root = get("POKEBENCH_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let mut config = Self::with_root(root);

        if let Some(v) = get("POKEBENCH_BENCHMARKS_DIR") {
            config.benchmarks_dir = PathBuf::from(v);
        }
        if let Some(v) = get("POKEBENCH_LEADERBOARD") {
            config.leaderboard_path = PathBuf::from(v);
        }
        if let Some(v) = get("POKEBENCH_PYTHON") {
            config.python = v;
        }
        if let Some(v) = get("POKEBENCH_PREDICT_SCRIPT") {
            config.predict_script = PathBuf::from(v);
        }
        if let Some(v) = get("POKEBENCH_SCORE_SCRIPT") {
            config.score_script = PathBuf::from(v);
        }
        if let Some(v) = get("POKEBENCH_PREDICTION_TIMEOUT_SECS") {
            config.prediction_timeout =
                Duration::from_secs(parse_secs("POKEBENCH_PREDICTION_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = get("POKEBENCH_SCORING_TIMEOUT_SECS") {
            config.scoring_timeout = match parse_secs("POKEBENCH_SCORING_TIMEOUT_SECS", &v)? {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            };
        }
        if let Some(v) = get("POKEBENCH_LOCK_TIMEOUT_SECS") {
            config.lock_timeout = Some(Duration::from_secs(parse_secs(
                "POKEBENCH_LOCK_TIMEOUT_SECS",
                &v,
            )?));
        }
        if let Some(v) = get("POKEBENCH_API_KEY_VAR") {
            config.api_key_var = v;
        }

        Ok(config)
    }
}

impl Default for PokeBenchConfig {
    fn default() -> Self {
        Self::with_root(".")
    }
}

fn parse_secs(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        })
}
