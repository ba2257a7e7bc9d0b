//! Benchmark registry and on-disk asset layout.
//!
//! A benchmark is one Pokémon generation (`gen1`..`gen9`). Its assets live in
//! `<benchmarks_dir>/<slug>/`:
//!
//! - `images.json` — image manifest handed to the prediction process
//! - `labels.txt` — one label per line; the line count is the item count
//! - `ground_truth.jsonl` — `{image_id, class}` per line, for scoring
//! - `predictions_<model-slug>.json` / `scores_<model-slug>.json` — per-model artifacts

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

static BENCH_SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^gen([1-9])$").expect("valid benchmark slug pattern"));

/// Generations whose batch runs go through the full single-run pipeline.
const LEGACY_GENERATIONS: [u8; 2] = [1, 2];

/// A generation benchmark, identified by its slug (`gen1`..`gen9`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Benchmark {
    generation: u8,
}

impl Benchmark {
    /// All recognised benchmarks in generation order.
    pub fn all() -> impl Iterator<Item = Benchmark> {
        (1..=9).map(|generation| Benchmark { generation })
    }

    /// Generation number (1..=9).
    pub fn generation(&self) -> u8 {
        self.generation
    }

    /// Folder / CLI slug, e.g. `gen3`.
    pub fn slug(&self) -> String {
        format!("gen{}", self.generation)
    }

    /// Human description used when listing benchmarks.
    pub fn description(&self) -> &'static str {
        match self.generation {
            1 => "Generation 1 (151 Pokémon)",
            2 => "Generation 2 (100 Pokémon)",
            3 => "Generation 3 (135 Pokémon)",
            4 => "Generation 4 (107 Pokémon)",
            5 => "Generation 5 (156 Pokémon)",
            6 => "Generation 6 (72 Pokémon)",
            7 => "Generation 7 (33 Pokémon)",
            8 => "Generation 8 (89 Pokémon)",
            _ => "Generation 9 (127 Pokémon)",
        }
    }

    /// Legacy benchmarks run every model through the full single-run pipeline
    /// in batch mode instead of deferring leaderboard updates.
    pub fn is_legacy(&self) -> bool {
        LEGACY_GENERATIONS.contains(&self.generation)
    }

    /// Leaderboard name for this benchmark with `item_count` labels.
    pub fn leaderboard_name(&self, item_count: usize) -> String {
        canonical_benchmark_name(&self.slug(), item_count)
    }

    /// Asset paths for this benchmark under `benchmarks_dir`.
    pub fn assets(&self, benchmarks_dir: &Path) -> BenchmarkAssets {
        BenchmarkAssets::new(benchmarks_dir.join(self.slug()))
    }
}

impl fmt::Display for Benchmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen{}", self.generation)
    }
}

impl FromStr for Benchmark {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = BENCH_SLUG
            .captures(s)
            .ok_or_else(|| ConfigError::InvalidBenchmark(s.to_string()))?;
        let generation = caps[1]
            .parse::<u8>()
            .map_err(|_| ConfigError::InvalidBenchmark(s.to_string()))?;
        Ok(Self { generation })
    }
}

impl TryFrom<String> for Benchmark {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Benchmark> for String {
    fn from(value: Benchmark) -> Self {
        value.slug()
    }
}

/// Build the leaderboard name `"PokeBench v1 (Gen{N} {count})"`.
///
/// `N` is the integer formed by the digits of `slug`; a slug without digits
/// yields `Gen0`.
pub fn canonical_benchmark_name(slug: &str, item_count: usize) -> String {
    let digits: String = slug.chars().filter(char::is_ascii_digit).collect();
    let generation = digits.parse::<u64>().unwrap_or(0);
    format!("PokeBench v1 (Gen{} {})", generation, item_count)
}

/// Resolved file paths for one benchmark folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchmarkAssets {
    pub dir: PathBuf,
    pub images: PathBuf,
    pub labels: PathBuf,
    pub ground_truth: PathBuf,
}

impl BenchmarkAssets {
    /// Paths inside `dir`; nothing is checked on disk.
    pub fn new(dir: PathBuf) -> Self {
        Self {
            images: dir.join("images.json"),
            labels: dir.join("labels.txt"),
            ground_truth: dir.join("ground_truth.jsonl"),
            dir,
        }
    }

    /// Fail with [`ConfigError::BenchmarkFolderMissing`] unless the folder exists.
    pub fn ensure_exists(&self) -> Result<(), ConfigError> {
        if self.dir.is_dir() {
            Ok(())
        } else {
            Err(ConfigError::BenchmarkFolderMissing(self.dir.clone()))
        }
    }

    /// `predictions_<model_slug>.json` in the benchmark folder.
    pub fn predictions_for(&self, model_slug: &str) -> PathBuf {
        self.dir.join(format!("predictions_{}.json", model_slug))
    }

    /// `scores_<model_slug>.json` in the benchmark folder.
    pub fn scores_for(&self, model_slug: &str) -> PathBuf {
        self.dir.join(format!("scores_{}.json", model_slug))
    }

    /// Number of lines in `labels.txt`, or 0 when it cannot be read.
    pub fn item_count(&self) -> usize {
        std::fs::read_to_string(&self.labels)
            .map(|content| content.lines().count())
            .unwrap_or(0)
    }
}
