//! Leaderboard row schema and the upsert request.

use chrono::{Local, NaiveDate};
use pokebench_core::canonical_benchmark_name;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Team written on every new row.
pub const TEAM: &str = "PokeBenchAI";

/// Task tag written on every new row.
pub const TASK: &str = "T1";

/// Classification scores, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreMetrics {
    #[serde(default)]
    pub top1: f64,
    #[serde(default)]
    pub top5: f64,
    #[serde(default)]
    pub macro_f1: f64,
}

impl ScoreMetrics {
    /// Metrics as given, unrounded.
    pub fn new(top1: f64, top5: f64, macro_f1: f64) -> Self {
        Self {
            top1,
            top5,
            macro_f1,
        }
    }

    /// Copy with every metric rounded to 4 decimal places.
    pub fn rounded(&self) -> Self {
        Self {
            top1: round4(self.top1),
            top5: round4(self.top5),
            macro_f1: round4(self.macro_f1),
        }
    }
}

/// Token accounting reported by the prediction process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_images: Option<u64>,
}

/// One leaderboard row.
///
/// Rows written by older tooling may carry an empty list (`[]`) or an empty
/// object for `usage`; both read as `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    #[serde(default)]
    pub team: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub benchmark: String,
    #[serde(default)]
    pub task: String,
    #[serde(default)]
    pub metrics: ScoreMetrics,
    /// `YYYY-MM-DD` of the last update.
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(
        default,
        deserialize_with = "deserialize_usage",
        skip_serializing_if = "Option::is_none"
    )]
    pub usage: Option<Usage>,
}

/// A request to record one model's scores for one benchmark.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreUpsert {
    /// Benchmark slug, e.g. `gen1`. Only its digits reach the row name.
    pub bench_slug: String,
    /// Label count of the benchmark.
    pub item_count: usize,
    pub model: String,
    pub metrics: ScoreMetrics,
    pub duration_ms: u64,
    /// `None` keeps whatever usage an existing row already has.
    pub usage: Option<Usage>,
    pub date: NaiveDate,
}

impl ScoreUpsert {
    /// Request dated today (local time).
    pub fn new(
        bench_slug: impl Into<String>,
        item_count: usize,
        model: impl Into<String>,
        metrics: ScoreMetrics,
        duration_ms: u64,
        usage: Option<Usage>,
    ) -> Self {
        Self {
            bench_slug: bench_slug.into(),
            item_count,
            model: model.into(),
            metrics,
            duration_ms,
            usage,
            date: Local::now().date_naive(),
        }
    }

    /// Override the row date.
    pub fn on(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }

    /// `"PokeBench v1 (Gen{N} {item_count})"`.
    pub fn benchmark_name(&self) -> String {
        canonical_benchmark_name(&self.bench_slug, self.item_count)
    }

    /// Row date as `YYYY-MM-DD`.
    pub fn date_string(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    /// Fresh row for this request.
    pub fn to_record(&self) -> ResultRecord {
        ResultRecord {
            team: TEAM.to_string(),
            model: self.model.clone(),
            benchmark: self.benchmark_name(),
            task: TASK.to_string(),
            metrics: self.metrics.rounded(),
            date: self.date_string(),
            duration_ms: self.duration_ms,
            usage: self.usage.clone(),
        }
    }
}

/// Round half away from zero to 4 decimal places.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Accept a usage object; anything else (missing, `[]`, `{}`, `null`) is `None`.
pub fn deserialize_usage<'de, D>(deserializer: D) -> Result<Option<Usage>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(usage_from_value(value.as_ref()))
}

pub(crate) fn usage_from_value(value: Option<&Value>) -> Option<Usage> {
    match value {
        Some(Value::Object(map)) if !map.is_empty() => {
            serde_json::from_value(Value::Object(map.clone())).ok()
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round4() {
        assert_eq!(round4(0.85244), 0.8524);
        assert_eq!(round4(0.85245001), 0.8525);
        assert_eq!(round4(1.0), 1.0);
        assert_eq!(round4(0.0), 0.0);
    }

    #[test]
    fn test_upsert_request_builds_row() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let req = ScoreUpsert::new(
            "gen1",
            151,
            "acme/vision-1",
            ScoreMetrics::new(0.852_44, 0.95, 0.810_06),
            1234,
            None,
        )
        .on(date);

        let row = req.to_record();
        assert_eq!(row.team, "PokeBenchAI");
        assert_eq!(row.task, "T1");
        assert_eq!(row.benchmark, "PokeBench v1 (Gen1 151)");
        assert_eq!(row.metrics, ScoreMetrics::new(0.8524, 0.95, 0.8101));
        assert_eq!(row.date, "2026-10-16");
        assert_eq!(row.duration_ms, 1234);
        assert!(row.usage.is_none());
    }

    #[test]
    fn test_row_usage_is_lenient() {
        let row: ResultRecord = serde_json::from_value(json!({
            "model": "m", "benchmark": "b", "usage": []
        }))
        .unwrap();
        assert!(row.usage.is_none());

        let row: ResultRecord = serde_json::from_value(json!({
            "model": "m", "benchmark": "b", "usage": {}
        }))
        .unwrap();
        assert!(row.usage.is_none());

        let row: ResultRecord = serde_json::from_value(json!({
            "model": "m",
            "usage": {"prompt_tokens": 10, "completion_tokens": 2, "total_tokens": 12, "input_images": 1}
        }))
        .unwrap();
        let usage = row.usage.unwrap();
        assert_eq!(usage.total_tokens, 12);
        assert_eq!(usage.input_images, Some(1));
    }

    #[test]
    fn test_row_without_usage_omits_field() {
        let row = ResultRecord {
            model: "m".to_string(),
            ..Default::default()
        };
        let value = serde_json::to_value(&row).unwrap();
        assert!(value.get("usage").is_none());
        assert!(value.get("metrics").is_some());
    }
}
