//! Read-side aggregates over leaderboard rows.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use pokebench_core::Benchmark;
use serde::Serialize;

use crate::record::ResultRecord;

/// Mean scores of one model across every benchmark it has a row for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelAverage {
    pub model: String,
    pub avg_top1: f64,
    pub avg_top5: f64,
    pub avg_macro_f1: f64,
    /// Number of rows averaged.
    pub count: usize,
}

/// Per-model averages, best `avg_top1` first. Rows with an empty model are
/// ignored; ties keep model-name order.
pub fn compute_model_averages(records: &[ResultRecord]) -> Vec<ModelAverage> {
    let mut by_model: BTreeMap<&str, Vec<&ResultRecord>> = BTreeMap::new();
    for record in records.iter().filter(|r| !r.model.is_empty()) {
        by_model.entry(record.model.as_str()).or_default().push(record);
    }

    let mut out: Vec<ModelAverage> = by_model
        .into_iter()
        .map(|(model, rows)| {
            let n = rows.len() as f64;
            let mean = |f: fn(&ResultRecord) -> f64| rows.iter().map(|r| f(r)).sum::<f64>() / n;
            ModelAverage {
                model: model.to_string(),
                avg_top1: mean(|r| r.metrics.top1),
                avg_top5: mean(|r| r.metrics.top5),
                avg_macro_f1: mean(|r| r.metrics.macro_f1),
                count: rows.len(),
            }
        })
        .collect();

    // Stable sort keeps the BTreeMap's name order among equal scores.
    out.sort_by(|a, b| {
        b.avg_top1
            .partial_cmp(&a.avg_top1)
            .unwrap_or(Ordering::Equal)
    });
    out
}

/// Rows whose benchmark name mentions `bench`'s slug, case-insensitively
/// (`gen3` matches `"PokeBench v1 (Gen3 135)"`).
pub fn records_for_benchmark(records: &[ResultRecord], bench: Benchmark) -> Vec<ResultRecord> {
    let needle = format!("gen{} ", bench.generation());
    records
        .iter()
        .filter(|r| r.benchmark.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ScoreMetrics;

    fn row(model: &str, benchmark: &str, top1: f64) -> ResultRecord {
        ResultRecord {
            model: model.to_string(),
            benchmark: benchmark.to_string(),
            metrics: ScoreMetrics::new(top1, top1, top1),
            ..Default::default()
        }
    }

    #[test]
    fn test_averages_sorted_best_first() {
        let rows = vec![
            row("a/low", "PokeBench v1 (Gen1 151)", 0.2),
            row("b/high", "PokeBench v1 (Gen1 151)", 0.9),
            row("a/low", "PokeBench v1 (Gen2 100)", 0.4),
            row("b/high", "PokeBench v1 (Gen2 100)", 0.7),
            row("", "PokeBench v1 (Gen2 100)", 1.0),
        ];

        let avgs = compute_model_averages(&rows);
        assert_eq!(avgs.len(), 2);
        assert_eq!(avgs[0].model, "b/high");
        assert!((avgs[0].avg_top1 - 0.8).abs() < 1e-9);
        assert_eq!(avgs[0].count, 2);
        assert_eq!(avgs[1].model, "a/low");
        assert!((avgs[1].avg_macro_f1 - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_averages_tie_keeps_name_order() {
        let rows = vec![row("z/model", "x", 0.5), row("a/model", "x", 0.5)];
        let avgs = compute_model_averages(&rows);
        assert_eq!(avgs[0].model, "a/model");
        assert_eq!(avgs[1].model, "z/model");
    }

    #[test]
    fn test_records_for_benchmark() {
        let rows = vec![
            row("m", "PokeBench v1 (Gen1 151)", 0.1),
            row("m", "PokeBench v1 (Gen2 100)", 0.1),
            row("n", "PokeBench v1 (Gen1 151)", 0.1),
        ];
        let gen1: Benchmark = "gen1".parse().unwrap();
        assert_eq!(records_for_benchmark(&rows, gen1).len(), 2);
        let gen9: Benchmark = "gen9".parse().unwrap();
        assert!(records_for_benchmark(&rows, gen9).is_empty());
    }
}
