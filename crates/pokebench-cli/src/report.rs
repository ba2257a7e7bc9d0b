//! Plain-text tables for `pokebench leaderboard`.

use std::fmt::Write;

use pokebench_store::{ModelAverage, ResultRecord};

fn pct(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

/// One line per row, in stored order.
pub fn render_records(records: &[ResultRecord]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<42} {:<26} {:>8} {:>8} {:>8} {:>10}  {}",
        "MODEL", "BENCHMARK", "TOP1", "TOP5", "F1", "DURATION", "DATE"
    );
    for r in records {
        let _ = writeln!(
            out,
            "{:<42} {:<26} {:>8} {:>8} {:>8} {:>10}  {}",
            r.model,
            r.benchmark,
            pct(r.metrics.top1),
            pct(r.metrics.top5),
            pct(r.metrics.macro_f1),
            format!("{}ms", r.duration_ms),
            r.date,
        );
    }
    out
}

/// Ranked per-model averages, best first.
pub fn render_averages(averages: &[ModelAverage]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>4}  {:<42} {:>8} {:>8} {:>8} {:>6}",
        "#", "MODEL", "TOP1", "TOP5", "F1", "RUNS"
    );
    for (rank, avg) in averages.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>4}  {:<42} {:>8} {:>8} {:>8} {:>6}",
            rank + 1,
            avg.model,
            pct(avg.avg_top1),
            pct(avg.avg_top5),
            pct(avg.avg_macro_f1),
            avg.count,
        );
    }
    out
}
