//! Upsert-by-key over raw leaderboard rows.
//!
//! Rows are handled as JSON values so that fields this crate does not model
//! survive a rewrite untouched.

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::record::{ResultRecord, ScoreUpsert};

/// What an upsert did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpsertOutcome {
    /// Canonical benchmark name of the row.
    pub benchmark: String,
    pub model: String,
    /// `true` when a new row was appended.
    pub inserted: bool,
    /// Index of the row in the array.
    pub position: usize,
}

/// Update the row keyed by `(benchmark name, model)` in place, or append one.
///
/// An update overwrites `metrics`, `date` and `duration_ms`; `usage` only when
/// the request carries one. Every other field, and the row's position, is kept.
pub fn apply_upsert(rows: &mut Vec<Value>, req: &ScoreUpsert) -> UpsertOutcome {
    let name = req.benchmark_name();
    let metrics = req.metrics.rounded();

    let existing = rows.iter().position(|row| {
        str_field(row, "benchmark") == name.as_str() && str_field(row, "model") == req.model
    });

    if let Some(position) = existing {
        if let Some(obj) = rows[position].as_object_mut() {
            obj.insert(
                "metrics".to_string(),
                json!({
                    "top1": metrics.top1,
                    "top5": metrics.top5,
                    "macro_f1": metrics.macro_f1,
                }),
            );
            obj.insert("date".to_string(), Value::String(req.date_string()));
            obj.insert("duration_ms".to_string(), Value::from(req.duration_ms));
            if let Some(usage) = &req.usage {
                obj.insert("usage".to_string(), usage_value(usage));
            }
        }
        return UpsertOutcome {
            benchmark: name,
            model: req.model.clone(),
            inserted: false,
            position,
        };
    }

    rows.push(record_value(&req.to_record()));
    UpsertOutcome {
        benchmark: name,
        model: req.model.clone(),
        inserted: true,
        position: rows.len() - 1,
    }
}

/// Typed view of the rows; entries that are not objects are skipped.
pub fn typed_rows(rows: &[Value]) -> Vec<ResultRecord> {
    rows.iter()
        .filter(|row| row.is_object())
        .filter_map(|row| match serde_json::from_value::<ResultRecord>(row.clone()) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::debug!(error = %e, "skipping unreadable leaderboard row");
                None
            }
        })
        .collect()
}

fn str_field<'a>(row: &'a Value, key: &str) -> &'a str {
    row.get(key).and_then(Value::as_str).unwrap_or("")
}

fn record_value(record: &ResultRecord) -> Value {
    serde_json::to_value(record).unwrap_or_else(|_| Value::Object(Map::new()))
}

fn usage_value(usage: &crate::record::Usage) -> Value {
    serde_json::to_value(usage).unwrap_or_else(|_| Value::Object(Map::new()))
}
