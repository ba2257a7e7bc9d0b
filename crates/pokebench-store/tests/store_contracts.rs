//! Contract tests for the leaderboard store.
//!
//! Each property runs against the file-backed store and the in-memory fake.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use pokebench_store::fakes::MemoryResultsStore;
use pokebench_store::{
    upsert_best_effort, JsonFileStore, ResultsStore, ScoreMetrics, ScoreUpsert, Usage,
};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
}

fn req(bench: &str, count: usize, model: &str, top1: f64) -> ScoreUpsert {
    ScoreUpsert::new(
        bench,
        count,
        model,
        ScoreMetrics::new(top1, 0.9, 0.7),
        1_000,
        None,
    )
    .on(day(1))
}

fn file_store() -> (tempfile::TempDir, JsonFileStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("resources/data/leaderboard.json"));
    (dir, store)
}

fn check_distinct_keys(store: &dyn ResultsStore) {
    let keys = [
        ("gen1", 151, "openai/gpt-4o-mini"),
        ("gen1", 151, "google/gemini-2.5-flash"),
        ("gen2", 100, "openai/gpt-4o-mini"),
        ("gen3", 135, "z-ai/glm-4.5v"),
    ];
    for (i, (bench, count, model)) in keys.iter().enumerate() {
        store.upsert(&req(bench, *count, model, i as f64 / 10.0)).unwrap();
    }

    let rows = store.read_all().unwrap();
    assert_eq!(rows.len(), keys.len());
    let unique: HashSet<(String, String)> = rows
        .iter()
        .map(|r| (r.benchmark.clone(), r.model.clone()))
        .collect();
    assert_eq!(unique.len(), keys.len());
    assert_eq!(rows[0].model, "openai/gpt-4o-mini");
    assert_eq!(rows[3].benchmark, "PokeBench v1 (Gen3 135)");
}

fn check_same_key_latest_wins(store: &dyn ResultsStore) {
    store.upsert(&req("gen1", 151, "first/model", 0.1)).unwrap();
    store.upsert(&req("gen1", 151, "acme/vision-1", 0.2)).unwrap();
    store.upsert(&req("gen1", 151, "last/model", 0.3)).unwrap();

    let usage = Usage {
        prompt_tokens: 4_000,
        completion_tokens: 300,
        total_tokens: 4_300,
        input_images: Some(151),
    };
    let mut update = req("gen1", 151, "acme/vision-1", 0.654_321);
    update.duration_ms = 42;
    update.usage = Some(usage.clone());
    let out = store.upsert(&update.on(day(15))).unwrap();
    assert!(!out.inserted);
    assert_eq!(out.position, 1);

    let rows = store.read_all().unwrap();
    assert_eq!(rows.len(), 3);
    let row = &rows[1];
    assert_eq!(row.model, "acme/vision-1");
    assert_eq!(row.metrics.top1, 0.6543);
    assert_eq!(row.date, "2026-10-15");
    assert_eq!(row.duration_ms, 42);
    assert_eq!(row.usage.as_ref(), Some(&usage));

    // A later update without usage keeps the stored usage.
    store.upsert(&req("gen1", 151, "acme/vision-1", 0.5)).unwrap();
    let rows = store.read_all().unwrap();
    assert_eq!(rows[1].usage.as_ref(), Some(&usage));
    assert_eq!(rows[1].metrics.top1, 0.5);
}

#[test]
fn file_store_distinct_keys() {
    let (_dir, store) = file_store();
    check_distinct_keys(&store);
}

#[test]
fn memory_store_distinct_keys() {
    check_distinct_keys(&MemoryResultsStore::new());
}

#[test]
fn file_store_same_key_latest_wins() {
    let (_dir, store) = file_store();
    check_same_key_latest_wins(&store);
}

#[test]
fn memory_store_same_key_latest_wins() {
    check_same_key_latest_wins(&MemoryResultsStore::new());
}

#[test]
fn missing_and_corrupt_files_bootstrap_like_empty() {
    let cases: [Option<&[u8]>; 5] = [
        None,
        Some(&b""[..]),
        Some(&b"{{{ not json"[..]),
        Some(&b"   \n"[..]),
        Some(&[0xff, 0xfe, b'[', 0x80][..]),
    ];
    for content in cases {
        let (_dir, store) = file_store();
        if let Some(content) = content {
            std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
            std::fs::write(store.path(), content).unwrap();
        }

        assert!(store.read_all().unwrap().is_empty(), "case {content:?}");
        let out = store.upsert(&req("gen1", 151, "acme/vision-1", 0.8)).unwrap();
        assert!(out.inserted);
        assert_eq!(out.position, 0);

        let rows = store.read_all().unwrap();
        assert_eq!(rows.len(), 1, "case {content:?}");
        assert_eq!(rows[0].team, "PokeBenchAI");
        assert_eq!(rows[0].task, "T1");
    }
}

#[test]
fn non_utf8_file_is_replaced_by_best_effort_write() {
    let (_dir, store) = file_store();
    std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
    std::fs::write(store.path(), [0xff, 0xfe, b'[', 0x80]).unwrap();

    let out = upsert_best_effort(&store, &req("gen2", 100, "a/b", 0.5));
    assert!(out.is_some_and(|o| o.inserted));

    let raw = std::fs::read_to_string(store.path()).unwrap();
    assert!(raw.starts_with('['));
    assert_eq!(store.read_all().unwrap().len(), 1);
}

#[test]
fn legacy_rows_survive_rewrite() {
    let (_dir, store) = file_store();
    std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
    std::fs::write(
        store.path(),
        r#"[
    {"team": "PokeBenchAI", "model": "old/model", "benchmark": "PokeBench v1 (Gen1 151)",
     "task": "T1", "metrics": {"top1": 0.5, "top5": 0.6, "macro_f1": 0.4},
     "date": "2025-08-01", "duration_ms": 0, "usage": [], "link": "https://example.com/a/b"}
]"#,
    )
    .unwrap();

    store.upsert(&req("gen2", 100, "new/model", 0.3)).unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
    let rows = raw.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["link"], "https://example.com/a/b");
    assert_eq!(rows[0]["usage"], serde_json::json!([]));
    assert!(rows[1].get("usage").is_none());
}

#[test]
fn concurrent_writers_distinct_keys_lose_nothing() {
    const WRITERS: usize = 16;
    let (_dir, store) = file_store();
    let path = store.path().to_path_buf();

    std::thread::scope(|scope| {
        for i in 0..WRITERS {
            let path = path.clone();
            scope.spawn(move || {
                // Separate handle per writer, as separate processes would have.
                let store = JsonFileStore::new(&path);
                store
                    .upsert(&req("gen5", 156, &format!("vendor/model-{i}"), 0.5))
                    .unwrap();
            });
        }
    });

    let rows = store.read_all().unwrap();
    assert_eq!(rows.len(), WRITERS);
    let models: HashSet<String> = rows.iter().map(|r| r.model.clone()).collect();
    assert_eq!(models.len(), WRITERS);
}

#[test]
fn concurrent_writers_same_key_never_duplicate() {
    const WRITERS: usize = 8;
    let (_dir, store) = file_store();
    let store = Arc::new(store);

    std::thread::scope(|scope| {
        for i in 0..WRITERS {
            let store = Arc::clone(&store);
            scope.spawn(move || {
                store
                    .upsert(&req("gen4", 107, "shared/model", i as f64 / 100.0))
                    .unwrap();
            });
        }
    });

    let rows = store.read_all().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].model, "shared/model");
}

#[test]
fn best_effort_swallows_unwritable_location() {
    let dir = tempfile::tempdir().unwrap();
    // Parent "directory" is a regular file, so the lock file cannot be created.
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, "x").unwrap();
    let store = JsonFileStore::new(blocker.join("leaderboard.json"));

    assert!(store.upsert(&req("gen1", 151, "a/b", 0.1)).is_err());
    assert!(upsert_best_effort(&store, &req("gen1", 151, "a/b", 0.1)).is_none());
}

#[test]
fn best_effort_returns_outcome_on_success() {
    let store = MemoryResultsStore::new();
    let out = upsert_best_effort(&store, &req("gen1", 151, "a/b", 0.1)).unwrap();
    assert!(out.inserted);
    assert_eq!(out.benchmark, "PokeBench v1 (Gen1 151)");

    let failing = MemoryResultsStore::failing();
    assert!(upsert_best_effort(&failing, &req("gen1", 151, "a/b", 0.1)).is_none());
    assert_eq!(failing.upserts().len(), 1);
    assert!(failing.is_empty());
}
