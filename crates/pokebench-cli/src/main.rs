//! PokeBench CLI
//!
//! The `pokebench` command runs vision models against the PokeBench
//! generation benchmarks and maintains the shared leaderboard file.
//!
//! ## Commands
//!
//! - `run`: one model on one benchmark, then update the leaderboard
//! - `run-all`: every roster model on one benchmark, concurrently
//! - `leaderboard`: list recorded results or per-model averages
//! - `benchmarks`: list the available benchmarks

mod report;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use pokebench_core::{init_tracing, Benchmark, ImageMode, PokeBenchConfig, METRICS};
use pokebench_runner::{
    BatchRequest, BatchRunOrchestrator, ConsoleSink, ProcessInvoker, RunRequest,
    SingleRunOrchestrator,
};
use pokebench_store::{
    compute_model_averages, records_for_benchmark, JsonFileStore, ResultsStore,
};
use tracing::{debug, Level};

#[derive(Parser)]
#[command(name = "pokebench")]
#[command(author = "PokeBenchAI")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "PokeBench vision-model benchmark runner", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Project root (scripts, benchmarks and leaderboard resolve from here)
    #[arg(long, global = true, env = "POKEBENCH_ROOT")]
    root: Option<PathBuf>,

    /// Leaderboard JSON file
    #[arg(long, global = true, env = "POKEBENCH_LEADERBOARD")]
    leaderboard: Option<PathBuf>,

    /// Directory holding the gen1..gen9 benchmark folders
    #[arg(long, global = true, env = "POKEBENCH_BENCHMARKS_DIR")]
    benchmarks_dir: Option<PathBuf>,

    /// Interpreter used for the prediction and scoring scripts
    #[arg(long, global = true, env = "POKEBENCH_PYTHON")]
    python: Option<String>,

    /// Give up waiting for the leaderboard lock after this many seconds
    #[arg(long, global = true, env = "POKEBENCH_LOCK_TIMEOUT_SECS")]
    lock_timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one model on one benchmark and update the leaderboard
    Run {
        /// Benchmark slug (gen1..gen9)
        #[arg(long, default_value = "gen1")]
        bench: String,

        /// Provider model id, e.g. openai/gpt-4o-mini
        #[arg(long)]
        model: Option<String>,

        /// How images reach the provider (url or base64)
        #[arg(long, default_value = "base64")]
        image_mode: String,

        /// Keep going when individual images fail
        #[arg(long)]
        tolerant: bool,
    },

    /// Run every roster model on one benchmark in parallel
    RunAll {
        /// Benchmark slug (gen1..gen9)
        benchmark: Option<String>,

        /// How images reach the provider (url or base64)
        #[arg(long, default_value = "base64")]
        image_mode: String,

        /// Keep going when individual images fail
        #[arg(long)]
        tolerant: bool,

        /// Run these models instead of the default roster (repeatable)
        #[arg(long = "model")]
        models: Vec<String>,
    },

    /// Show recorded results
    Leaderboard {
        /// Only rows for this benchmark (gen1..gen9)
        #[arg(long)]
        bench: Option<String>,

        /// Rank models by their average scores instead
        #[arg(long)]
        averages: bool,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// List the available benchmarks
    Benchmarks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    let config = load_config(&cli)?;
    debug!(root = %config.root.display(), leaderboard = %config.leaderboard_path.display(), "configuration loaded");

    let result = match cli.command {
        Commands::Run {
            bench,
            model,
            image_mode,
            tolerant,
        } => cmd_run(config, &bench, model.as_deref(), &image_mode, tolerant).await,
        Commands::RunAll {
            benchmark,
            image_mode,
            tolerant,
            models,
        } => cmd_run_all(config, benchmark.as_deref(), &image_mode, tolerant, models).await,
        Commands::Leaderboard {
            bench,
            averages,
            format,
        } => cmd_leaderboard(&config, bench.as_deref(), averages, format),
        Commands::Benchmarks => cmd_benchmarks(&config),
    };

    METRICS.flush();
    result
}

/// `POKEBENCH_*` environment, with command-line flags taking precedence.
fn load_config(cli: &Cli) -> Result<PokeBenchConfig> {
    let path = |p: &Option<PathBuf>| p.as_ref().map(|p| p.to_string_lossy().into_owned());
    let overrides: Vec<(&str, Option<String>)> = vec![
        ("POKEBENCH_ROOT", path(&cli.root)),
        ("POKEBENCH_LEADERBOARD", path(&cli.leaderboard)),
        ("POKEBENCH_BENCHMARKS_DIR", path(&cli.benchmarks_dir)),
        ("POKEBENCH_PYTHON", cli.python.clone()),
        (
            "POKEBENCH_LOCK_TIMEOUT_SECS",
            cli.lock_timeout_secs.map(|s| s.to_string()),
        ),
    ];

    PokeBenchConfig::from_lookup(|key| {
        overrides
            .iter()
            .find(|(k, _)| *k == key)
            .and_then(|(_, v)| v.clone())
            .or_else(|| std::env::var(key).ok())
    })
    .context("Invalid PokeBench configuration")
}

fn open_store(config: &PokeBenchConfig) -> JsonFileStore {
    JsonFileStore::new(&config.leaderboard_path).with_lock_timeout(config.lock_timeout)
}

fn single_orchestrator(config: PokeBenchConfig) -> SingleRunOrchestrator {
    let store = Arc::new(open_store(&config));
    let invoker = Arc::new(ProcessInvoker::new(&config));
    SingleRunOrchestrator::new(Arc::new(config), invoker, store)
}

fn print_benchmarks() {
    println!("Available benchmarks:");
    for bench in Benchmark::all() {
        println!("   - {}: {}", bench, bench.description());
    }
}

/// Run one model on one benchmark
async fn cmd_run(
    config: PokeBenchConfig,
    bench: &str,
    model: Option<&str>,
    image_mode: &str,
    tolerant: bool,
) -> Result<()> {
    let image_mode: ImageMode = image_mode.parse()?;
    let leaderboard = config.leaderboard_path.clone();
    let orchestrator = single_orchestrator(config);

    let req = RunRequest::new(bench, model.unwrap_or_default())
        .with_image_mode(image_mode)
        .tolerant(tolerant);

    match orchestrator.run(&req, &ConsoleSink).await {
        Ok(outcome) => {
            if outcome.stored.is_none() {
                println!(
                    "Warning: leaderboard {} was not updated",
                    leaderboard.display()
                );
            }
            println!("{}", outcome.summary_line());
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ {}", e);
            if let Some(hint) = e.hint() {
                println!("{}", hint);
            }
            anyhow::bail!("Benchmark run failed")
        }
    }
}

/// Run the roster on one benchmark
async fn cmd_run_all(
    config: PokeBenchConfig,
    benchmark: Option<&str>,
    image_mode: &str,
    tolerant: bool,
    models: Vec<String>,
) -> Result<()> {
    let Some(benchmark) = benchmark else {
        print_benchmarks();
        anyhow::bail!("Missing benchmark argument");
    };
    if benchmark.parse::<Benchmark>().is_err() {
        eprintln!("✗ Invalid benchmark: {}", benchmark);
        print_benchmarks();
        anyhow::bail!("Invalid benchmark: {}", benchmark);
    }
    let image_mode: ImageMode = image_mode.parse()?;

    let batch = BatchRunOrchestrator::new(single_orchestrator(config));
    let req = BatchRequest::new(benchmark)
        .with_models(models)
        .with_image_mode(image_mode)
        .tolerant(tolerant);

    println!("Executing all models in parallel...");
    println!();
    let result = batch
        .run(&req, Arc::new(ConsoleSink))
        .await
        .context("Batch run could not start")?;

    println!();
    for outcome in &result.outcomes {
        match &outcome.error {
            None => match &outcome.summary {
                Some(summary) => println!("  ✓ {} ({})", outcome.model, summary),
                None => println!("  ✓ {}", outcome.model),
            },
            Some(error) => {
                println!("  ✗ {}: {}", outcome.model, error);
                if let Some(hint) = &outcome.hint {
                    println!("      {}", hint);
                }
            }
        }
    }
    if !result.bench.is_legacy() {
        println!();
        println!("Reconciled {} score files into the leaderboard", result.reconciled);
    }
    println!();
    println!(
        "Summary: {}/{} models passed",
        result.passed_count(),
        result.outcomes.len()
    );

    if result.success {
        println!("\n✓ All benchmark runs completed successfully!");
        Ok(())
    } else {
        anyhow::bail!("Some benchmark runs failed. Check the output above for details.")
    }
}

/// Print leaderboard rows or per-model averages
fn cmd_leaderboard(
    config: &PokeBenchConfig,
    bench: Option<&str>,
    averages: bool,
    format: OutputFormat,
) -> Result<()> {
    print!("{}", leaderboard_output(config, bench, averages, format)?);
    Ok(())
}

fn leaderboard_output(
    config: &PokeBenchConfig,
    bench: Option<&str>,
    averages: bool,
    format: OutputFormat,
) -> Result<String> {
    let store = open_store(config);
    let mut records = store
        .read_all()
        .context(format!("Failed to read leaderboard {}", store.path().display()))?;

    if let Some(bench) = bench {
        let bench: Benchmark = bench.parse()?;
        records = records_for_benchmark(&records, bench);
    }

    if records.is_empty() && format == OutputFormat::Table {
        return Ok(format!(
            "No results recorded in {}\n",
            store.path().display()
        ));
    }

    let out = if averages {
        let averages = compute_model_averages(&records);
        match format {
            OutputFormat::Json => serde_json::to_string_pretty(&averages)? + "\n",
            OutputFormat::Table => report::render_averages(&averages),
        }
    } else {
        match format {
            OutputFormat::Json => serde_json::to_string_pretty(&records)? + "\n",
            OutputFormat::Table => report::render_records(&records),
        }
    };
    Ok(out)
}

/// List benchmarks and whether their assets are present
fn cmd_benchmarks(config: &PokeBenchConfig) -> Result<()> {
    for bench in Benchmark::all() {
        let assets = bench.assets(&config.benchmarks_dir);
        let status = if assets.ensure_exists().is_ok() {
            format!("{} items", assets.item_count())
        } else {
            "missing".to_string()
        };
        let legacy = if bench.is_legacy() { " [legacy]" } else { "" };
        println!(
            "{}: {} ({}){}",
            bench,
            bench.description(),
            status,
            legacy
        );
    }
    Ok(())
}
