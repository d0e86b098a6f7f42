use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

use reps_directory::config::DirectoryConfig;
use reps_directory::constants::{CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};
use reps_directory::logging;
use reps_directory::observability::metrics;
use reps_directory::pipeline::processing::diagnostics::Diagnostics;
use reps_directory::pipeline::processing::normalize::extract_handle;
use reps_directory::pipeline::processing::overrides::OverrideSet;
use reps_directory::pipeline::Pipeline;
use reps_directory::sources;

#[derive(Parser)]
#[command(name = "reps_directory")]
#[command(about = "Reconcile political representative records into one directory")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge every configured source, apply overrides, and write the directory
    Merge {
        /// Config file (defaults to $REPS_CONFIG, then directory.toml)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Output file, overriding the configured one
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the canonical handle for a URL or handle string
    CheckHandle {
        value: String,
    },
    /// Quote bare `"xHandle": @name` values so a hand-edited file parses
    RepairHandles {
        #[arg(long)]
        input: PathBuf,
        /// Defaults to rewriting the input in place
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn config_path(flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn run_merge(config: Option<PathBuf>, output: Option<PathBuf>) -> Result<()> {
    let path = config_path(config);
    let config = DirectoryConfig::load(&path)
        .with_context(|| format!("Failed to load config {}", path.display()))?;

    let prometheus = match config.metrics_output {
        Some(_) => Some(metrics::init()?),
        None => None,
    };

    let mut diagnostics = Diagnostics::new();
    let mut batches = Vec::with_capacity(config.sources.len());
    for source in &config.sources {
        let batch = sources::load_source(source, &mut diagnostics)
            .with_context(|| format!("Failed to load source '{}'", source.profile.name))?;
        batches.push(batch);
    }

    let overrides = match &config.overrides {
        Some(path) => {
            let value = sources::read_json(path)
                .with_context(|| format!("Failed to read overrides {}", path.display()))?;
            Some(OverrideSet::from_json(value, &mut diagnostics)?)
        }
        None => None,
    };

    let result = Pipeline::run(&batches, overrides.as_ref(), diagnostics);

    let output_path = output.unwrap_or(config.output);
    let json = serde_json::to_string_pretty(&result.records)?;
    fs::write(&output_path, json).with_context(|| format!("Failed to write {}", output_path.display()))?;
    info!(path = %output_path.display(), records = result.records.len(), "Wrote directory");

    println!("\n📊 Directory run:");
    println!("   Raw records: {}", result.summary.raw_records);
    println!("   Unique records: {}", result.summary.unique_records);
    println!("   Records with X: {}", result.summary.with_x);
    println!("   Overrides applied: {} ({} new)", result.summary.overrides_applied, result.summary.stubs_created);
    println!("   Output file: {}", output_path.display());

    if !result.diagnostics.is_empty() {
        warn!("{} diagnostics recorded during the run", result.diagnostics.len());
        println!("\n⚠️  Diagnostics:");
        for (kind, count) in &result.summary.diagnostics_by_kind {
            println!("   - {}: {}", kind, count);
        }
    }
    if !result.summary.unmapped_party_labels.is_empty() {
        println!("\nUnmapped party labels: {}", result.summary.unmapped_party_labels.join(", "));
    }

    if let (Some(handle), Some(path)) = (prometheus, config.metrics_output.as_ref()) {
        fs::write(path, handle.render()).with_context(|| format!("Failed to write metrics {}", path.display()))?;
    }
    Ok(())
}

fn run_repair(input: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let text = fs::read_to_string(&input).with_context(|| format!("Failed to read {}", input.display()))?;
    let repaired = sources::repair::repair_unquoted_handles(&text);
    serde_json::from_str::<serde_json::Value>(&repaired)
        .with_context(|| format!("{} is still not valid JSON after repair", input.display()))?;

    let target = output.unwrap_or(input);
    fs::write(&target, repaired.as_bytes()).with_context(|| format!("Failed to write {}", target.display()))?;
    println!("✅ Wrote {}", target.display());
    Ok(())
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    match cli.command {
        Commands::Merge { config, output } => run_merge(config, output),
        Commands::CheckHandle { value } => {
            match extract_handle(&value) {
                Some(handle) => println!("{}", handle),
                None => println!("null"),
            }
            Ok(())
        }
        Commands::RepairHandles { input, output } => run_repair(input, output),
    }
}
