#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use hfcache::cache::{clean, format_bytes, stats, CacheInspector, CacheLayout, CacheReport};
use hfcache::config::Config;
use hfcache::error::{CacheError, Result};
use hfcache::manifest::{self, ManifestEntry};
use hfcache::sync::{HubFetcher, Outcome, Synchronizer};
use hfcache::token;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hfcache")]
#[command(about = "HuggingFace cache manager for offline HPC clusters", long_about = None)]
struct Cli {
    /// Cache root override (wins over config.toml and HF_HOME)
    #[arg(long, global = true)]
    cache_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download a model snapshot into the hub cache
    DownloadModel {
        /// Model identifier (e.g. Qwen/Qwen2.5-0.5B)
        model: String,
        /// Git revision / branch / tag
        #[arg(long, default_value = "main")]
        revision: String,
        /// File patterns to skip (e.g. '*.bin' '*.gguf')
        #[arg(long, num_args = 1..)]
        ignore_patterns: Vec<String>,
    },
    /// Download a dataset into the datasets cache
    DownloadDataset {
        /// Dataset identifier (e.g. trl-lib/Capybara)
        dataset: String,
        /// Configuration / subset name
        #[arg(long)]
        config: Option<String>,
        /// Specific split (train, test, ...)
        #[arg(long)]
        split: Option<String>,
    },
    /// Batch download models & datasets from a manifest file
    DownloadFromFile {
        /// Manifest file listing models and datasets (see demos/)
        file: PathBuf,
        /// Only print what would be downloaded
        #[arg(long)]
        dry_run: bool,
    },
    /// Show cache status
    Status {
        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },
    /// Check whether a model (and optionally a dataset) can load offline
    Verify {
        /// Model id or local checkpoint path
        model: String,
        /// Optional dataset to check
        #[arg(long)]
        dataset: Option<String>,
    },
    /// Remove stale locks and incomplete downloads
    Clean {
        /// Only show what would be deleted
        #[arg(long)]
        dry_run: bool,
    },
    /// Find local models (safetensors) in a directory
    ListLocal { directory: PathBuf },
    /// Check the HuggingFace token
    Login,
    /// Print shell-exportable HF_* environment variables
    Setup {
        /// Enable offline mode (for compute nodes)
        #[arg(long)]
        offline: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::load()?;
    let root = match &cli.cache_root {
        Some(root) => root.clone(),
        None => config.resolve_root()?,
    };
    let layout = CacheLayout::new(root);

    match cli.command {
        Commands::DownloadModel {
            model,
            revision,
            ignore_patterns,
        } => run_download_model(&config, layout, &model, &revision, ignore_patterns).await,
        Commands::DownloadDataset {
            dataset,
            config: ds_config,
            split,
        } => run_download_dataset(&config, layout, dataset, ds_config, split).await,
        Commands::DownloadFromFile { file, dry_run } => {
            run_download_from_file(&config, layout, &file, dry_run).await
        }
        Commands::Status { json } => run_status(&layout, json),
        Commands::Verify { model, dataset } => run_verify(&layout, &model, dataset.as_deref()),
        Commands::Clean { dry_run } => run_clean(&layout, dry_run),
        Commands::ListLocal { directory } => run_list_local(&directory),
        Commands::Login => run_login().await,
        Commands::Setup { offline } => run_setup(&layout, offline),
    }
}

async fn run_download_model(
    config: &Config,
    layout: CacheLayout,
    model: &str,
    revision: &str,
    ignore_patterns: Vec<String>,
) -> Result<()> {
    layout.ensure()?;
    let fetcher =
        HubFetcher::new(&layout, token::resolve_token())?.with_ignore_patterns(ignore_patterns);
    let sync = Synchronizer::new(&config.sync, layout, fetcher);

    let entry = ManifestEntry::Model {
        identifier: model.to_string(),
    };
    match sync.sync_one(&entry, revision).await? {
        Outcome::AlreadyCached => println!("✓ Model already cached: {model}"),
        Outcome::Acquired => println!("✓ Model cached: {model}"),
        Outcome::Failed(e) => {
            eprintln!("✗ {e}");
            std::process::exit(1);
        }
    }
    Ok(())
}

async fn run_download_dataset(
    config: &Config,
    layout: CacheLayout,
    dataset: String,
    ds_config: Option<String>,
    split: Option<String>,
) -> Result<()> {
    layout.ensure()?;
    let fetcher = HubFetcher::new(&layout, token::resolve_token())?;
    let sync = Synchronizer::new(&config.sync, layout, fetcher);

    let entry = ManifestEntry::Dataset {
        identifier: dataset,
        config: ds_config,
        split,
    };
    match sync.sync_one(&entry, hfcache::sync::DEFAULT_REVISION).await? {
        Outcome::AlreadyCached => println!("✓ Already cached: {entry}"),
        Outcome::Acquired => println!("✓ Cached: {entry}"),
        Outcome::Failed(e) => {
            eprintln!("✗ {e}");
            std::process::exit(1);
        }
    }
    Ok(())
}

async fn run_download_from_file(
    config: &Config,
    layout: CacheLayout,
    file: &PathBuf,
    dry_run: bool,
) -> Result<()> {
    if !file.exists() {
        return Err(CacheError::NotFound(format!(
            "manifest file not found: {}",
            file.display()
        )));
    }
    let text = std::fs::read_to_string(file)?;

    // Parse up front so every manifest mistake surfaces before any fetch
    let entries = manifest::parse(&text)?;

    if dry_run {
        println!("Dry run - would download:");
        for entry in &entries {
            println!("   {entry}");
        }
        return Ok(());
    }

    let fetcher = HubFetcher::new(&layout, token::resolve_token())?;
    let sync = Synchronizer::new(&config.sync, layout, fetcher).with_progress(true);
    let summary = sync.sync_entries(entries).await?;

    for (entry, outcome) in &summary.outcomes {
        match outcome {
            Outcome::AlreadyCached => println!("- {entry}: already cached"),
            Outcome::Acquired => println!("✓ {entry}: downloaded"),
            Outcome::Failed(e) => println!("✗ {entry}: {e}"),
        }
    }
    println!(
        "\nBatch complete: {} downloaded, {} already cached, {} failed",
        summary.acquired(),
        summary.skipped(),
        summary.failed()
    );

    if !summary.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn run_status(layout: &CacheLayout, json: bool) -> Result<()> {
    layout.ensure()?;
    let report = CacheReport::scan(layout)?;

    if json {
        let rendered = serde_json::to_string_pretty(&report)
            .map_err(|e| CacheError::Config(format!("Failed to serialize report: {e}")))?;
        println!("{rendered}");
        return Ok(());
    }

    println!("Cache status");
    println!("   HF_HOME  : {}", report.root.display());
    println!("   Models   : {}", format_bytes(report.hub_size));
    println!("   Datasets : {}", format_bytes(report.datasets_size));
    println!("   Total    : {}", format_bytes(report.total_size()));

    if !report.models.is_empty() {
        println!("\n   Cached models ({}):", report.models.len());
        for model in &report.models {
            println!("     • {}  ({})", model.name, format_bytes(model.size_bytes));
        }
    }

    if !report.datasets.is_empty() {
        println!("\n   Cached datasets ({}):", report.datasets.len());
        for dataset in &report.datasets {
            println!(
                "     • {}  ({})",
                dataset.name,
                format_bytes(dataset.size_bytes)
            );
        }
    }

    if report.stale_locks > 0 {
        println!("\n   ⚠ {} stale lock file(s) found", report.stale_locks);
        println!("     Run: hfcache clean");
    }

    Ok(())
}

fn run_verify(layout: &CacheLayout, model: &str, dataset: Option<&str>) -> Result<()> {
    layout.ensure()?;
    let inspector = CacheInspector::new(layout);
    let mut ok = true;

    match inspector.verify_model(model) {
        hfcache::cache::Readiness::Ready => println!("✓ Model ready: {model}"),
        hfcache::cache::Readiness::NotReady { reason } => {
            println!("✗ Model not ready: {model} ({reason})");
            println!("   Run: hfcache download-model {model}");
            ok = false;
        }
    }

    if let Some(dataset) = dataset {
        match inspector.verify_dataset(dataset) {
            hfcache::cache::Readiness::Ready => println!("✓ Dataset ready: {dataset}"),
            hfcache::cache::Readiness::NotReady { reason } => {
                println!("✗ Dataset not ready: {dataset} ({reason})");
                println!("   Run: hfcache download-dataset {dataset}");
                ok = false;
            }
        }
    }

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

fn run_clean(layout: &CacheLayout, dry_run: bool) -> Result<()> {
    layout.ensure()?;
    let report = clean(layout, dry_run)?;

    if report.is_clean() {
        println!("✓ Cache is clean - nothing to remove.");
        return Ok(());
    }

    let prefix = if dry_run { "[DRY RUN] " } else { "" };
    if !report.locks.is_empty() {
        println!("Lock files ({}):", report.locks.len());
        for lock in &report.locks {
            println!("   {prefix}rm {}", lock.display());
        }
    }
    if !report.incomplete.is_empty() {
        println!("Incomplete downloads ({}):", report.incomplete.len());
        for partial in &report.incomplete {
            println!("   {prefix}rm {}", partial.display());
        }
    }
    if !report.misplaced_datasets.is_empty() {
        println!(
            "Misplaced datasets in hub/ ({}):",
            report.misplaced_datasets.len()
        );
        for dir in &report.misplaced_datasets {
            println!("   {prefix}rm -rf {}", dir.display());
        }
    }

    let action = if dry_run { "would be" } else { "were" };
    println!("\n{} item(s) {action} cleaned.", report.total());
    Ok(())
}

fn run_list_local(directory: &PathBuf) -> Result<()> {
    if !directory.exists() {
        return Err(CacheError::NotFound(format!(
            "directory does not exist: {}",
            directory.display()
        )));
    }

    let found = stats::find_local_models(directory);
    if found.is_empty() {
        println!("No safetensors models found under {}", directory.display());
    } else {
        println!("Found {} model(s) under {}:", found.len(), directory.display());
        for model in found {
            println!("   • {}", model.display());
        }
    }
    Ok(())
}

async fn run_login() -> Result<()> {
    let Some(token) = token::resolve_token() else {
        eprintln!("No HuggingFace token found.");
        eprintln!("Set HF_TOKEN, or run: huggingface-cli login");
        eprintln!("Get a token at: https://huggingface.co/settings/tokens");
        std::process::exit(1);
    };

    match token::validate_token(&token).await {
        Ok(identity) => {
            println!("✓ Token validated");
            println!("   Logged in as : {}", identity.name);
            println!(
                "   Token type   : {}",
                identity.kind.as_deref().unwrap_or("unknown")
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Token validation failed: {e}");
            std::process::exit(1);
        }
    }
}

fn run_setup(layout: &CacheLayout, offline: bool) -> Result<()> {
    layout.ensure()?;
    println!("# Copy-paste or eval these in your shell:");
    for (key, value) in layout.environment(offline) {
        println!("export {key}={value}");
    }
    Ok(())
}
