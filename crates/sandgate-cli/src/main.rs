//! Sandgate CLI - sandboxed change validation
//!
//! Usage:
//!   sandgate init                     Write the default config into the repo
//!   sandgate run --patch <FILE>...    Validate a patch set and act on the result
//!   sandgate history                  Show recent validation runs
//!   sandgate probe                    Probe the configured live routes

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sandgate_checks::EndpointProbe;
use sandgate_core::{Decision, PatchSet, SandgateConfig};
use sandgate_pipeline::PipelineOrchestrator;
use sandgate_store::ResultStore;
use sandgate_vcs::{GitCommand, GitExecutor};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "sandgate")]
#[command(author, version, about = "Sandboxed change validation pipeline")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration into the repository
    Init {
        /// Repository path (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Validate a patch set: isolate, check, decide, record
    Run {
        /// Unified-diff file to apply (repeatable, applied in order)
        #[arg(short, long = "patch", value_name = "FILE", required = true)]
        patches: Vec<PathBuf>,

        /// Repository root (detected from the working directory if omitted)
        #[arg(long)]
        repo: Option<PathBuf>,

        /// Override the configured live-service base URL
        #[arg(long, value_name = "URL")]
        base_url: Option<String>,
    },

    /// Show recent validation runs
    History {
        /// Number of runs to show, newest first
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,

        /// Repository root (detected from the working directory if omitted)
        #[arg(long)]
        repo: Option<PathBuf>,
    },

    /// Probe the configured live routes without running a validation
    Probe {
        /// Repository root (detected from the working directory if omitted)
        #[arg(long)]
        repo: Option<PathBuf>,

        /// Override the configured live-service base URL
        #[arg(long, value_name = "URL")]
        base_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Init { path } => cmd_init(path).await,
        Commands::Run {
            patches,
            repo,
            base_url,
        } => cmd_run(patches, repo, base_url).await,
        Commands::History { count, repo } => cmd_history(count, repo).await,
        Commands::Probe { repo, base_url } => cmd_probe(repo, base_url).await,
    }
}

/// Resolve the repository root: explicit flag, or ask git
async fn resolve_repo(repo: Option<PathBuf>) -> Result<PathBuf> {
    match repo {
        Some(path) => Ok(path),
        None => {
            let git = GitCommand::detect()
                .await
                .context("Not in a git repository (use --repo)")?;
            Ok(git.repo_root().clone())
        }
    }
}

fn load_config(repo_root: &PathBuf, base_url: Option<String>) -> Result<SandgateConfig> {
    let mut config =
        SandgateConfig::load_or_default(repo_root).context("Failed to load configuration")?;
    if let Some(url) = base_url {
        config.probe.base_url = url;
    }
    Ok(config)
}

async fn cmd_init(path: PathBuf) -> Result<()> {
    SandgateConfig::write_default(&path).context("Failed to write default configuration")?;

    println!("Initialized Sandgate in {:?}", path);
    println!("Created:");
    println!("  .sandgate/config.toml");
    println!("\nEdit the config, then validate a change with:");
    println!("  sandgate run --patch <FILE>");

    Ok(())
}

async fn cmd_run(
    patches: Vec<PathBuf>,
    repo: Option<PathBuf>,
    base_url: Option<String>,
) -> Result<()> {
    for patch in &patches {
        if !patch.exists() {
            bail!("Patch file not found: {:?}", patch);
        }
    }

    let repo_root = resolve_repo(repo).await?;
    let config = load_config(&repo_root, base_url)?;
    let patch_set = PatchSet::from_files(patches);
    if patch_set.is_empty() {
        bail!("No patches to validate");
    }

    info!(
        "Validating {} patch(es) against {:?}",
        patch_set.patches.len(),
        repo_root
    );

    let mut pipeline = PipelineOrchestrator::new(&repo_root, config);
    let record = pipeline.run_validation(patch_set).await?;

    println!("Run:        {}", record.run_id);
    println!("Workspace:  {}", record.workspace);
    println!(
        "Tests:      {} passed, {} failed",
        record.tests.passed, record.tests.failed
    );
    if let Some(coverage) = record.coverage {
        println!("Coverage:   {:.0}%", coverage * 100.0);
    }
    println!(
        "Lint:       {}",
        if record.lint.success {
            "clean".to_string()
        } else {
            format!("{} unresolved issue(s)", record.lint.total_issues())
        }
    );
    println!(
        "Endpoints:  {}/{} reachable",
        record.endpoints.reachable_count(),
        record.endpoints.routes.len()
    );
    println!("Confidence: {:.2}", record.confidence);
    println!("Decision:   {}", record.decision);

    if !record.error_log.is_empty() {
        println!("Errors:");
        for err in &record.error_log {
            println!("  - {}", err);
        }
    }

    // Reverted changes signal failure to calling automation
    if record.decision == Decision::Revert {
        std::process::exit(1);
    }

    Ok(())
}

async fn cmd_history(count: usize, repo: Option<PathBuf>) -> Result<()> {
    let repo_root = resolve_repo(repo).await?;
    let config = load_config(&repo_root, None)?;
    let store = ResultStore::new(repo_root.join(&config.store_path));

    let records = store.recent(count).await?;
    if records.is_empty() {
        println!("No validation runs recorded yet");
        return Ok(());
    }

    println!(
        "{:<22} {:<8} {:>10}  {:<40}",
        "TIMESTAMP", "DECISION", "CONFIDENCE", "WORKSPACE"
    );
    for record in records {
        println!(
            "{:<22} {:<8} {:>10.2}  {:<40}",
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            record.decision.to_string(),
            record.confidence,
            record.workspace
        );
    }

    Ok(())
}

async fn cmd_probe(repo: Option<PathBuf>, base_url: Option<String>) -> Result<()> {
    let repo_root = resolve_repo(repo).await?;
    let config = load_config(&repo_root, base_url)?;

    println!("Probing {}", config.probe.base_url);

    let probe = EndpointProbe::from_config(&config.probe);
    let outcome = probe.run(&config.probe.routes).await;

    for route in &outcome.routes {
        println!("  {} {:<30} {:?}", route.method, route.path, route.status);
    }
    println!(
        "{}/{} reachable, {}",
        outcome.reachable_count(),
        outcome.routes.len(),
        if outcome.success { "ok" } else { "failing" }
    );

    Ok(())
}
