//! probekit - runs the configured API polling checks once
//!
//! - Reads the agent config (TOML) and every `conf.d/<check>.yaml`
//! - Runs each configured instance sequentially
//! - Publishes one JSON submission per run on stdout or MQTT

mod config;
mod publish;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::{AgentConfig, Output};
use probekit_base::{load_check_file, run_check, Aggregator, Submission};
use probekit_checks::{build_check, CHECK_NAMES};
use publish::Publisher;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "probekit", version, about = "API polling checks for an observability agent")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run every configured check instance once
    Run {
        /// Agent config file (default: <config dir>/probekit/agent.toml)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Only run this check
        #[arg(long)]
        check: Option<String>,
        /// Override the configured output
        #[arg(long, value_enum)]
        output: Option<Output>,
    },
    /// List the available checks
    List,
}

/// `*.yaml` / `*.yml` files of `dir`, sorted, optionally restricted to one check
async fn discover_check_files(dir: &Path, only: Option<&str>) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("Cannot read check directory {}", dir.display()))?;

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("Cannot list {}", dir.display()))?
    {
        let path = entry.path();
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        if !is_yaml {
            continue;
        }
        if let Some(name) = only {
            if path.file_stem().and_then(|s| s.to_str()) != Some(name) {
                continue;
            }
        }
        files.push(path);
    }
    files.sort();
    Ok(files)
}

/// Run every instance of one check file
async fn run_check_file(path: &Path) -> Result<Vec<Submission>> {
    let (name, file) = load_check_file(path)
        .await
        .with_context(|| format!("Invalid check file {}", path.display()))?;

    if file.instances.is_empty() {
        warn!("{} has no instances", path.display());
    }

    let mut submissions = Vec::with_capacity(file.instances.len());
    for (index, instance) in file.instances.iter().enumerate() {
        let submission = match build_check(&name, instance) {
            Ok(mut check) => run_check(check.as_mut()).await,
            Err(e) => {
                error!("Cannot configure {} instance #{}: {}", name, index, e);
                Aggregator::new(name.as_str(), name.as_str())
                    .into_submission(format!("#{}", index), Some(e.to_string()))
            }
        };
        submissions.push(submission);
    }
    Ok(submissions)
}

async fn run(config_path: Option<PathBuf>, only: Option<String>, output: Option<Output>) -> Result<()> {
    let mut config = AgentConfig::load(config_path.as_deref())
        .await
        .context("Failed to load agent config")?;
    if let Some(output) = output {
        config.output = output;
    }

    let files = discover_check_files(&config.confd_dir, only.as_deref()).await?;
    if files.is_empty() {
        match only {
            Some(name) => anyhow::bail!("No configuration for check {} in {}", name, config.confd_dir.display()),
            None => warn!("No check configured in {}", config.confd_dir.display()),
        }
    }

    let mut publisher = Publisher::new(config.output, &config.mqtt);
    let mut stats = RunStats::default();
    for path in &files {
        let submissions = run_check_file(path).await?;
        publish_all(&mut publisher, &submissions, &mut stats).await;
    }
    if let Err(e) = publisher.close().await {
        warn!("{:#}", e);
    }

    info!(
        "{} check runs, {} reported an error, {} could not be published",
        stats.total, stats.failed, stats.unpublished
    );
    if stats.total > 0 && stats.unpublished == stats.total {
        anyhow::bail!("No submission could be published");
    }
    Ok(())
}

#[derive(Debug, Default)]
struct RunStats {
    total: usize,
    failed: usize,
    unpublished: usize,
}

/// Publish every submission; a failed publish is logged and does not stop the others
async fn publish_all(publisher: &mut Publisher, submissions: &[Submission], stats: &mut RunStats) {
    for submission in submissions {
        stats.total += 1;
        if submission.error.is_some() {
            stats.failed += 1;
        }
        if let Err(e) = publisher.publish(submission).await {
            error!("Failed to publish {} submission for {}: {:#}", submission.check, submission.instance, e);
            stats.unpublished += 1;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("probekit=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Run { config, check, output } => run(config, check, output).await,
        Command::List => {
            for name in CHECK_NAMES {
                println!("{}", name);
            }
            Ok(())
        }
    }
}
