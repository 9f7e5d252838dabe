//! `scrapeloom` CLI: a thin front-end that loads a job config, runs one
//! engine, and prints the final summary line. The dashboard, richer
//! reporting and log configuration beyond `RUST_LOG` are external
//! collaborators, not this binary's concern.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use scrapeloom::{convert, Engine, JobConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "scrapeloom", about = "Configuration-driven web data extraction engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a scrape job from a JSON config file.
    Run {
        config: PathBuf,
        #[arg(long, default_value = "output.jsonl")]
        output: PathBuf,
        #[arg(long, default_value = "data")]
        bloom_dir: PathBuf,
        #[arg(long)]
        stats: bool,
    },
    /// Convert a JSONL sink file into JSON or CSV, by output extension.
    Convert { input: PathBuf, output: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config,
            output,
            bloom_dir,
            stats,
        } => run(&config, &output, &bloom_dir, stats).await,
        Command::Convert { input, output } => convert_file(&input, &output).await,
    }
}

async fn run(config_path: &PathBuf, output: &PathBuf, bloom_dir: &PathBuf, print_stats: bool) -> Result<()> {
    let raw = tokio::fs::read_to_string(config_path)
        .await
        .with_context(|| format!("failed to read config file {}", config_path.display()))?;
    let config: JobConfig = serde_json::from_str(&raw).context("failed to parse job config")?;

    let engine = Engine::new(config, bloom_dir.clone(), output.clone()).context("invalid job config")?;
    let report = engine.run().await.map_err(anyhow::Error::from)?;

    println!(
        "done: {} pages ok, {} errors, {} skipped, {} blocked, {} entries written, {} failed urls",
        report.stats.page_success,
        report.stats.page_error,
        report.stats.page_skipped,
        report.stats.blocked,
        report.stats.entries_added,
        report.failed_urls.len(),
    );
    if print_stats {
        for url in &report.failed_urls {
            println!("failed: {url}");
        }
    }
    Ok(())
}

async fn convert_file(input: &PathBuf, output: &PathBuf) -> Result<()> {
    let extension = output.extension().and_then(|e| e.to_str()).unwrap_or_default();
    let count = match extension {
        "json" => convert::jsonl_to_json(input, output).await,
        "csv" => convert::jsonl_to_csv(input, output).await,
        other => bail!("unsupported output extension '{other}', expected .json or .csv"),
    }
    .with_context(|| format!("conversion of {} to {} failed", input.display(), output.display()))?;

    println!("converted {count} records into {}", output.display());
    Ok(())
}
