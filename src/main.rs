use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use scanwatch::core::{ExportFormat, ScanJob, TrackerError, export};
use scanwatch::{cli, config, context, logging};
use serde::Serialize;

const TUI_LOG_FILE: &str = "scanwatch.log";

#[derive(Parser)]
#[command(name = "scanwatch")]
#[command(about = "Submit domain scans and track them until results arrive", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    settings: Settings,

    /// Config file (default: ./scanwatch.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive terminal UI (default)
    Tui {
        /// Directory export files are written to
        #[arg(long, default_value = ".")]
        export_dir: PathBuf,
    },
    /// Submit a domain for scanning
    Submit {
        domain: String,
        /// Poll until the scan finishes and print its result
        #[arg(long)]
        wait: bool,
    },
    /// Show the current state of one scan
    Status { id: String },
    /// List every scan the service knows about
    List,
    /// Write every scan the service knows about to a file
    Export {
        #[arg(long, short)]
        output: PathBuf,
        /// Defaults to the output file's extension, then CSV
        #[arg(long, value_enum)]
        format: Option<ExportFormat>,
    },
    /// Print the effective configuration
    Config,
}

/// Command line overrides, layered over the config file and environment.
#[derive(Args, Serialize)]
struct Settings {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    server_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    poll_interval_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    request_timeout_secs: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    max_poll_attempts: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    max_pending_secs: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    simulation: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    verbose: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    json_logs: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Tui {
        export_dir: PathBuf::from("."),
    });

    let config = config::AppConfig::from_path(cli.config, Some(&cli.settings))
        .context("Failed to load configuration")?;

    let log_file = match (&command, &config.log_file) {
        (_, Some(path)) => Some(path.clone()),
        (Commands::Tui { .. }, None) => Some(PathBuf::from(TUI_LOG_FILE)),
        _ => None,
    };
    logging::init(logging::LogConfig {
        json: config.json_logs,
        verbose: config.verbose,
        file: log_file,
    })?;

    if let Commands::Config = command {
        print!("{}", config.to_toml().context("Failed to render configuration")?);
        return Ok(());
    }

    let ctx = context::AppContext::new(config)?;

    match command {
        Commands::Tui { export_dir } => cli::tui::run(ctx, export_dir)
            .await
            .context("Terminal UI failed")?,
        Commands::Submit { domain, wait } => run_submit(ctx, &domain, wait)
            .await
            .context("Failed to submit scan")?,
        Commands::Status { id } => run_status(ctx, &id)
            .await
            .context("Failed to fetch scan status")?,
        Commands::List => run_list(ctx).await.context("Failed to list scans")?,
        Commands::Export { output, format } => run_export(ctx, &output, format)
            .await
            .context("Failed to export scans")?,
        Commands::Config => {}
    }

    Ok(())
}

async fn run_submit(ctx: context::AppContext, domain: &str, wait: bool) -> Result<()> {
    let mut tracker = ctx.tracker();
    let job = tracker.submit(domain).await?;
    println!("Scan {} started for {}", job.id, job.domain);

    if !wait {
        return Ok(());
    }

    tracker.start();
    let outcome = tokio::select! {
        resolved = tracker.wait_for(&job.id) => Some(resolved),
        _ = tokio::signal::ctrl_c() => None,
    };
    tracker.shutdown().await;

    match outcome {
        Some(resolved) => print_job(&resolved?),
        None => println!("Stopped waiting; scan {} is still running", job.id),
    }
    Ok(())
}

async fn run_status(ctx: context::AppContext, id: &str) -> Result<()> {
    match ctx.backend.fetch_status(id).await {
        Ok(update) => {
            println!("Scan:      {}", update.id);
            println!("Status:    {}", update.status);
            if let Some(done) = update.completed_at {
                println!("Completed: {}", done.to_rfc3339());
            }
            if let Some(summary) = &update.summary {
                println!("Summary:   {}", summary);
            }
            if let Some(result) = &update.result {
                println!("{}", serde_json::to_string_pretty(result)?);
            }
            Ok(())
        }
        Err(TrackerError::UnknownJob(id)) => {
            println!("No scan with id {}", id);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn run_list(ctx: context::AppContext) -> Result<()> {
    let tracker = ctx.tracker();
    tracker.refresh().await?;
    let jobs = tracker.snapshot().await;

    if jobs.is_empty() {
        println!("No scans found");
        return Ok(());
    }

    println!("{:<8}  {:<9}  {:<20}  DOMAIN", "ID", "STATUS", "CREATED");
    for job in &jobs {
        println!(
            "{:<8}  {:<9}  {:<20}  {}",
            job.short_id(),
            job.status,
            job.created_at.format("%Y-%m-%d %H:%M:%S"),
            job.domain
        );
    }
    Ok(())
}

async fn run_export(
    ctx: context::AppContext,
    output: &std::path::Path,
    format: Option<ExportFormat>,
) -> Result<()> {
    let format = format
        .or_else(|| ExportFormat::from_path(output))
        .unwrap_or_default();

    let tracker = ctx.tracker();
    tracker.refresh().await?;
    let rows = tracker.export_to_file(output, format).await?;
    println!("Exported {} scans to {}", rows, output.display());
    Ok(())
}

fn print_job(job: &ScanJob) {
    println!("Domain:    {}", job.domain);
    println!("Status:    {}", job.status);
    println!("Started:   {}", job.created_at.to_rfc3339());
    if let Some(done) = job.completed_at {
        println!("Completed: {}", done.to_rfc3339());
    }
    if let Some(summary) = &job.summary {
        println!("Summary:   {}", summary);
    }
    println!("Result:    {}", export::result_text(job.result.as_ref()));
}
