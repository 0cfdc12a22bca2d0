use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use weather_etl::config::{OverlapPolicy, PipelineConfig};
use weather_etl::logging;
use weather_etl::scheduler::{
    cancel_on_shutdown_signal, resolve_pipeline_bin, PipelineCommand, ScheduleEntry, Scheduler,
};

#[derive(Parser)]
#[command(name = "etl-scheduler")]
#[command(about = "Run the weather ETL pipeline once a day at a fixed local time")]
#[command(version = "0.1.0")]
struct Cli {
    /// Pipeline configuration (TOML); also forwarded to each pipeline run
    #[arg(long)]
    config: Option<PathBuf>,

    /// Daily trigger time, HH:MM local
    #[arg(long)]
    at: Option<String>,

    /// Seconds between due checks
    #[arg(long)]
    poll_secs: Option<u64>,

    /// What to do if the previous run is still going
    #[arg(long, value_enum)]
    overlap: Option<OverlapPolicy>,

    /// Pipeline executable (defaults to the sibling weather-etl binary)
    #[arg(long)]
    pipeline_bin: Option<PathBuf>,

    /// Launch one run immediately at startup
    #[arg(long)]
    run_now: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging("etl_scheduler.log");

    let cli = Cli::parse();
    let config =
        PipelineConfig::load(cli.config.as_deref()).context("Failed to load pipeline configuration")?;
    let schedule = config.schedule;

    let at = cli.at.unwrap_or(schedule.at);
    let poll_secs = cli.poll_secs.unwrap_or(schedule.poll_interval_secs);
    if poll_secs == 0 {
        anyhow::bail!("poll interval must be at least one second");
    }
    let overlap = cli.overlap.unwrap_or(schedule.overlap);
    let program = resolve_pipeline_bin(cli.pipeline_bin.as_deref().or(schedule.pipeline_bin.as_deref()));

    let entry = ScheduleEntry::daily_at(&at).context("Invalid schedule")?;
    let mut command = PipelineCommand::new(program);
    if let Some(path) = cli.config {
        command = command.arg("--config").arg(path);
    }

    let cancel = CancellationToken::new();
    cancel_on_shutdown_signal(cancel.clone());

    let mut scheduler = Scheduler::new(entry, command, Duration::from_secs(poll_secs), overlap);
    scheduler.run(cancel, cli.run_now).await?;
    Ok(())
}
