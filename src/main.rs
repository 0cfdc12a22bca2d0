use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, warn};
use weather_etl::config::PipelineConfig;
use weather_etl::logging;
use weather_etl::metrics;
use weather_etl::pipeline::{Pipeline, PipelineResult};

#[derive(Parser)]
#[command(name = "weather-etl")]
#[command(about = "Extract, clean, enrich and merge weather sources into one CSV")]
#[command(version = "0.1.0")]
struct Cli {
    /// Pipeline configuration (TOML). Defaults apply when omitted and no pipeline.toml exists
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the output CSV path
    #[arg(long)]
    output: Option<PathBuf>,
}

fn print_summary(result: &PipelineResult) {
    println!("\n📊 Pipeline run {}", result.run_id);
    for source in &result.sources {
        let status = match &source.error {
            Some(_) => "⚠️ ",
            None => "✅",
        };
        println!(
            "   {} {:<28} extracted {:>4}  cleaned {:>4}  score {}",
            status,
            source.label,
            source.rows_extracted,
            source.rows_cleaned,
            if source.score_added { "yes" } else { "no" }
        );
    }
    println!(
        "   Merged: {} rows x {} columns",
        result.merged_rows,
        result.merged_columns.len()
    );
    match &result.output_file {
        Some(path) => println!("   Output: {}", path),
        None => println!("   Output: not written"),
    }
    if !result.errors.is_empty() {
        println!("\n⚠️  Errors encountered:");
        for error in &result.errors {
            println!("   - {}", error);
        }
    }
    println!("   Finished in {:.3}s", result.duration_secs);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging("weather_etl.log");

    let cli = Cli::parse();
    let mut config =
        PipelineConfig::load(cli.config.as_deref()).context("Failed to load pipeline configuration")?;
    if let Some(output) = cli.output {
        config.output_path = output;
    }

    let handle = match metrics::init() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Metrics disabled: {}", e);
            None
        }
    };

    let result = Pipeline::run(&config);

    if let (Some(handle), Some(path)) = (handle.as_ref(), config.metrics_path.as_deref()) {
        match metrics::write_snapshot(handle, path) {
            Ok(()) => info!("Metrics written to {}", path.display()),
            Err(e) => error!("Failed to write metrics to {}: {}", path.display(), e),
        }
    }

    print_summary(&result);
    Ok(())
}
