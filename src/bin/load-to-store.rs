use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use weather_etl::config::{PipelineConfig, StoreConfig};
use weather_etl::loader;
use weather_etl::logging;
use weather_etl::storage::open_store;

#[derive(Parser)]
#[command(name = "load-to-store")]
#[command(about = "Replace the document-store collection with the pipeline's output CSV")]
#[command(version = "0.1.0")]
struct Cli {
    /// Pipeline configuration (TOML), used for the default output and store-config paths
    #[arg(long)]
    config: Option<PathBuf>,

    /// CSV to load (defaults to the pipeline output path)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Store connection descriptor (JSON with uri, database, collection)
    #[arg(long)]
    store_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging("load_to_store.log");

    let cli = Cli::parse();
    let config =
        PipelineConfig::load(cli.config.as_deref()).context("Failed to load pipeline configuration")?;
    let store_config_path = cli.store_config.unwrap_or(config.store_config_path);
    let output_path = cli.output.unwrap_or(config.output_path);

    let store_config = StoreConfig::load(&store_config_path)
        .with_context(|| format!("Failed to load store config {}", store_config_path.display()))?;
    info!(
        database = %store_config.database,
        collection = %store_config.collection,
        "Opening document store"
    );
    let store = open_store(&store_config)
        .await
        .context("Failed to open document store")?;

    let summary = loader::load_file(store.as_ref(), &output_path)
        .await
        .with_context(|| format!("Failed to load {}", output_path.display()))?;

    println!(
        "✅ Data loaded into {}.{} ({} replaced, {} inserted)",
        store_config.database, store_config.collection, summary.deleted, summary.inserted
    );
    Ok(())
}
