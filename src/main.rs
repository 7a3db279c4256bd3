use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use dotenvy::dotenv;
use tracing::info;

use org_pub_ids::config::{load_config, MissingPartition, PartitionDiscovery};
use org_pub_ids::log::init_tracing;
use org_pub_ids::{ExtractOptions, ExtractionPipeline, StorageGateway};

/// Retrieve publication ids for an organisation and save them as Parquet.
#[derive(Debug, Parser)]
#[command(name = "get-org-pub-ids", version)]
struct Cli {
    /// Base location containing the `year=.../` partitions, e.g. s3://bucket/pubs/
    input_location: String,
    /// Where to write the extracted Parquet file
    output_location: String,
    /// Earliest year in range
    start_year: i32,
    /// Most recent year in range
    end_year: i32,
    /// Organization GRID id to extract (default grid.52788.30)
    #[arg(long = "grid_id")]
    grid_id: Option<String>,
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, value_enum)]
    on_missing: Option<MissingPartition>,
    #[arg(long, value_enum)]
    discovery: Option<PartitionDiscovery>,
    #[arg(long)]
    max_concurrent_reads: Option<usize>,
    /// Write logs to a daily rolling file in this directory instead of stdout
    #[arg(long)]
    log_dir: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    let mut cfg = load_config(cli.config.as_deref())?;
    if let Some(grid_id) = cli.grid_id {
        cfg.grid_id = grid_id;
    }
    if let Some(on_missing) = cli.on_missing {
        cfg.on_missing = on_missing;
    }
    if let Some(discovery) = cli.discovery {
        cfg.discovery = discovery;
    }
    if let Some(n) = cli.max_concurrent_reads {
        cfg.max_concurrent_reads = n;
    }
    if cli.log_dir.is_some() {
        cfg.log_dir = cli.log_dir;
    }

    let _guard = init_tracing(cfg.log_dir.as_deref());
    info!(
        "Extracting {} from {} ({}-{})",
        cfg.grid_id, cli.input_location, cli.start_year, cli.end_year
    );

    let gateway = Arc::new(StorageGateway::new(cfg.storage.clone()));
    let pipeline = ExtractionPipeline::new(gateway, ExtractOptions::from(&cfg))?;
    pipeline
        .extract_to(
            &cli.input_location,
            &cli.output_location,
            cli.start_year,
            cli.end_year,
            &cfg.grid_id,
        )
        .await?;

    Ok(())
}
