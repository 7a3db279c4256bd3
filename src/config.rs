use std::path::Path;

use config::{Config, Environment, File};
use serde::Deserialize;

/// GRID id of the Wellcome Trust, the organization extracted when none is given.
pub const DEFAULT_GRID_ID: &str = "grid.52788.30";

/// What to do when a candidate partition holds no readable objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MissingPartition {
    /// Abort the whole extraction.
    #[default]
    Fail,
    /// Log a warning and continue with the next location.
    Skip,
}

/// How candidate partition locations are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PartitionDiscovery {
    /// Read every `year=Y/` and `year=Y.0/` candidate.
    #[default]
    Guess,
    /// List the base location and read only the candidates that exist.
    List,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Overrides `AWS_REGION` for s3 locations.
    pub region: Option<String>,
    /// S3-compatible endpoint such as a MinIO server.
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    pub grid_id: String,
    pub on_missing: MissingPartition,
    pub discovery: PartitionDiscovery,
    pub max_concurrent_reads: usize,
    pub transform_threads: Option<usize>,
    pub log_dir: Option<String>,
    pub storage: StorageConfig,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            grid_id: DEFAULT_GRID_ID.to_string(),
            on_missing: MissingPartition::default(),
            discovery: PartitionDiscovery::default(),
            max_concurrent_reads: 1,
            transform_threads: None,
            log_dir: None,
            storage: StorageConfig::default(),
        }
    }
}

/// Layers an optional TOML file and `PUBIDS_*` environment variables
/// (e.g. `PUBIDS_STORAGE__ENDPOINT`) over the defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<ExtractConfig> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(File::from(path));
    }
    let cfg = builder
        .add_source(
            Environment::with_prefix("PUBIDS")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;
    Ok(cfg.try_deserialize()?)
}
