use std::sync::Arc;
use std::time::Instant;

use arrow::compute::concat_batches;
use arrow::record_batch::RecordBatch;
use futures::{stream, StreamExt, TryStreamExt};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info, warn};

use crate::config::{ExtractConfig, MissingPartition, PartitionDiscovery};
use crate::error::{ExtractError, Result};
use crate::filter::filter_and_project;
use crate::flattener::flatten;
use crate::partitioner;
use crate::schema::{self, INPUT_COLUMNS};
use crate::storage::StorageGateway;

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub on_missing: MissingPartition,
    pub discovery: PartitionDiscovery,
    /// Partitions read at once; 1 visits them strictly one after another.
    pub max_concurrent_reads: usize,
    /// Size of the flatten/filter pool; `None` uses one thread per core.
    pub transform_threads: Option<usize>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self::from(&ExtractConfig::default())
    }
}

impl From<&ExtractConfig> for ExtractOptions {
    fn from(cfg: &ExtractConfig) -> Self {
        Self {
            on_missing: cfg.on_missing,
            discovery: cfg.discovery,
            max_concurrent_reads: cfg.max_concurrent_reads,
            transform_threads: cfg.transform_threads,
        }
    }
}

/// Year-partitioned corpus → one table of publications funded by an organization.
pub struct ExtractionPipeline {
    gateway: Arc<StorageGateway>,
    options: ExtractOptions,
    pool: Arc<ThreadPool>,
}

impl ExtractionPipeline {
    pub fn new(gateway: Arc<StorageGateway>, options: ExtractOptions) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(options.transform_threads.unwrap_or(0))
            .thread_name(|i| format!("transform-{i}"))
            .build()?;

        Ok(Self {
            gateway,
            options,
            pool: Arc::new(pool),
        })
    }

    /// Partition locations to visit, in visitation order.
    pub async fn locations(&self, base_location: &str, start_year: i32, end_year: i32) -> Result<Vec<String>> {
        let candidates = partitioner::locate(base_location, start_year, end_year);

        match self.options.discovery {
            PartitionDiscovery::Guess => Ok(candidates),
            PartitionDiscovery::List => {
                let existing = self.gateway.list_partitions(base_location).await?;
                let kept = partitioner::retain_existing(base_location, candidates, &existing);
                debug!("{} of {} listed partitions fall in range", kept.len(), existing.len());
                Ok(kept)
            }
        }
    }

    /// Rows of every partition between `start_year` and `end_year` that were
    /// funded by `target_org_id` and have a `pmid`.
    ///
    /// Output follows partition visitation order, then row order within a
    /// partition, whatever `max_concurrent_reads` is.
    pub async fn extract(
        &self,
        base_location: &str,
        start_year: i32,
        end_year: i32,
        target_org_id: &str,
    ) -> Result<RecordBatch> {
        let locations = self.locations(base_location, start_year, end_year).await?;
        let total = locations.len();
        info!("Scanning {} partition locations for {}", total, target_org_id);

        let started = Instant::now();
        let per_partition: Vec<Option<RecordBatch>> = stream::iter(locations.iter().enumerate())
            .map(|(i, location)| self.extract_partition(i + 1, total, location, target_org_id))
            .buffered(self.options.max_concurrent_reads.max(1))
            .try_collect()
            .await?;

        let batches: Vec<RecordBatch> = per_partition.into_iter().flatten().collect();
        let merged = concat_batches(&schema::output_schema(), &batches)?;

        info!(
            "Extracted {} rows from {} partitions in {:.2}s",
            merged.num_rows(),
            batches.len(),
            started.elapsed().as_secs_f64()
        );
        Ok(merged)
    }

    /// Extracts and writes the merged table to `output_location`.
    ///
    /// Returns the written location and row count.
    pub async fn extract_to(
        &self,
        base_location: &str,
        output_location: &str,
        start_year: i32,
        end_year: i32,
        target_org_id: &str,
    ) -> Result<(String, usize)> {
        let merged = self.extract(base_location, start_year, end_year, target_org_id).await?;
        let written = self.gateway.write(&merged, output_location).await?;
        info!("Wrote {} rows to {}", merged.num_rows(), written);
        Ok((written, merged.num_rows()))
    }

    async fn extract_partition(
        &self,
        position: usize,
        total: usize,
        location: &str,
        target_org_id: &str,
    ) -> Result<Option<RecordBatch>> {
        let batches = match self.gateway.read(location, &INPUT_COLUMNS).await {
            Ok(batches) => batches,
            Err(ExtractError::PartitionNotFound { .. }) if self.options.on_missing == MissingPartition::Skip => {
                warn!("[{}/{}] Skipping {}: no readable objects", position, total, location);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let records: usize = batches.iter().map(|b| b.num_rows()).sum();
        let pool = self.pool.clone();
        let target = target_org_id.to_string();
        let matched = tokio::task::spawn_blocking(move || transform(&pool, &batches, &target)).await??;

        info!(
            "[{}/{}] {}: {} records, {} matching rows",
            position,
            total,
            location,
            records,
            matched.num_rows()
        );
        Ok(Some(matched))
    }
}

/// Flattens and filters each batch of one partition on the pool, keeping batch order.
fn transform(pool: &ThreadPool, batches: &[RecordBatch], target_org_id: &str) -> Result<RecordBatch> {
    let filtered = pool.install(|| {
        batches
            .par_iter()
            .map(|batch| filter_and_project(&flatten(batch)?, target_org_id))
            .collect::<Result<Vec<_>>>()
    })?;

    Ok(concat_batches(&schema::output_schema(), &filtered)?)
}
