//! Extracts publications funded by one organization from a year-partitioned
//! Parquet corpus in object storage.
//!
//! [`pipeline::ExtractionPipeline`] ties the pieces together: candidate
//! partitions from [`partitioner`], reads through [`storage::StorageGateway`],
//! then [`flattener::flatten`] and [`filter::filter_and_project`] per partition.

pub mod config;
pub mod error;
pub mod filter;
pub mod flattener;
pub mod log;
pub mod partitioner;
pub mod pipeline;
pub mod records;
pub mod schema;
pub mod storage;

pub use crate::config::{ExtractConfig, MissingPartition, PartitionDiscovery, StorageConfig};
pub use crate::error::{ExtractError, Result};
pub use crate::pipeline::{ExtractOptions, ExtractionPipeline};
pub use crate::storage::StorageGateway;
