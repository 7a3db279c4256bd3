use std::sync::Arc;

use object_store::memory::InMemory;
use org_pub_ids::records::{to_arrow, FundingAcknowledgment, PublicationRecord};
use org_pub_ids::{ExtractOptions, ExtractionPipeline, StorageConfig, StorageGateway};

pub const BASE: &str = "s3://corpus/pubs/";
pub const TARGET: &str = "grid.52788.30";
pub const OTHER: &str = "grid.4991.5";

pub struct Harness {
    pub store: Arc<InMemory>,
    pub gateway: Arc<StorageGateway>,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(InMemory::new());
        let gateway = Arc::new(StorageGateway::new(StorageConfig::default()));
        gateway
            .register_store("s3://corpus", store.clone())
            .expect("register in-memory store");
        Self { store, gateway }
    }

    pub fn pipeline(&self, options: ExtractOptions) -> ExtractionPipeline {
        ExtractionPipeline::new(self.gateway.clone(), options).expect("build pipeline")
    }

    /// Writes `records` as one Parquet object under `BASE` + `dir`.
    pub async fn put_partition(&self, dir: &str, part: &str, records: &[PublicationRecord]) {
        let batch = to_arrow(records).expect("build partition batch");
        self.gateway
            .write(&batch, &format!("{BASE}{dir}/{part}"))
            .await
            .expect("write partition");
    }
}

pub fn funded(doi: &str, pmid: Option<&str>, grid_ids: &[&str]) -> PublicationRecord {
    PublicationRecord {
        doi: Some(doi.to_string()),
        funding: Some(
            grid_ids
                .iter()
                .map(|g| FundingAcknowledgment {
                    grid_id: Some(g.to_string()),
                    name: Some(format!("Funder {g}")),
                })
                .collect(),
        ),
        pmid: pmid.map(String::from),
        pmcid: pmid.map(|p| format!("PMC{p}")),
    }
}
