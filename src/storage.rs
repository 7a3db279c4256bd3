use std::collections::HashSet;
use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use dashmap::DashMap;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectMeta, ObjectStore, ObjectStoreScheme};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::{ArrowWriter, ProjectionMask};
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use tracing::debug;
use url::Url;

use crate::config::StorageConfig;
use crate::error::{ExtractError, Result};

/// File name used when the write location is a directory prefix.
const DEFAULT_PART_NAME: &str = "part-00000.parquet";

/// Reads and writes Parquet tables at object-store locations.
///
/// Locations are URLs (`s3://bucket/prefix/`, `file:///dir/`, `memory:///`)
/// or bare local paths. One store is built per `scheme://authority` and reused.
pub struct StorageGateway {
    config: StorageConfig,
    stores: DashMap<String, Arc<dyn ObjectStore>>,
}

impl StorageGateway {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            stores: DashMap::new(),
        }
    }

    /// Routes every location under `prefix` (e.g. `s3://corpus`) to `store`.
    pub fn register_store(&self, prefix: &str, store: Arc<dyn ObjectStore>) -> Result<()> {
        let url = parse_location(prefix)?;
        self.stores.insert(store_key(&url), store);
        Ok(())
    }

    /// Reads every Parquet object at `location`, keeping only `columns`.
    ///
    /// A location is a prefix whose objects are read in path order; objects
    /// whose names start with `_` or `.` are skipped. A location naming a
    /// single object is read as-is.
    pub async fn read(&self, location: &str, columns: &[&str]) -> Result<Vec<RecordBatch>> {
        let (store, path) = self.resolve(location)?;
        let objects = self.data_objects(store.as_ref(), &path).await?;
        if objects.is_empty() {
            return Err(ExtractError::PartitionNotFound {
                location: location.to_string(),
            });
        }

        let mut batches = Vec::new();
        for object in objects {
            debug!("Reading {} ({} bytes)", object.location, object.size);
            let bytes = store.get(&object.location).await?.bytes().await?;

            let builder = ParquetRecordBatchReaderBuilder::try_new(bytes)?;
            let mut roots = Vec::with_capacity(columns.len());
            for name in columns {
                let idx = builder.schema().index_of(name).map_err(|_| ExtractError::MissingColumn {
                    column: name.to_string(),
                    context: format!("{location} ({})", object.location),
                })?;
                roots.push(idx);
            }
            let mask = ProjectionMask::roots(builder.parquet_schema(), roots);

            for batch in builder.with_projection(mask).build()? {
                batches.push(batch?);
            }
        }

        Ok(batches)
    }

    /// Encodes `batch` as one Parquet object and uploads it.
    pub async fn write(&self, batch: &RecordBatch, location: &str) -> Result<String> {
        let location = if location.ends_with('/') {
            format!("{location}{DEFAULT_PART_NAME}")
        } else {
            location.to_string()
        };
        let (store, path) = self.resolve(&location)?;

        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();

        let mut buffer = Vec::new();
        {
            let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), Some(props))?;
            writer.write(batch)?;
            writer.close()?;
        }

        store.put(&path, buffer.into()).await?;
        Ok(location)
    }

    /// Names of the immediate child directories under `base_location`.
    pub async fn list_partitions(&self, base_location: &str) -> Result<HashSet<String>> {
        let (store, path) = self.resolve(base_location)?;
        let prefix = (!path.as_ref().is_empty()).then_some(&path);
        let listing = store.list_with_delimiter(prefix).await?;

        Ok(listing
            .common_prefixes
            .iter()
            .filter_map(|p| p.filename().map(String::from))
            .collect())
    }

    async fn data_objects(&self, store: &dyn ObjectStore, path: &ObjectPath) -> Result<Vec<ObjectMeta>> {
        let prefix = (!path.as_ref().is_empty()).then_some(path);
        let mut objects: Vec<ObjectMeta> = store
            .list(prefix)
            .try_filter(|meta| futures::future::ready(is_data_object(&meta.location)))
            .try_collect()
            .await?;

        if objects.is_empty() && prefix.is_some() {
            match store.head(path).await {
                Ok(meta) => objects.push(meta),
                Err(object_store::Error::NotFound { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }

        objects.sort_by(|a, b| a.location.cmp(&b.location));
        Ok(objects)
    }

    fn resolve(&self, location: &str) -> Result<(Arc<dyn ObjectStore>, ObjectPath)> {
        let url = parse_location(location)?;
        let (scheme, path) = ObjectStoreScheme::parse(&url).map_err(object_store::Error::from)?;
        let key = store_key(&url);

        if let Some(store) = self.stores.get(&key) {
            return Ok((store.clone(), path));
        }

        let store: Arc<dyn ObjectStore> = match scheme {
            ObjectStoreScheme::Local => Arc::new(LocalFileSystem::new()),
            ObjectStoreScheme::Memory => Arc::new(InMemory::new()),
            ObjectStoreScheme::AmazonS3 => Arc::new(self.s3_builder(&url).build()?),
            _ => {
                return Err(ExtractError::UnsupportedScheme {
                    location: location.to_string(),
                })
            }
        };
        debug!("Opened object store for {}", key);

        self.stores.insert(key, store.clone());
        Ok((store, path))
    }

    fn s3_builder(&self, url: &Url) -> AmazonS3Builder {
        let mut builder = AmazonS3Builder::from_env().with_url(url.as_str());
        if let Some(region) = &self.config.region {
            builder = builder.with_region(region);
        }
        if let Some(endpoint) = &self.config.endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }
        builder
    }
}

fn parse_location(location: &str) -> Result<Url> {
    match Url::parse(location) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let absolute = std::path::absolute(location).map_err(|e| ExtractError::InvalidLocation {
                location: location.to_string(),
                reason: e.to_string(),
            })?;
            let mut url = Url::from_file_path(&absolute).map_err(|_| ExtractError::InvalidLocation {
                location: location.to_string(),
                reason: "not an absolute path".to_string(),
            })?;
            if location.ends_with('/') && !url.path().ends_with('/') {
                let dir = format!("{}/", url.path());
                url.set_path(&dir);
            }
            Ok(url)
        }
        Err(e) => Err(ExtractError::InvalidLocation {
            location: location.to_string(),
            reason: e.to_string(),
        }),
    }
}

fn store_key(url: &Url) -> String {
    format!("{}://{}", url.scheme(), url.host_str().unwrap_or_default())
}

fn is_data_object(path: &ObjectPath) -> bool {
    path.filename()
        .map(|name| !name.starts_with('_') && !name.starts_with('.'))
        .unwrap_or(false)
}
