use futures::{StreamExt, stream};
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::catalog::memory::{DEFAULT_RECORD_SPLIT, select_records};
use crate::catalog::{CatalogSource, is_partition_file};
use crate::error::{ErrorKind, XmResult};
use crate::merge::{RecordProvider, RecordStream};
use crate::types::{ColumnTable, ObjectId, PartitionKey, Record};
use crate::{bail, xm_error};

/// Extension of catalog data files.
const DATA_FILE_EXTENSION: &str = "json";

#[derive(Debug)]
struct Inner {
    name: String,
    root: PathBuf,
    record_split: String,
    splits: BTreeMap<String, Vec<String>>,
}

/// Catalog stored as JSON files on disk.
///
/// Every directory directly under the root is a split; every `.json` file below a split
/// directory, at any depth, is one data file holding a JSON array of record objects. Files of
/// a split are listed in lexicographic path order. Partition files carry `healpix={key}` in
/// their path, for instance `{root}/train/healpix=1234/001-of-002.json`.
#[derive(Debug, Clone)]
pub struct JsonCatalog {
    inner: Arc<Inner>,
}

impl JsonCatalog {
    /// Scans `root` for splits and data files.
    pub async fn open(name: impl Into<String>, root: impl Into<PathBuf>) -> XmResult<Self> {
        let name = name.into();
        let root = root.into();

        let mut splits = BTreeMap::new();
        let mut entries = tokio::fs::read_dir(&root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }

            let split = entry.file_name().to_string_lossy().into_owned();
            let files = list_data_files(&entry.path()).await?;
            debug!(catalog = %name, split = %split, files = files.len(), "found catalog split");
            splits.insert(split, files);
        }

        Ok(Self {
            inner: Arc::new(Inner {
                name,
                root,
                record_split: DEFAULT_RECORD_SPLIT.to_string(),
                splits,
            }),
        })
    }

    /// Sets the split whose files serve full records.
    pub fn with_record_split(self, split: impl Into<String>) -> Self {
        let inner = Inner {
            name: self.inner.name.clone(),
            root: self.inner.root.clone(),
            record_split: split.into(),
            splits: self.inner.splits.clone(),
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// Returns the names of all splits found under the root.
    pub fn splits(&self) -> Vec<&str> {
        self.inner.splits.keys().map(String::as_str).collect()
    }

    fn partition_file(&self, partition_key: PartitionKey) -> XmResult<String> {
        self.inner
            .splits
            .get(&self.inner.record_split)
            .and_then(|files| {
                files
                    .iter()
                    .find(|file| is_partition_file(file, partition_key))
            })
            .cloned()
            .ok_or_else(|| {
                xm_error!(
                    ErrorKind::SourceError,
                    "No data file found for partition",
                    format!("catalog `{}`, partition {partition_key}", self.inner.name)
                )
            })
    }
}

impl CatalogSource for JsonCatalog {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn data_files(&self, split: &str) -> Vec<String> {
        self.inner.splits.get(split).cloned().unwrap_or_default()
    }

    fn read_columns(
        &self,
        file: &str,
        columns: &[String],
    ) -> impl Future<Output = XmResult<ColumnTable>> + Send {
        let file = file.to_string();
        let columns = columns.to_vec();

        async move {
            let records = read_records(&file).await?;
            let columns: Vec<&str> = columns.iter().map(String::as_str).collect();

            ColumnTable::from_records(&records, &columns)
        }
    }
}

impl RecordProvider for JsonCatalog {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn open_partition(
        &self,
        partition_key: PartitionKey,
        ids: Vec<ObjectId>,
    ) -> impl Future<Output = XmResult<RecordStream>> + Send {
        let file = self.partition_file(partition_key);

        async move {
            let file = file?;
            let records = read_records(&file).await?;
            let selected = select_records(&records, &ids);
            debug!(
                file = %file,
                requested = ids.len(),
                found = selected.len(),
                "opened partition file"
            );

            Ok(stream::iter(selected.into_iter().map(Ok)).boxed())
        }
    }
}

/// Reads a data file holding a JSON array of record objects.
async fn read_records(file: &str) -> XmResult<Vec<Record>> {
    let bytes = tokio::fs::read(file).await?;
    let rows: Vec<Value> = serde_json::from_slice(&bytes)?;

    rows.into_iter()
        .enumerate()
        .map(|(index, row)| match row {
            Value::Object(object) => Ok(Record::from(object)),
            _ => bail!(
                ErrorKind::DeserializationError,
                "Catalog file rows must be JSON objects",
                format!("row {index} of `{file}`")
            ),
        })
        .collect()
}

/// Lists the data files below `directory`, in lexicographic order.
async fn list_data_files(directory: &Path) -> XmResult<Vec<String>> {
    let mut files = Vec::new();
    let mut pending = vec![directory.to_path_buf()];

    while let Some(current) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&current).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                pending.push(path);
            } else if path.extension().is_some_and(|ext| ext == DATA_FILE_EXTENSION) {
                files.push(path.to_string_lossy().into_owned());
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Writes `records` to `path` as a JSON array, creating parent directories.
pub async fn write_records(path: &Path, records: &[Record]) -> XmResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let rows: Vec<Value> = records.iter().map(Record::to_json).collect();
    let bytes = serde_json::to_vec(&rows).map_err(|err| {
        xm_error!(
            ErrorKind::SerializationError,
            "Failed to serialize catalog records",
            source: err
        )
    })?;
    tokio::fs::write(path, bytes).await?;

    Ok(())
}
