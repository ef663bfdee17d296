use futures::{StreamExt, stream};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;

use crate::bail;
use crate::catalog::{CatalogSource, is_partition_file, record_object_id};
use crate::error::{ErrorKind, XmResult};
use crate::merge::{RecordProvider, RecordStream};
use crate::types::{ColumnTable, ObjectId, PartitionKey, Record};
use crate::xm_error;

/// Split whose files serve full records, unless configured otherwise.
pub const DEFAULT_RECORD_SPLIT: &str = "train";

#[derive(Debug, Clone)]
enum FileContent {
    Records(Vec<Record>),
    Unreadable,
}

#[derive(Debug, Clone)]
struct MemoryFile {
    path: String,
    content: FileContent,
}

#[derive(Debug, Clone)]
struct Inner {
    name: String,
    record_split: String,
    splits: BTreeMap<String, Vec<MemoryFile>>,
}

/// In-memory catalog for testing and development purposes.
///
/// [`MemoryCatalog`] stores each data file as a list of full records and serves both the
/// columnar reads of [`CatalogSource`] and the per-partition record streams of
/// [`RecordProvider`]. Files are named `{name}/{split}/healpix={key}/part-{n}`, so partition
/// lookup follows the same rule as catalogs stored on disk.
///
/// Clones share the stored files; adding files after cloning detaches the modified copy.
#[derive(Debug, Clone)]
pub struct MemoryCatalog {
    inner: Arc<Inner>,
}

impl MemoryCatalog {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                record_split: DEFAULT_RECORD_SPLIT.to_string(),
                splits: BTreeMap::new(),
            }),
        }
    }

    /// Sets the split whose files serve full records.
    pub fn with_record_split(mut self, split: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.inner).record_split = split.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Adds a data file holding `records` to `split`, returning its path.
    pub fn add_file(
        &mut self,
        split: &str,
        partition_key: PartitionKey,
        records: Vec<Record>,
    ) -> String {
        self.push_file(split, partition_key, FileContent::Records(records))
    }

    /// Adds a data file to `split` that fails to open on every read.
    pub fn add_unreadable_file(&mut self, split: &str, partition_key: PartitionKey) -> String {
        self.push_file(split, partition_key, FileContent::Unreadable)
    }

    fn push_file(&mut self, split: &str, partition_key: PartitionKey, content: FileContent) -> String {
        let inner = Arc::make_mut(&mut self.inner);
        let files = inner.splits.entry(split.to_string()).or_default();
        let path = format!(
            "{}/{split}/healpix={partition_key}/part-{}",
            inner.name,
            files.len()
        );

        files.push(MemoryFile {
            path: path.clone(),
            content,
        });

        path
    }

    fn file(&self, path: &str) -> Option<&MemoryFile> {
        self.inner
            .splits
            .values()
            .flat_map(|files| files.iter())
            .find(|file| file.path == path)
    }

    fn records_of<'a>(&self, file: &'a MemoryFile) -> XmResult<&'a [Record]> {
        match &file.content {
            FileContent::Records(records) => Ok(records),
            FileContent::Unreadable => bail!(
                ErrorKind::IoError,
                "Catalog file could not be opened",
                file.path.clone()
            ),
        }
    }
}

impl CatalogSource for MemoryCatalog {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn data_files(&self, split: &str) -> Vec<String> {
        self.inner
            .splits
            .get(split)
            .map(|files| files.iter().map(|file| file.path.clone()).collect())
            .unwrap_or_default()
    }

    fn read_columns(
        &self,
        file: &str,
        columns: &[String],
    ) -> impl Future<Output = XmResult<ColumnTable>> + Send {
        let result = match self.file(file) {
            Some(memory_file) => self.records_of(memory_file).and_then(|records| {
                let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
                ColumnTable::from_records(records, &columns)
            }),
            None => Err(xm_error!(
                ErrorKind::IoError,
                "Catalog file does not exist",
                file
            )),
        };

        async move { result }
    }
}

impl RecordProvider for MemoryCatalog {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn open_partition(
        &self,
        partition_key: PartitionKey,
        ids: Vec<ObjectId>,
    ) -> impl Future<Output = XmResult<RecordStream>> + Send {
        let result = self
            .inner
            .splits
            .get(&self.inner.record_split)
            .and_then(|files| files.iter().find(|f| is_partition_file(&f.path, partition_key)))
            .ok_or_else(|| {
                xm_error!(
                    ErrorKind::SourceError,
                    "No data file found for partition",
                    format!("catalog `{}`, partition {partition_key}", self.inner.name)
                )
            })
            .and_then(|file| self.records_of(file))
            .map(|records| select_records(records, &ids));

        async move { result.map(|records| stream::iter(records.into_iter().map(Ok)).boxed()) }
    }
}

/// Returns the records whose id is in `ids`, in the order of `ids`.
///
/// Ids without a record are skipped.
pub(crate) fn select_records(records: &[Record], ids: &[ObjectId]) -> Vec<(ObjectId, Record)> {
    let by_id: HashMap<ObjectId, &Record> = records
        .iter()
        .filter_map(|record| record_object_id(record).map(|id| (id, record)))
        .collect();

    ids.iter()
        .filter_map(|id| by_id.get(id).map(|record| (id.clone(), (*record).clone())))
        .collect()
}
