use std::future::Future;

use crate::error::XmResult;
use crate::types::{
    ColumnTable, OBJECT_ID_COLUMN, ObjectId, PARTITION_COLUMN, PartitionKey, Record,
    SOURCE_ID_COLUMN,
};

/// Trait for catalogs whose columns can be read file by file.
///
/// A [`CatalogSource`] exposes the data files making up each split of a catalog and reads a
/// subset of columns from one of them. Implementations only decide how files are stored; the
/// projector decides which files and columns are read and how failures are handled.
pub trait CatalogSource {
    /// Returns the catalog name, used to disambiguate colliding columns and fields.
    fn name(&self) -> &str;

    /// Returns the data files of `split`, in a stable order.
    ///
    /// An unknown split has no files.
    fn data_files(&self, split: &str) -> Vec<String>;

    /// Reads the requested columns of one data file.
    ///
    /// Columns the file does not store are left out of the returned table rather than
    /// reported as errors, so callers can apply their own fallbacks. Failing to open or decode
    /// the file should be reported with a per-file error kind (see
    /// [`crate::error::ErrorKind::is_per_file`]).
    fn read_columns(
        &self,
        file: &str,
        columns: &[String],
    ) -> impl Future<Output = XmResult<ColumnTable>> + Send;
}

/// Returns the identifier of a full record, read from `object_id` or else `source_id`.
pub fn record_object_id(record: &Record) -> Option<ObjectId> {
    record
        .get(OBJECT_ID_COLUMN)
        .and_then(|cell| cell.as_object_id())
        .or_else(|| {
            record
                .get(SOURCE_ID_COLUMN)
                .and_then(|cell| cell.as_object_id())
        })
}

/// Returns `true` if `path` is the data file of partition `key`.
///
/// Partition files carry `healpix={key}` in their path. The marker must not be followed by
/// another digit, so that partition 1 does not claim the file of partition 12.
pub fn is_partition_file(path: &str, key: PartitionKey) -> bool {
    let marker = format!("{PARTITION_COLUMN}={key}");

    path.match_indices(&marker).any(|(start, _)| {
        !path[start + marker.len()..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit())
    })
}
