use futures::stream::BoxStream;
use std::future::Future;

use crate::error::XmResult;
use crate::types::{ObjectId, PartitionKey, Record};

/// Stream of full records of one partition, each with the id reported by the provider.
pub type RecordStream = BoxStream<'static, XmResult<(ObjectId, Record)>>;

/// Trait for systems serving the full per-object records of a catalog.
///
/// [`RecordProvider`] implementations open the data of exactly one partition at a time. The
/// merger drops the returned stream as soon as the partition is exhausted, so any file handle
/// the stream holds is released before the next partition is opened.
///
/// Providers are expected, but not required, to yield records in the order of the requested
/// ids. Ids without a stored record may be skipped. The id a provider reports may decorate the
/// catalog id (for example with a prefix), it only has to contain it.
pub trait RecordProvider {
    /// Returns the catalog name, used to prefix colliding fields of merged records.
    fn name(&self) -> &str;

    /// Opens the records of `ids` stored in partition `partition_key`.
    fn open_partition(
        &self,
        partition_key: PartitionKey,
        ids: Vec<ObjectId>,
    ) -> impl Future<Output = XmResult<RecordStream>> + Send;
}
