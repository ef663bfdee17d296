use futures::{StreamExt, TryStreamExt, stream};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;

use crate::bail;
use crate::error::{ErrorKind, XmResult};
use crate::merge::{RecordProvider, RecordStream};
use crate::types::{ObjectId, PartitionKey, Record};

/// Provider yielding the records of the wrapped provider in a random order.
///
/// The order is reproducible: it only depends on the seed and the partition.
#[derive(Debug, Clone)]
pub struct ShuffledProvider<P> {
    inner: P,
    seed: u64,
}

impl<P> ShuffledProvider<P> {
    pub fn new(inner: P, seed: u64) -> Self {
        Self { inner, seed }
    }
}

impl<P: RecordProvider> RecordProvider for ShuffledProvider<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn open_partition(
        &self,
        partition_key: PartitionKey,
        ids: Vec<ObjectId>,
    ) -> impl Future<Output = XmResult<RecordStream>> + Send {
        let opened = self.inner.open_partition(partition_key, ids);
        let mut rng = StdRng::seed_from_u64(self.seed ^ partition_key as u64);

        async move {
            let mut items: Vec<(ObjectId, Record)> = opened.await?.try_collect().await?;
            items.shuffle(&mut rng);

            Ok(stream::iter(items.into_iter().map(Ok)).boxed())
        }
    }
}

/// Provider reporting the ids of the wrapped provider with a prefix.
#[derive(Debug, Clone)]
pub struct PrefixedIdProvider<P> {
    inner: P,
    prefix: String,
}

impl<P> PrefixedIdProvider<P> {
    pub fn new(inner: P, prefix: impl Into<String>) -> Self {
        Self {
            inner,
            prefix: prefix.into(),
        }
    }
}

impl<P: RecordProvider> RecordProvider for PrefixedIdProvider<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn open_partition(
        &self,
        partition_key: PartitionKey,
        ids: Vec<ObjectId>,
    ) -> impl Future<Output = XmResult<RecordStream>> + Send {
        let opened = self.inner.open_partition(partition_key, ids);
        let prefix = self.prefix.clone();

        async move {
            let records = opened.await?;

            Ok(records
                .map_ok(move |(id, record)| (ObjectId::from(format!("{prefix}{id}")), record))
                .boxed())
        }
    }
}

/// Provider reporting wrong ids for some objects.
///
/// Records keep their position in the stream, only the reported id is replaced, which is how
/// a single misaligned pair shows up in an otherwise aligned partition.
#[derive(Debug, Clone)]
pub struct RelabelingProvider<P> {
    inner: P,
    relabeled: BTreeMap<ObjectId, ObjectId>,
}

impl<P> RelabelingProvider<P> {
    pub fn new(inner: P, relabeled: impl IntoIterator<Item = (ObjectId, ObjectId)>) -> Self {
        Self {
            inner,
            relabeled: relabeled.into_iter().collect(),
        }
    }
}

impl<P: RecordProvider> RecordProvider for RelabelingProvider<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn open_partition(
        &self,
        partition_key: PartitionKey,
        ids: Vec<ObjectId>,
    ) -> impl Future<Output = XmResult<RecordStream>> + Send {
        let opened = self.inner.open_partition(partition_key, ids);
        let relabeled = self.relabeled.clone();

        async move {
            let records = opened.await?;

            Ok(records
                .map_ok(move |(id, record)| match relabeled.get(&id) {
                    Some(label) => (label.clone(), record),
                    None => (id, record),
                })
                .boxed())
        }
    }
}

/// Provider failing to open the given partitions and delegating the others.
#[derive(Debug, Clone)]
pub struct FailingProvider<P> {
    inner: P,
    failing: BTreeSet<PartitionKey>,
}

impl<P> FailingProvider<P> {
    pub fn new(inner: P, failing: impl IntoIterator<Item = PartitionKey>) -> Self {
        Self {
            inner,
            failing: failing.into_iter().collect(),
        }
    }
}

impl<P: RecordProvider> RecordProvider for FailingProvider<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn open_partition(
        &self,
        partition_key: PartitionKey,
        ids: Vec<ObjectId>,
    ) -> impl Future<Output = XmResult<RecordStream>> + Send {
        let fails = self.failing.contains(&partition_key);
        let opened = self.inner.open_partition(partition_key, ids);

        async move {
            if fails {
                bail!(
                    ErrorKind::SourceError,
                    "Partition is configured to fail",
                    partition_key
                );
            }

            opened.await
        }
    }
}
