use core::pin::Pin;
use core::task::{Context, Poll};
use futures::future::BoxFuture;
use futures::{FutureExt, Stream, StreamExt, TryStreamExt, ready};
use metrics::{counter, histogram};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, warn};
use xmatch_config::shared::MergeAlignment;

use crate::crossmatch::{CrossMatchGroup, CrossMatchRow, CrossMatchTable};
use crate::bail;
use crate::error::{ErrorKind, XmResult};
use crate::merge::{RecordProvider, RecordStream, merge_fields};
use crate::metrics::{
    LEFT_CATALOG_LABEL, RIGHT_CATALOG_LABEL, XM_MERGE_EMITTED_RECORDS_TOTAL,
    XM_MERGE_MISALIGNED_PAIRS_TOTAL, XM_MERGE_MISALIGNMENT_RUN_LENGTH, register_metrics,
};
use crate::types::{ObjectId, PartitionKey, Record};

/// Record produced by merging the records of a matched pair.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRecord {
    /// Id of the pair, the left object id.
    pub id: ObjectId,
    pub partition_key: PartitionKey,
    pub fields: Record,
}

/// Counts reported by a [`MergedRecordStream`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Partitions whose records were read.
    pub partitions: usize,
    /// Partitions abandoned because a provider failed.
    pub failed_partitions: usize,
    /// Merged records produced.
    pub emitted: usize,
    /// Pairs skipped because their records did not match the cross-match row.
    pub misaligned: usize,
    /// Contiguous runs of skipped pairs, each reported once.
    pub misalignment_runs: usize,
}

/// Item read from the providers for one cross-match row.
enum PairOutcome {
    Pair {
        row: CrossMatchRow,
        left: (ObjectId, Record),
        right: (ObjectId, Record),
    },
    /// A record of the row is missing from a provider.
    Missing,
}

enum PairSource {
    /// Both provider streams, zipped with the rows as they are polled.
    Positional {
        left: RecordStream,
        right: RecordStream,
        pending_left: Option<(ObjectId, Record)>,
    },
    /// Pairs already aligned by id.
    Keyed(VecDeque<PairOutcome>),
}

/// Open partition being merged.
struct PartitionCursor {
    partition_key: PartitionKey,
    rows: std::vec::IntoIter<CrossMatchRow>,
    source: PairSource,
}

impl PartitionCursor {
    /// Polls the next pair of the partition, `None` once any side is exhausted.
    fn poll_pair(&mut self, cx: &mut Context<'_>) -> Poll<Option<XmResult<PairOutcome>>> {
        match &mut self.source {
            PairSource::Positional {
                left,
                right,
                pending_left,
            } => {
                if pending_left.is_none() {
                    match ready!(left.poll_next_unpin(cx)) {
                        Some(Ok(item)) => *pending_left = Some(item),
                        Some(Err(err)) => return Poll::Ready(Some(Err(err))),
                        None => return Poll::Ready(None),
                    }
                }

                let right_item = match ready!(right.poll_next_unpin(cx)) {
                    Some(Ok(item)) => item,
                    Some(Err(err)) => return Poll::Ready(Some(Err(err))),
                    None => return Poll::Ready(None),
                };

                let (Some(left_item), Some(row)) = (pending_left.take(), self.rows.next()) else {
                    return Poll::Ready(None);
                };

                Poll::Ready(Some(Ok(PairOutcome::Pair {
                    row,
                    left: left_item,
                    right: right_item,
                })))
            }
            PairSource::Keyed(pairs) => Poll::Ready(pairs.pop_front().map(Ok)),
        }
    }
}

enum State {
    Idle,
    Opening(BoxFuture<'static, XmResult<PartitionCursor>>),
    Streaming(PartitionCursor),
    Done,
}

/// Lazy stream of merged records, one partition at a time.
///
/// Created by [`merge_records`]. Each partition is opened when the previous one is exhausted
/// and its provider streams are dropped as soon as it ends. The stream is finite and cannot
/// be restarted.
#[must_use = "streams do nothing unless polled"]
pub struct MergedRecordStream<L, R> {
    left: Arc<L>,
    right: Arc<R>,
    left_name: String,
    right_name: String,
    alignment: MergeAlignment,
    groups: std::vec::IntoIter<CrossMatchGroup>,
    state: State,
    /// Length of the current run of misaligned pairs.
    misalignment_run: usize,
    stats: MergeStats,
}

/// Merges the records of the pairs of `table`, read from two record providers.
///
/// For every partition group both providers are asked for the records of the group's ids.
/// With [`MergeAlignment::Positional`] the i-th records of both providers are paired with the
/// i-th row of the group, and a pair is skipped when the provider ids do not contain the ids
/// of the row. With [`MergeAlignment::ById`] the partition is buffered and records are paired
/// with rows by id. Fields of paired records are combined with [`merge_fields`].
///
/// Skipped pairs are counted; a contiguous run of them is reported once a pair succeeds or
/// the partition ends. A provider failure is yielded as an error item and abandons the
/// partition, the stream then continues with the next one.
///
/// Fails with [`ErrorKind::ConfigError`] when both providers have the same name, since the
/// merged field names of both sides would then collide.
pub fn merge_records<L, R>(
    table: CrossMatchTable,
    left: L,
    right: R,
    alignment: MergeAlignment,
) -> XmResult<MergedRecordStream<L, R>>
where
    L: RecordProvider + Send + Sync + 'static,
    R: RecordProvider + Send + Sync + 'static,
{
    if left.name() == right.name() {
        bail!(
            ErrorKind::ConfigError,
            "Record providers must have distinct names",
            left.name().to_string()
        );
    }

    register_metrics();

    Ok(MergedRecordStream {
        left_name: left.name().to_string(),
        right_name: right.name().to_string(),
        left: Arc::new(left),
        right: Arc::new(right),
        alignment,
        groups: table.into_groups().into_iter(),
        state: State::Idle,
        misalignment_run: 0,
        stats: MergeStats::default(),
    })
}

impl<L, R> MergedRecordStream<L, R>
where
    L: RecordProvider + Send + Sync + 'static,
    R: RecordProvider + Send + Sync + 'static,
{
    /// Returns the counts accumulated so far.
    pub fn stats(&self) -> MergeStats {
        self.stats
    }

    fn open(&self, group: CrossMatchGroup) -> BoxFuture<'static, XmResult<PartitionCursor>> {
        let left = Arc::clone(&self.left);
        let right = Arc::clone(&self.right);
        let alignment = self.alignment;

        async move {
            let partition_key = group.partition_key;
            debug!(partition_key, rows = group.len(), "opening partition");

            let left_stream = left.open_partition(partition_key, group.left_ids()).await?;
            let right_stream = right.open_partition(partition_key, group.right_ids()).await?;

            let cursor = match alignment {
                MergeAlignment::Positional => PartitionCursor {
                    partition_key,
                    rows: group.rows.into_iter(),
                    source: PairSource::Positional {
                        left: left_stream,
                        right: right_stream,
                        pending_left: None,
                    },
                },
                MergeAlignment::ById => {
                    let left_items: Vec<(ObjectId, Record)> = left_stream.try_collect().await?;
                    let right_items: Vec<(ObjectId, Record)> = right_stream.try_collect().await?;

                    PartitionCursor {
                        partition_key,
                        rows: Vec::new().into_iter(),
                        source: PairSource::Keyed(align_by_id(group.rows, left_items, right_items)),
                    }
                }
            };

            Ok(cursor)
        }
        .boxed()
    }

    fn handle_pair(
        &mut self,
        partition_key: PartitionKey,
        outcome: PairOutcome,
    ) -> Option<MergedRecord> {
        let (row, left, right) = match outcome {
            PairOutcome::Pair { row, left, right }
                if left.0.contains(&row.left.id) && right.0.contains(&row.right.id) =>
            {
                (row, left, right)
            }
            _ => {
                self.misalignment_run += 1;
                self.stats.misaligned += 1;
                counter!(
                    XM_MERGE_MISALIGNED_PAIRS_TOTAL,
                    LEFT_CATALOG_LABEL => self.left_name.clone(),
                    RIGHT_CATALOG_LABEL => self.right_name.clone(),
                )
                .increment(1);

                return None;
            }
        };

        self.report_misalignment_run(partition_key);

        self.stats.emitted += 1;
        counter!(
            XM_MERGE_EMITTED_RECORDS_TOTAL,
            LEFT_CATALOG_LABEL => self.left_name.clone(),
            RIGHT_CATALOG_LABEL => self.right_name.clone(),
        )
        .increment(1);

        Some(MergedRecord {
            id: row.id,
            partition_key,
            fields: merge_fields(&self.left_name, left.1, &self.right_name, right.1),
        })
    }

    /// Reports and resets the current run of misaligned pairs, if any.
    fn report_misalignment_run(&mut self, partition_key: PartitionKey) {
        if self.misalignment_run == 0 {
            return;
        }

        warn!(
            left = %self.left_name,
            right = %self.right_name,
            partition_key,
            skipped = self.misalignment_run,
            "skipped misaligned record pairs"
        );
        histogram!(
            XM_MERGE_MISALIGNMENT_RUN_LENGTH,
            LEFT_CATALOG_LABEL => self.left_name.clone(),
            RIGHT_CATALOG_LABEL => self.right_name.clone(),
        )
        .record(self.misalignment_run as f64);

        self.stats.misalignment_runs += 1;
        self.misalignment_run = 0;
    }

    fn close_partition(&mut self, partition_key: PartitionKey) {
        self.report_misalignment_run(partition_key);
        self.stats.partitions += 1;
        self.state = State::Idle;
    }
}

impl<L, R> Stream for MergedRecordStream<L, R>
where
    L: RecordProvider + Send + Sync + 'static,
    R: RecordProvider + Send + Sync + 'static,
{
    type Item = XmResult<MergedRecord>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            match &mut this.state {
                State::Idle => match this.groups.next() {
                    Some(group) => this.state = State::Opening(this.open(group)),
                    None => {
                        info!(
                            left = %this.left_name,
                            right = %this.right_name,
                            partitions = this.stats.partitions,
                            emitted = this.stats.emitted,
                            misaligned = this.stats.misaligned,
                            misalignment_runs = this.stats.misalignment_runs,
                            "record merge finished"
                        );
                        this.state = State::Done;
                    }
                },
                State::Opening(future) => match ready!(future.poll_unpin(cx)) {
                    Ok(cursor) => this.state = State::Streaming(cursor),
                    Err(err) => {
                        warn!(error = %err, "abandoning partition, provider failed to open it");
                        this.stats.failed_partitions += 1;
                        this.state = State::Idle;

                        return Poll::Ready(Some(Err(err)));
                    }
                },
                State::Streaming(cursor) => {
                    let partition_key = cursor.partition_key;

                    match ready!(cursor.poll_pair(cx)) {
                        Some(Ok(outcome)) => {
                            if let Some(record) = this.handle_pair(partition_key, outcome) {
                                return Poll::Ready(Some(Ok(record)));
                            }
                        }
                        Some(Err(err)) => {
                            warn!(partition_key, error = %err, "abandoning partition, provider failed");
                            this.stats.failed_partitions += 1;
                            this.close_partition(partition_key);

                            return Poll::Ready(Some(Err(err)));
                        }
                        None => this.close_partition(partition_key),
                    }
                }
                State::Done => return Poll::Ready(None),
            }
        }
    }
}

/// Pairs buffered records with the rows they belong to.
///
/// A record belongs to a row when its id equals the row id. Failing that, a decorated id is
/// accepted when it is the only remaining one holding the row id as a delimited token. Rows
/// missing a record on either side are reported as [`PairOutcome::Missing`].
fn align_by_id(
    rows: Vec<CrossMatchRow>,
    left_items: Vec<(ObjectId, Record)>,
    right_items: Vec<(ObjectId, Record)>,
) -> VecDeque<PairOutcome> {
    let mut left_items = KeyedRecords::new(left_items);
    let mut right_items = KeyedRecords::new(right_items);

    rows.into_iter()
        .map(|row| {
            match (
                left_items.take(&row.left.id),
                right_items.take(&row.right.id),
            ) {
                (Some(left), Some(right)) => PairOutcome::Pair { row, left, right },
                _ => PairOutcome::Missing,
            }
        })
        .collect()
}

struct KeyedRecords {
    items: Vec<Option<(ObjectId, Record)>>,
    by_id: HashMap<ObjectId, usize>,
}

impl KeyedRecords {
    fn new(items: Vec<(ObjectId, Record)>) -> Self {
        let mut by_id = HashMap::with_capacity(items.len());
        for (index, (id, _)) in items.iter().enumerate() {
            by_id.entry(id.clone()).or_insert(index);
        }

        Self {
            items: items.into_iter().map(Some).collect(),
            by_id,
        }
    }

    fn take(&mut self, id: &ObjectId) -> Option<(ObjectId, Record)> {
        if let Some(index) = self.by_id.remove(id)
            && let Some(item) = self.items[index].take()
        {
            return Some(item);
        }

        let mut candidates = self.items.iter().enumerate().filter_map(|(index, item)| {
            item.as_ref()
                .filter(|(provided, _)| provided.contains_delimited(id))
                .map(|_| index)
        });
        let (Some(index), None) = (candidates.next(), candidates.next()) else {
            return None;
        };

        self.items[index].take()
    }
}
