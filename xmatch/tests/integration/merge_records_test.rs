use futures::StreamExt;
use xmatch::crossmatch::{CrossMatchTable, cross_match};
use xmatch::error::{ErrorKind, XmResult};
use xmatch::merge::{MergeStats, MergedRecord, RecordProvider, merge_records};
use xmatch::test_utils::catalog::memory_catalog;
use xmatch::test_utils::provider::{
    FailingProvider, PrefixedIdProvider, RelabelingProvider, ShuffledProvider,
};
use xmatch::test_utils::sky::{grid_rows, observe_again, seeded_rng};
use xmatch::types::{CatalogProjection, Cell, ObjectId, Position, ProjectionRow};
use xmatch_config::shared::MergeAlignment;
use xmatch_telemetry::tracing::init_test_tracing;

struct Survey {
    left_rows: Vec<ProjectionRow>,
    right_rows: Vec<ProjectionRow>,
    table: CrossMatchTable,
}

/// Two surveys observing the same 16 objects, split over two partitions.
fn survey(seed: u64) -> Survey {
    let mut rng = seeded_rng(seed);
    let mut left_rows = grid_rows(&mut rng, 8, Position::new(60.0, 10.0), 1, 11);
    left_rows.extend(grid_rows(&mut rng, 8, Position::new(90.0, 10.0), 101, 12));
    let right_rows = observe_again(&mut rng, &left_rows, 0.5, 1000);

    let table = cross_match(
        &CatalogProjection::new("sdss", left_rows.clone()),
        &CatalogProjection::new("desi", right_rows.clone()),
        1.0,
    )
    .unwrap();
    assert_eq!(table.num_rows(), left_rows.len());

    Survey {
        left_rows,
        right_rows,
        table,
    }
}

async fn collect<L, R>(
    table: CrossMatchTable,
    left: L,
    right: R,
    alignment: MergeAlignment,
) -> (Vec<XmResult<MergedRecord>>, MergeStats)
where
    L: RecordProvider + Send + Sync + 'static,
    R: RecordProvider + Send + Sync + 'static,
{
    let mut stream = merge_records(table, left, right, alignment).unwrap();

    let mut items = Vec::new();
    while let Some(item) = stream.next().await {
        items.push(item);
    }

    (items, stream.stats())
}

#[tokio::test]
async fn aligned_providers_merge_every_pair() {
    init_test_tracing();

    let survey = survey(1);
    let left = memory_catalog("sdss", &survey.left_rows);
    let right = memory_catalog("desi", &survey.right_rows);

    let (items, stats) = collect(survey.table, left, right, MergeAlignment::Positional).await;

    assert_eq!(
        stats,
        MergeStats {
            partitions: 2,
            failed_partitions: 0,
            emitted: 16,
            misaligned: 0,
            misalignment_runs: 0,
        }
    );

    let records: Vec<MergedRecord> = items.into_iter().map(Result::unwrap).collect();
    for (record, left_row) in records.iter().zip(&survey.left_rows) {
        let left_id: i64 = left_row.id.as_str().parse().unwrap();

        assert_eq!(record.id, left_row.id);
        assert_eq!(record.partition_key, left_row.partition_key);
        assert_eq!(record.fields.get("sdss_object_id"), Some(&Cell::I64(left_id)));
        assert_eq!(record.fields.get("desi_object_id"), Some(&Cell::I64(left_id + 1000)));
        assert_eq!(record.fields.get("sdss_flux"), Some(&Cell::F64(left_id as f64 * 0.5)));
        assert_eq!(
            record.fields.get("sdss_band"),
            Some(&Cell::String("sdss".to_string()))
        );
        assert_eq!(
            record.fields.get("desi_band"),
            Some(&Cell::String("desi".to_string()))
        );
        assert!(!record.fields.contains_key("object_id"));
    }
}

#[tokio::test]
async fn single_misaligned_pair_is_skipped() {
    init_test_tracing();

    let survey = survey(2);
    let left = memory_catalog("sdss", &survey.left_rows);
    // The record of object 1004 is reported under an unrelated id.
    let right = RelabelingProvider::new(
        memory_catalog("desi", &survey.right_rows),
        [(ObjectId::from(1004), ObjectId::from("unknown"))],
    );

    let (items, stats) = collect(survey.table, left, right, MergeAlignment::Positional).await;

    assert_eq!(stats.emitted, 15);
    assert_eq!(stats.misaligned, 1);
    let ids: Vec<ObjectId> = items.into_iter().map(|item| item.unwrap().id).collect();
    assert!(!ids.contains(&ObjectId::from(4)));
    assert_eq!(ids.len(), 15);
}

#[tokio::test]
async fn misalignment_runs_end_at_the_next_success() {
    init_test_tracing();

    let survey = survey(8);
    let left = memory_catalog("sdss", &survey.left_rows);
    let right = RelabelingProvider::new(
        memory_catalog("desi", &survey.right_rows),
        [
            (ObjectId::from(1002), ObjectId::from("unknown-a")),
            (ObjectId::from(1003), ObjectId::from("unknown-b")),
            (ObjectId::from(1006), ObjectId::from("unknown-c")),
        ],
    );

    let (_, stats) = collect(survey.table, left, right, MergeAlignment::Positional).await;

    assert_eq!(stats.emitted, 13);
    assert_eq!(stats.misaligned, 3);
    assert_eq!(stats.misalignment_runs, 2);
}

#[tokio::test]
async fn misalignment_run_is_reported_at_partition_end() {
    init_test_tracing();

    let survey = survey(9);
    let left = memory_catalog("sdss", &survey.left_rows);
    // Last pair of both partitions.
    let right = RelabelingProvider::new(
        memory_catalog("desi", &survey.right_rows),
        [
            (ObjectId::from(1008), ObjectId::from("unknown-a")),
            (ObjectId::from(1108), ObjectId::from("unknown-b")),
        ],
    );

    let (_, stats) = collect(survey.table, left, right, MergeAlignment::Positional).await;

    assert_eq!(stats.emitted, 14);
    assert_eq!(stats.misaligned, 2);
    assert_eq!(stats.misalignment_runs, 2);
}

#[tokio::test]
async fn decorated_ids_stay_aligned() {
    init_test_tracing();

    let survey = survey(3);
    let left = PrefixedIdProvider::new(memory_catalog("sdss", &survey.left_rows), "sdss-");
    let right = PrefixedIdProvider::new(memory_catalog("desi", &survey.right_rows), "desi-");

    let (_, stats) = collect(survey.table, left, right, MergeAlignment::Positional).await;

    assert_eq!(stats.emitted, 16);
    assert_eq!(stats.misaligned, 0);
}

#[tokio::test]
async fn shuffled_provider_misaligns_positional_merge() {
    init_test_tracing();

    let survey = survey(4);
    let left = memory_catalog("sdss", &survey.left_rows);
    let right = ShuffledProvider::new(memory_catalog("desi", &survey.right_rows), 17);

    let (items, stats) = collect(survey.table, left, right, MergeAlignment::Positional).await;

    assert!(stats.misaligned > 0);
    assert_eq!(stats.emitted + stats.misaligned, 16);
    for record in items.into_iter().map(Result::unwrap) {
        let left_id: i64 = record.id.as_str().parse().unwrap();
        assert_eq!(
            record.fields.get("desi_object_id"),
            Some(&Cell::I64(left_id + 1000))
        );
    }
}

#[tokio::test]
async fn id_alignment_recovers_shuffled_provider() {
    init_test_tracing();

    let survey = survey(5);
    let left = ShuffledProvider::new(memory_catalog("sdss", &survey.left_rows), 3);
    let right = ShuffledProvider::new(memory_catalog("desi", &survey.right_rows), 17);

    let (items, stats) = collect(survey.table, left, right, MergeAlignment::ById).await;

    assert_eq!(stats.emitted, 16);
    assert_eq!(stats.misaligned, 0);
    let ids: Vec<ObjectId> = items.into_iter().map(|item| item.unwrap().id).collect();
    let expected: Vec<ObjectId> = survey.left_rows.iter().map(|row| row.id.clone()).collect();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn failing_partition_is_abandoned() {
    init_test_tracing();

    let survey = survey(6);
    let left = FailingProvider::new(memory_catalog("sdss", &survey.left_rows), [11]);
    let right = memory_catalog("desi", &survey.right_rows);

    let (items, stats) = collect(survey.table, left, right, MergeAlignment::Positional).await;

    assert_eq!(items.len(), 9);
    assert_eq!(
        items[0].as_ref().map_err(|err| err.kind()).err(),
        Some(ErrorKind::SourceError)
    );
    assert!(items[1..].iter().all(|item| {
        item.as_ref()
            .is_ok_and(|record| record.partition_key == 12)
    }));
    assert_eq!(stats.failed_partitions, 1);
    assert_eq!(stats.partitions, 1);
    assert_eq!(stats.emitted, 8);
}

#[tokio::test]
async fn id_alignment_keeps_overlapping_decorated_ids_apart() {
    init_test_tracing();

    let left_rows = vec![
        ProjectionRow::new(1, Position::new(60.0, 10.0), 11),
        ProjectionRow::new(11, Position::new(60.1, 10.0), 11),
    ];

    for seed in 0..8 {
        let right_rows = observe_again(&mut seeded_rng(seed), &left_rows, 0.5, 1000);
        let table = cross_match(
            &CatalogProjection::new("sdss", left_rows.clone()),
            &CatalogProjection::new("desi", right_rows.clone()),
            1.0,
        )
        .unwrap();
        let left = ShuffledProvider::new(
            PrefixedIdProvider::new(memory_catalog("sdss", &left_rows), "p-"),
            seed,
        );
        let right = ShuffledProvider::new(memory_catalog("desi", &right_rows), seed + 1);

        let (items, stats) = collect(table, left, right, MergeAlignment::ById).await;

        assert_eq!((stats.emitted, stats.misaligned), (2, 0), "seed {seed}");
        for record in items.into_iter().map(Result::unwrap) {
            let left_id: i64 = record.id.as_str().parse().unwrap();
            assert_eq!(
                record.fields.get("sdss_object_id"),
                Some(&Cell::I64(left_id)),
                "seed {seed}"
            );
            assert_eq!(
                record.fields.get("desi_object_id"),
                Some(&Cell::I64(left_id + 1000)),
                "seed {seed}"
            );
        }
    }
}

#[tokio::test]
async fn providers_with_the_same_name_are_rejected() {
    init_test_tracing();

    let survey = survey(10);
    let left = memory_catalog("sdss", &survey.left_rows);
    let right = memory_catalog("sdss", &survey.right_rows);

    let result = merge_records(survey.table, left, right, MergeAlignment::Positional);

    assert_eq!(
        result.err().map(|err| err.kind()),
        Some(ErrorKind::ConfigError)
    );
}
