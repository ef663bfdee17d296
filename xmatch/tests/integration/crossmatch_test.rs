use xmatch::catalog::{MemoryCatalog, project_catalog};
use xmatch::crossmatch::{CrossMatchStats, cross_match, cross_match_catalogs};
use xmatch::error::ErrorKind;
use xmatch::test_utils::catalog::{memory_catalog, object_record};
use xmatch::test_utils::sky::{grid_rows, observe_again, seeded_rng};
use xmatch::types::{CatalogProjection, Cell, Position, ProjectionRow};
use xmatch_config::shared::{MatchingConfig, ProjectionConfig};
use xmatch_telemetry::tracing::init_test_tracing;

fn two_partition_sky(seed: u64) -> Vec<ProjectionRow> {
    let mut rng = seeded_rng(seed);
    let mut rows = grid_rows(&mut rng, 10, Position::new(10.0, 5.0), 1, 100);
    rows.extend(grid_rows(&mut rng, 10, Position::new(40.0, -20.0), 101, 200));
    rows
}

#[tokio::test]
async fn identical_catalogs_match_every_object_to_itself() {
    init_test_tracing();

    let rows = two_partition_sky(1);
    let left = CatalogProjection::new("sdss", rows.clone());
    let right = CatalogProjection::new("desi", rows.clone());

    let table = cross_match(&left, &right, 1.0).unwrap();

    assert_eq!(table.num_rows(), rows.len());
    assert_eq!(table.stats().boundary_losses, 0);
    for row in table.rows() {
        assert_eq!(row.left_index, row.right_index);
        assert_eq!(row.left.id, row.right.id);
        assert_eq!(row.position, row.left.position);
        assert_eq!(row.position, row.right.position);
        assert!(row.separation_arcsec < 1e-6);
    }
}

#[tokio::test]
async fn distant_catalogs_do_not_match() {
    init_test_tracing();

    let mut rng = seeded_rng(2);
    let left = CatalogProjection::new(
        "sdss",
        grid_rows(&mut rng, 15, Position::new(10.0, 0.0), 1, 7),
    );
    let right = CatalogProjection::new(
        "desi",
        grid_rows(&mut rng, 15, Position::new(200.0, 60.0), 1, 7),
    );

    let table = cross_match(&left, &right, 1.0).unwrap();

    assert!(table.is_empty());
    assert_eq!(table.stats(), CrossMatchStats::default());
    assert!(table.to_column_table().unwrap().num_rows() == 0);
}

#[tokio::test]
async fn jittered_catalogs_match_through_memory_sources() {
    init_test_tracing();

    let rows = two_partition_sky(3);
    let mut rng = seeded_rng(4);
    let observed = observe_again(&mut rng, &rows, 0.5, 1000);

    let left = memory_catalog("sdss", &rows);
    let right = memory_catalog("desi", &observed);

    let table = cross_match_catalogs(
        &left,
        &right,
        &MatchingConfig::default(),
        &ProjectionConfig::default(),
    )
    .await
    .unwrap();

    assert_eq!(table.num_rows(), rows.len());
    assert_eq!(table.groups().len(), 2);
    assert_eq!(table.groups()[0].partition_key, 100);
    assert_eq!(table.groups()[1].partition_key, 200);
    for row in table.rows() {
        let expected: i64 = row.left.id.as_str().parse::<i64>().unwrap() + 1000;
        assert_eq!(row.right.id.as_str(), expected.to_string());
        assert!(row.separation_arcsec < 0.5);
        assert!(row.position.separation_arcsec(&row.left.position) <= row.separation_arcsec);
    }
}

#[tokio::test]
async fn configured_columns_reach_the_cross_match_table() {
    init_test_tracing();

    let rows = two_partition_sky(13);
    let observed = observe_again(&mut seeded_rng(14), &rows, 0.5, 1000);
    let mut projection = ProjectionConfig::default();
    projection.columns.push("flux".to_string());

    let table = cross_match_catalogs(
        &memory_catalog("sdss", &rows),
        &memory_catalog("desi", &observed),
        &MatchingConfig::default(),
        &projection,
    )
    .await
    .unwrap();

    let names = table.column_names();
    assert!(names.contains(&"sdss_flux".to_string()));
    assert!(names.contains(&"desi_flux".to_string()));
    for row in table.rows() {
        let left_id: i64 = row.left.id.as_str().parse().unwrap();
        assert_eq!(row.left.extra.get("flux"), Some(&Cell::F64(left_id as f64 * 0.5)));
        assert_eq!(
            row.right.extra.get("flux"),
            Some(&Cell::F64((left_id + 1000) as f64 * 0.5))
        );
    }

    let columns = table.to_column_table().unwrap();
    assert_eq!(columns.column("sdss_flux").map(|column| column.len()), Some(rows.len()));
    assert_eq!(columns.column("desi_flux").map(|column| column.cell(0)), Some(Cell::F64(500.5)));
}

#[tokio::test]
async fn configured_column_missing_from_catalog_is_a_schema_error() {
    init_test_tracing();

    let rows = two_partition_sky(15);
    let mut projection = ProjectionConfig::default();
    projection.columns.push("redshift".to_string());

    let err = project_catalog(&memory_catalog("sdss", &rows), &projection)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SchemaError);
}

#[tokio::test]
async fn pairs_across_partitions_are_lost() {
    init_test_tracing();

    let rows = two_partition_sky(5);
    let mut rng = seeded_rng(6);
    let mut observed = observe_again(&mut rng, &rows, 0.5, 1000);
    // Two objects seen by the right catalog in a neighbouring partition.
    observed[0].partition_key = 300;
    observed[15].partition_key = 300;

    let table = cross_match(
        &CatalogProjection::new("sdss", rows.clone()),
        &CatalogProjection::new("desi", observed),
        1.0,
    )
    .unwrap();

    assert_eq!(
        table.stats(),
        CrossMatchStats {
            initial_matches: rows.len(),
            boundary_losses: 2,
            final_matches: rows.len() - 2,
        }
    );
    assert!(table.rows().all(|row| row.left.id.as_str() != "1"));
    assert!(table.rows().all(|row| row.left.id.as_str() != "106"));
}

#[tokio::test]
async fn unreadable_files_are_dropped_from_projection() {
    init_test_tracing();

    let rows = two_partition_sky(7);
    let mut catalog = memory_catalog("sdss", &rows);
    catalog.add_unreadable_file("train", 400);

    let projection = project_catalog(&catalog, &ProjectionConfig::default())
        .await
        .unwrap();

    assert_eq!(projection.len(), rows.len());
    assert_eq!(projection.rows(), rows.as_slice());
}

#[tokio::test]
async fn catalogs_without_files_are_rejected() {
    init_test_tracing();

    let left = MemoryCatalog::new("sdss");
    let mut right = MemoryCatalog::new("desi");
    let row = ProjectionRow::new(1, Position::new(1.0, 1.0), 1);
    right.add_file("train", 1, vec![object_record("desi", &row)]);

    let err = cross_match_catalogs(
        &left,
        &right,
        &MatchingConfig::default(),
        &ProjectionConfig::default(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConfigError);
}
