use futures::TryStreamExt;
use std::path::Path;
use tempfile::TempDir;
use xmatch::catalog::json::write_records;
use xmatch::catalog::{CatalogSource, JsonCatalog, project_catalog};
use xmatch::crossmatch::cross_match_catalogs;
use xmatch::error::ErrorKind;
use xmatch::merge::merge_records;
use xmatch::test_utils::catalog::object_record;
use xmatch::test_utils::sky::{grid_rows, observe_again, seeded_rng};
use xmatch::types::{Cell, Position, ProjectionRow, Record};
use xmatch_config::shared::{MatchingConfig, MergeAlignment, ProjectionConfig};
use xmatch_telemetry::tracing::init_test_tracing;

async fn write_catalog(root: &Path, name: &str, rows: &[ProjectionRow]) {
    for partition_key in [21, 22] {
        let records: Vec<Record> = rows
            .iter()
            .filter(|row| row.partition_key == partition_key)
            .map(|row| object_record(name, row))
            .collect();
        let path = root.join(format!("train/healpix={partition_key}/000-of-001.json"));

        write_records(&path, &records).await.unwrap();
    }
}

fn sky_rows() -> (Vec<ProjectionRow>, Vec<ProjectionRow>) {
    let mut rng = seeded_rng(11);
    let mut rows = grid_rows(&mut rng, 6, Position::new(200.0, -40.0), 1, 21);
    rows.extend(grid_rows(&mut rng, 6, Position::new(210.0, -40.0), 101, 22));
    let observed = observe_again(&mut rng, &rows, 0.5, 1000);

    (rows, observed)
}

#[tokio::test]
async fn json_catalogs_cross_match_and_merge() {
    init_test_tracing();

    let dir = TempDir::new().unwrap();
    let (rows, observed) = sky_rows();
    write_catalog(&dir.path().join("sdss"), "sdss", &rows).await;
    write_catalog(&dir.path().join("desi"), "desi", &observed).await;

    let left = JsonCatalog::open("sdss", dir.path().join("sdss")).await.unwrap();
    let right = JsonCatalog::open("desi", dir.path().join("desi")).await.unwrap();
    assert_eq!(left.splits(), vec!["train"]);
    assert_eq!(left.data_files("train").len(), 2);

    let table = cross_match_catalogs(
        &left,
        &right,
        &MatchingConfig::default(),
        &ProjectionConfig::default(),
    )
    .await
    .unwrap();
    assert_eq!(table.num_rows(), rows.len());

    let records: Vec<_> = merge_records(table, left, right, MergeAlignment::Positional)
        .unwrap()
        .try_collect()
        .await
        .unwrap();

    assert_eq!(records.len(), rows.len());
    assert_eq!(records[0].fields.get("sdss_object_id"), Some(&Cell::I64(1)));
    assert_eq!(records[0].fields.get("desi_object_id"), Some(&Cell::I64(1001)));
    assert_eq!(records[11].partition_key, 22);
}

#[tokio::test]
async fn malformed_files_are_dropped_from_projection() {
    init_test_tracing();

    let dir = TempDir::new().unwrap();
    let (rows, _) = sky_rows();
    write_catalog(dir.path(), "sdss", &rows).await;
    let broken = dir.path().join("train/healpix=99/000-of-001.json");
    tokio::fs::create_dir_all(broken.parent().unwrap())
        .await
        .unwrap();
    tokio::fs::write(&broken, b"{ not json").await.unwrap();

    let catalog = JsonCatalog::open("sdss", dir.path()).await.unwrap();
    assert_eq!(catalog.data_files("train").len(), 3);

    let projection = project_catalog(&catalog, &ProjectionConfig::default())
        .await
        .unwrap();

    assert_eq!(projection.len(), rows.len());
}

#[tokio::test]
async fn non_object_rows_are_rejected() {
    init_test_tracing();

    let dir = TempDir::new().unwrap();
    let file = dir.path().join("train/healpix=1/000-of-001.json");
    tokio::fs::create_dir_all(file.parent().unwrap())
        .await
        .unwrap();
    tokio::fs::write(&file, b"[{\"object_id\": 1}, 2]")
        .await
        .unwrap();

    let catalog = JsonCatalog::open("sdss", dir.path()).await.unwrap();
    let err = catalog
        .read_columns(&catalog.data_files("train")[0], &["object_id".to_string()])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DeserializationError);
}
