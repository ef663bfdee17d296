use xmatch::crossmatch::{ABSENT_ROW_INDEX, MasterCatalog, build_master, build_master_from_sources};
use xmatch::error::ErrorKind;
use xmatch::test_utils::catalog::memory_catalog;
use xmatch::test_utils::sky::{grid_rows, observe_again, seeded_rng};
use xmatch::types::{CatalogProjection, Column, Position, ProjectionRow};
use xmatch_config::shared::{MasterBuildStrategy, MatchingConfig, ProjectionConfig};
use xmatch_telemetry::tracing::init_test_tracing;

fn sky(seed: u64, count: usize) -> Vec<ProjectionRow> {
    let mut rng = seeded_rng(seed);
    grid_rows(&mut rng, count, Position::new(120.0, 30.0), 1, 42)
}

#[tokio::test]
async fn single_catalog_becomes_the_master_catalog() {
    init_test_tracing();

    let rows = sky(1, 12);
    let catalog = CatalogProjection::new("sdss", rows.clone());

    let master = build_master(&[catalog], &["sdss"], &MatchingConfig::default()).unwrap();

    assert_eq!(master.len(), rows.len());
    assert_eq!(master.positions(), rows.iter().map(|r| r.position).collect::<Vec<_>>());
    assert_eq!(master.presence("sdss").unwrap(), vec![true; rows.len()]);
    assert_eq!(
        master.row_indices("sdss").unwrap(),
        (0..rows.len() as i64).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn catalog_folded_twice_adds_no_rows() {
    init_test_tracing();

    let rows = sky(2, 12);
    let catalog = CatalogProjection::new("sdss", rows.clone());

    let master = build_master(
        &[catalog.clone(), catalog],
        &["sdss", "sdss_again"],
        &MatchingConfig::default(),
    )
    .unwrap();

    assert_eq!(master.len(), rows.len());
    assert_eq!(
        master.row_indices("sdss").unwrap(),
        master.row_indices("sdss_again").unwrap()
    );
}

#[tokio::test]
async fn duplicate_names_are_rejected() {
    init_test_tracing();

    let catalog = CatalogProjection::new("sdss", sky(3, 3));

    let err = build_master(
        &[catalog.clone(), catalog],
        &["sdss", "sdss"],
        &MatchingConfig::default(),
    )
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConfigError);
}

#[tokio::test]
async fn partially_overlapping_sources_are_unioned() {
    init_test_tracing();

    let rows = sky(4, 20);
    let mut rng = seeded_rng(5);
    // The second survey sees the first 15 objects, the third one the last 10.
    let second = observe_again(&mut rng, &rows[..15], 0.4, 1000);
    let third = observe_again(&mut rng, &rows[10..], 0.4, 2000);

    let sources = [
        memory_catalog("sdss", &rows),
        memory_catalog("desi", &second),
        memory_catalog("gaia", &third),
    ];

    let master = build_master_from_sources(
        &sources,
        &["sdss", "desi", "gaia"],
        &MatchingConfig::default(),
        &ProjectionConfig::default(),
    )
    .await
    .unwrap();

    assert_eq!(master.len(), rows.len());
    let desi = master.row_indices("desi").unwrap();
    let gaia = master.row_indices("gaia").unwrap();
    for index in 0..rows.len() {
        let expected_desi = if index < 15 { index as i64 } else { ABSENT_ROW_INDEX };
        let expected_gaia = if index >= 10 { index as i64 - 10 } else { ABSENT_ROW_INDEX };
        assert_eq!(desi[index], expected_desi);
        assert_eq!(gaia[index], expected_gaia);
    }

    let table = master.to_column_table().unwrap();
    assert_eq!(
        table.column_names(),
        vec!["ra", "dec", "healpix", "sdss", "desi", "gaia", "sdss_idx", "desi_idx", "gaia_idx"]
    );
    assert_eq!(
        table.column("gaia"),
        Some(&Column::Bool((0..20).map(|index| index >= 10).collect()))
    );
}

#[tokio::test]
async fn disjoint_catalogs_append_every_object() {
    init_test_tracing();

    let mut rng = seeded_rng(6);
    let north = grid_rows(&mut rng, 5, Position::new(0.0, 60.0), 1, 1);
    let south = grid_rows(&mut rng, 7, Position::new(0.0, -60.0), 1, 2);

    let master = build_master(
        &[
            CatalogProjection::new("north", north),
            CatalogProjection::new("south", south),
        ],
        &["north", "south"],
        &MatchingConfig::default(),
    )
    .unwrap();

    assert_eq!(master.len(), 12);
    assert_eq!(master.presence("north").unwrap().iter().filter(|p| **p).count(), 5);
    assert_eq!(master.presence("south").unwrap().iter().filter(|p| **p).count(), 7);
}

#[tokio::test]
async fn rebuilding_gives_the_same_master_catalog() {
    init_test_tracing();

    let rows = sky(7, 25);
    let mut rng = seeded_rng(8);
    let catalogs = [
        CatalogProjection::new("sdss", rows.clone()),
        CatalogProjection::new("desi", observe_again(&mut rng, &rows[5..], 0.5, 500)),
        CatalogProjection::new("gaia", observe_again(&mut rng, &rows[..20], 0.5, 900)),
    ];
    let names = ["sdss", "desi", "gaia"];

    for strategy in [
        MasterBuildStrategy::SequentialFold,
        MasterBuildStrategy::GlobalClustering,
    ] {
        let config = MatchingConfig {
            master_strategy: strategy,
            ..MatchingConfig::default()
        };

        let first: MasterCatalog = build_master(&catalogs, &names, &config).unwrap();
        let second = build_master(&catalogs, &names, &config).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), rows.len());
    }
}
