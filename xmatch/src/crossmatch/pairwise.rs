use metrics::counter;
use std::collections::BTreeMap;
use tracing::info;
use xmatch_config::shared::{MatchingConfig, ProjectionConfig};

use crate::bail;
use crate::catalog::{CatalogSource, project_catalog};
use crate::crossmatch::{CrossMatchGroup, CrossMatchRow, CrossMatchStats, CrossMatchTable};
use crate::error::{ErrorKind, XmResult};
use crate::metrics::{
    LEFT_CATALOG_LABEL, RIGHT_CATALOG_LABEL, XM_CROSSMATCH_BOUNDARY_LOSSES_TOTAL,
    XM_CROSSMATCH_FINAL_MATCHES_TOTAL, XM_CROSSMATCH_INITIAL_MATCHES_TOTAL, register_metrics,
};
use crate::spatial::match_to_catalog;
use crate::types::{CatalogProjection, PartitionKey};

/// Cross-matches two catalog projections.
///
/// Every left object is paired with its nearest right object; pairs at least `radius_arcsec`
/// apart are dropped, and so are pairs whose objects fall in different partitions. The
/// remaining rows are grouped by partition, groups in ascending partition order and rows in
/// ascending left row index.
pub fn cross_match(
    left: &CatalogProjection,
    right: &CatalogProjection,
    radius_arcsec: f64,
) -> XmResult<CrossMatchTable> {
    register_metrics();
    validate_radius(radius_arcsec)?;

    if left.name() == right.name() {
        bail!(
            ErrorKind::ConfigError,
            "Cross-matched catalogs must have different names",
            left.name()
        );
    }

    let matches = match_to_catalog(&left.positions(), &right.positions());

    let mut left_indices = Vec::new();
    let mut right_indices = Vec::new();
    let mut separations = Vec::new();
    for (left_index, nearest) in matches.iter().enumerate() {
        if let Some(right_index) = nearest.within(radius_arcsec) {
            left_indices.push(left_index);
            right_indices.push(right_index);
            separations.push(nearest.separation_arcsec);
        }
    }

    if left_indices.len() != right_indices.len() {
        bail!(
            ErrorKind::InvariantViolation,
            "Left and right match counts differ after the radius filter",
            format!("{} left rows, {} right rows", left_indices.len(), right_indices.len())
        );
    }

    let initial_matches = left_indices.len();

    let mut groups: BTreeMap<PartitionKey, Vec<CrossMatchRow>> = BTreeMap::new();
    let mut final_matches = 0;
    for ((left_index, right_index), separation_arcsec) in
        left_indices.into_iter().zip(right_indices).zip(separations)
    {
        let (Some(left_row), Some(right_row)) = (left.row(left_index), right.row(right_index))
        else {
            bail!(
                ErrorKind::InvariantViolation,
                "Matched row index is out of bounds",
                format!("left row {left_index}, right row {right_index}")
            );
        };

        if left_row.partition_key != right_row.partition_key {
            continue;
        }

        groups
            .entry(left_row.partition_key)
            .or_default()
            .push(CrossMatchRow {
                id: left_row.id.clone(),
                position: left_row.position.midpoint(&right_row.position),
                partition_key: left_row.partition_key,
                left: left_row.clone(),
                left_index,
                right: right_row.clone(),
                right_index,
                separation_arcsec,
            });
        final_matches += 1;
    }

    for (partition_key, rows) in &groups {
        if let Some(row) = rows.iter().find(|row| {
            row.left.partition_key != *partition_key || row.right.partition_key != *partition_key
        }) {
            bail!(
                ErrorKind::InvariantViolation,
                "Matched rows disagree on their partition",
                format!(
                    "group {partition_key} holds left {} / right {}",
                    row.left.partition_key, row.right.partition_key
                )
            );
        }
    }

    let stats = CrossMatchStats {
        initial_matches,
        boundary_losses: initial_matches - final_matches,
        final_matches,
    };
    report_stats(left.name(), right.name(), stats);

    let groups = groups
        .into_iter()
        .map(|(partition_key, rows)| CrossMatchGroup {
            partition_key,
            rows,
        })
        .collect();

    Ok(CrossMatchTable::new(
        left.name().to_string(),
        left.extra_columns().to_vec(),
        right.name().to_string(),
        right.extra_columns().to_vec(),
        groups,
        stats,
    ))
}

/// Projects two catalogs and cross-matches them.
pub async fn cross_match_catalogs<L, R>(
    left: &L,
    right: &R,
    matching: &MatchingConfig,
    projection: &ProjectionConfig,
) -> XmResult<CrossMatchTable>
where
    L: CatalogSource + Sync,
    R: CatalogSource + Sync,
{
    validate_radius(matching.radius_arcsec)?;

    let left = project_catalog(left, projection).await?;
    let right = project_catalog(right, projection).await?;

    cross_match(&left, &right, matching.radius_arcsec)
}

pub(crate) fn validate_radius(radius_arcsec: f64) -> XmResult<()> {
    if !radius_arcsec.is_finite() || radius_arcsec <= 0.0 {
        bail!(
            ErrorKind::ConfigError,
            "Matching radius must be a positive finite number",
            format!("radius is {radius_arcsec} arcsec")
        );
    }

    Ok(())
}

fn report_stats(left_name: &str, right_name: &str, stats: CrossMatchStats) {
    info!(
        left = left_name,
        right = right_name,
        initial_matches = stats.initial_matches,
        "initial number of matches"
    );
    info!(
        left = left_name,
        right = right_name,
        boundary_losses = stats.boundary_losses,
        "matches lost at partition borders"
    );
    info!(
        left = left_name,
        right = right_name,
        final_matches = stats.final_matches,
        "final size of cross-matched catalog"
    );

    for (name, value) in [
        (XM_CROSSMATCH_INITIAL_MATCHES_TOTAL, stats.initial_matches),
        (XM_CROSSMATCH_BOUNDARY_LOSSES_TOTAL, stats.boundary_losses),
        (XM_CROSSMATCH_FINAL_MATCHES_TOTAL, stats.final_matches),
    ] {
        counter!(
            name,
            LEFT_CATALOG_LABEL => left_name.to_string(),
            RIGHT_CATALOG_LABEL => right_name.to_string(),
        )
        .increment(value as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Position, ProjectionRow};

    fn projection(name: &str, rows: &[(i64, f64, f64, i64)]) -> CatalogProjection {
        CatalogProjection::new(
            name,
            rows.iter()
                .map(|&(id, ra, dec, healpix)| {
                    ProjectionRow::new(id, Position::new(ra, dec), healpix)
                })
                .collect(),
        )
    }

    const ARCSEC: f64 = 1.0 / 3600.0;

    #[test]
    fn test_boundary_losses_are_counted() {
        let left = projection("a", &[(1, 10.0, 0.0, 5), (2, 20.0, 0.0, 5), (3, 30.0, 0.0, 6)]);
        let right = projection(
            "b",
            &[
                (11, 10.0 + 0.2 * ARCSEC, 0.0, 5),
                (12, 20.0, 0.2 * ARCSEC, 7),
                (13, 30.0, 0.0, 6),
            ],
        );

        let table = cross_match(&left, &right, 1.0).unwrap();

        assert_eq!(
            table.stats(),
            CrossMatchStats {
                initial_matches: 3,
                boundary_losses: 1,
                final_matches: 2,
            }
        );
        assert_eq!(table.groups().len(), 2);
        assert_eq!(table.groups()[0].partition_key, 5);
        assert_eq!(table.groups()[0].right_ids()[0].as_str(), "11");
        assert_eq!(table.groups()[1].left_ids()[0].as_str(), "3");
    }

    #[test]
    fn test_rows_within_group_follow_left_order() {
        let left = projection("a", &[(1, 10.0, 0.0, 5), (2, 11.0, 0.0, 5), (3, 12.0, 0.0, 5)]);
        let right = projection("b", &[(13, 12.0, 0.0, 5), (11, 10.0, 0.0, 5), (12, 11.0, 0.0, 5)]);

        let table = cross_match(&left, &right, 1.0).unwrap();

        let group = &table.groups()[0];
        let left_indices: Vec<usize> = group.rows.iter().map(|row| row.left_index).collect();
        let right_indices: Vec<usize> = group.rows.iter().map(|row| row.right_index).collect();
        assert_eq!(left_indices, vec![0, 1, 2]);
        assert_eq!(right_indices, vec![1, 2, 0]);
    }

    #[test]
    fn test_invalid_radius() {
        let left = projection("a", &[(1, 10.0, 0.0, 5)]);
        let right = projection("b", &[(1, 10.0, 0.0, 5)]);

        for radius in [0.0, -1.0, f64::NAN] {
            assert_eq!(
                cross_match(&left, &right, radius).unwrap_err().kind(),
                ErrorKind::ConfigError
            );
        }
    }

    #[test]
    fn test_same_names_are_rejected() {
        let left = projection("a", &[(1, 10.0, 0.0, 5)]);

        assert_eq!(
            cross_match(&left, &left, 1.0).unwrap_err().kind(),
            ErrorKind::ConfigError
        );
    }

    #[test]
    fn test_column_table() {
        let left = projection("sdss", &[(1, 10.0, 1.0, 5)]);
        let right = projection("desi", &[(9, 10.0, 1.0 + 0.5 * ARCSEC, 5)]);

        let table = cross_match(&left, &right, 1.0).unwrap();
        let columns = table.to_column_table().unwrap();

        assert_eq!(
            columns.column_names(),
            vec![
                "object_id",
                "ra",
                "dec",
                "healpix",
                "sdss_object_id",
                "sdss_ra",
                "sdss_dec",
                "sdss_healpix",
                "desi_object_id",
                "desi_ra",
                "desi_dec",
                "desi_healpix",
            ]
        );
        assert_eq!(
            table.column("desi_object_id").unwrap(),
            Some(crate::types::Column::String(vec!["9".to_string()]))
        );
        let Some(crate::types::Column::F64(dec)) = columns.column("dec") else {
            panic!("dec column is missing");
        };
        assert!((dec[0] - (1.0 + 0.25 * ARCSEC)).abs() < 1e-12);
    }
}
