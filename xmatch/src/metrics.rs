//! Metric names emitted by the cross-matching pipeline.
//!
//! Metrics go through the [`metrics`] facade. Without an installed recorder they are no-ops,
//! so the library never decides where counts end up.

use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};

static REGISTER_METRICS: Once = Once::new();

/// Label for the catalog name.
pub const CATALOG_LABEL: &str = "catalog";

/// Label for the left catalog of a pairwise operation.
pub const LEFT_CATALOG_LABEL: &str = "left_catalog";

/// Label for the right catalog of a pairwise operation.
pub const RIGHT_CATALOG_LABEL: &str = "right_catalog";

// Projection metrics

/// Counter for catalog files dropped because they could not be read.
pub const XM_PROJECTION_DROPPED_FILES_TOTAL: &str = "xm_projection_dropped_files_total";

// Pairwise cross-match metrics

/// Counter for pairs within the matching radius, before the partition check.
pub const XM_CROSSMATCH_INITIAL_MATCHES_TOTAL: &str = "xm_crossmatch_initial_matches_total";

/// Counter for pairs discarded because both sides fall in different partitions.
pub const XM_CROSSMATCH_BOUNDARY_LOSSES_TOTAL: &str = "xm_crossmatch_boundary_losses_total";

/// Counter for pairs kept in the cross-match table.
pub const XM_CROSSMATCH_FINAL_MATCHES_TOTAL: &str = "xm_crossmatch_final_matches_total";

// Master catalog metrics

/// Counter for existing master rows matched by a folded catalog.
pub const XM_MASTER_MATCHED_ROWS_TOTAL: &str = "xm_master_matched_rows_total";

/// Counter for rows appended to the master catalog.
pub const XM_MASTER_APPENDED_ROWS_TOTAL: &str = "xm_master_appended_rows_total";

// Record merge metrics

/// Counter for merged records produced.
pub const XM_MERGE_EMITTED_RECORDS_TOTAL: &str = "xm_merge_emitted_records_total";

/// Counter for record pairs skipped because of misalignment.
pub const XM_MERGE_MISALIGNED_PAIRS_TOTAL: &str = "xm_merge_misaligned_pairs_total";

/// Histogram of contiguous misalignment run lengths.
pub const XM_MERGE_MISALIGNMENT_RUN_LENGTH: &str = "xm_merge_misalignment_run_length";

/// Registers the descriptions of all metrics.
///
/// Safe to call any number of times, registration only happens once.
pub(crate) fn register_metrics() {
    REGISTER_METRICS.call_once(|| {
        describe_counter!(
            XM_PROJECTION_DROPPED_FILES_TOTAL,
            Unit::Count,
            "Catalog files dropped during projection because they failed to open or parse"
        );

        describe_counter!(
            XM_CROSSMATCH_INITIAL_MATCHES_TOTAL,
            Unit::Count,
            "Pairs within the matching radius before the partition boundary check"
        );

        describe_counter!(
            XM_CROSSMATCH_BOUNDARY_LOSSES_TOTAL,
            Unit::Count,
            "Pairs lost because both objects fall in different partitions"
        );

        describe_counter!(
            XM_CROSSMATCH_FINAL_MATCHES_TOTAL,
            Unit::Count,
            "Pairs kept in the cross-match table"
        );

        describe_counter!(
            XM_MASTER_MATCHED_ROWS_TOTAL,
            Unit::Count,
            "Existing master catalog rows matched by a folded catalog"
        );

        describe_counter!(
            XM_MASTER_APPENDED_ROWS_TOTAL,
            Unit::Count,
            "New rows appended to the master catalog"
        );

        describe_counter!(
            XM_MERGE_EMITTED_RECORDS_TOTAL,
            Unit::Count,
            "Merged records produced by the record stream merger"
        );

        describe_counter!(
            XM_MERGE_MISALIGNED_PAIRS_TOTAL,
            Unit::Count,
            "Record pairs skipped because their ids did not match the cross-match table"
        );

        describe_histogram!(
            XM_MERGE_MISALIGNMENT_RUN_LENGTH,
            Unit::Count,
            "Length of contiguous runs of misaligned record pairs"
        );
    });
}
