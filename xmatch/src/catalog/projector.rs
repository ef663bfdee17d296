use futures::{StreamExt, stream};
use metrics::counter;
use tracing::{debug, info, warn};
use xmatch_config::shared::ProjectionConfig;

use crate::bail;
use crate::catalog::CatalogSource;
use crate::error::{ErrorKind, XmResult};
use crate::metrics::{CATALOG_LABEL, XM_PROJECTION_DROPPED_FILES_TOTAL, register_metrics};
use crate::types::{
    CatalogProjection, ColumnTable, OBJECT_ID_COLUMN, PROJECTION_COLUMNS, SOURCE_ID_COLUMN,
};

/// Reads `columns` from every data file of `split` and concatenates them in file order.
///
/// Files that do not store `object_id` have their `source_id` column used in its place. Up
/// to `num_proc` files are read concurrently. A file failing with a per-file error (see
/// [`ErrorKind::is_per_file`]) is logged and dropped; when every file is dropped the result is
/// an empty table.
///
/// Fails with [`ErrorKind::ConfigError`] when the split has no files or `num_proc` is zero,
/// and with [`ErrorKind::SchemaError`] when a file lacks a requested column.
pub async fn get_catalog<S>(
    source: &S,
    columns: &[String],
    split: &str,
    num_proc: usize,
) -> XmResult<ColumnTable>
where
    S: CatalogSource + Sync,
{
    register_metrics();

    if num_proc == 0 {
        bail!(
            ErrorKind::ConfigError,
            "At least one file must be read at a time",
            "num_proc is 0"
        );
    }

    let files = source.data_files(split);
    if files.is_empty() {
        bail!(
            ErrorKind::ConfigError,
            "At least one data file must be specified",
            format!("catalog `{}` has no data files for split `{split}`", source.name())
        );
    }

    let requested = requested_columns(columns);
    debug!(
        catalog = source.name(),
        split,
        files = files.len(),
        num_proc,
        "reading catalog columns"
    );

    let results: Vec<(String, XmResult<ColumnTable>)> = stream::iter(files)
        .map(|file| {
            let requested = &requested;
            async move {
                let result = source.read_columns(&file, requested).await;
                (file, result)
            }
        })
        .buffered(num_proc)
        .collect()
        .await;

    let mut tables = Vec::with_capacity(results.len());
    let mut dropped_files = 0u64;
    for (file, result) in results {
        match result {
            Ok(table) if table.num_rows() == 0 => {
                debug!(catalog = source.name(), file = %file, "skipping empty catalog file");
            }
            Ok(table) => tables.push(select_columns(table, columns, &file)?),
            Err(err) if err.kind().is_per_file() => {
                warn!(
                    catalog = source.name(),
                    file = %file,
                    error = %err,
                    "dropping unreadable catalog file"
                );
                dropped_files += 1;
            }
            Err(err) => return Err(err),
        }
    }

    if dropped_files > 0 {
        counter!(
            XM_PROJECTION_DROPPED_FILES_TOTAL,
            CATALOG_LABEL => source.name().to_string(),
        )
        .increment(dropped_files);
    }

    let table = ColumnTable::vstack(tables)?;
    info!(
        catalog = source.name(),
        rows = table.num_rows(),
        dropped_files,
        "catalog columns read"
    );

    Ok(table)
}

/// Extracts the positional projection of a catalog.
///
/// The projection columns are always read, in addition to the configured ones. Configured
/// columns beyond the projection columns are carried in the rows' extra values, so a file
/// lacking one of them fails with [`ErrorKind::SchemaError`].
pub async fn project_catalog<S>(source: &S, config: &ProjectionConfig) -> XmResult<CatalogProjection>
where
    S: CatalogSource + Sync,
{
    let mut columns: Vec<String> = PROJECTION_COLUMNS.iter().map(|c| c.to_string()).collect();
    for column in &config.columns {
        if !columns.contains(column) {
            columns.push(column.clone());
        }
    }

    let table = get_catalog(source, &columns, &config.split, config.num_proc).await?;

    CatalogProjection::from_columns(source.name(), &table)
}

/// Adds `source_id` to the requested columns when `object_id` is requested.
fn requested_columns(columns: &[String]) -> Vec<String> {
    let mut requested = columns.to_vec();
    if requested.iter().any(|c| c == OBJECT_ID_COLUMN)
        && !requested.iter().any(|c| c == SOURCE_ID_COLUMN)
    {
        requested.push(SOURCE_ID_COLUMN.to_string());
    }

    requested
}

/// Reorders a file table to the requested columns, substituting `source_id` for `object_id`.
fn select_columns(mut table: ColumnTable, columns: &[String], file: &str) -> XmResult<ColumnTable> {
    let mut selected = ColumnTable::new();

    for name in columns {
        let column = match table.take_column(name) {
            Some(column) => column,
            None if name == OBJECT_ID_COLUMN => match table.column(SOURCE_ID_COLUMN) {
                Some(column) => column.clone(),
                None => bail!(
                    ErrorKind::SchemaError,
                    "Neither object_id nor source_id found in catalog file",
                    file
                ),
            },
            None => bail!(
                ErrorKind::SchemaError,
                "Requested column not found in catalog file",
                format!("column `{name}` in `{file}`")
            ),
        };

        selected = selected.with_column(name.as_str(), column)?;
    }

    Ok(selected)
}
