use futures::StreamExt;
use std::path::Path;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, warn};
use xmatch::catalog::JsonCatalog;
use xmatch::crossmatch::{build_master_from_sources, cross_match_catalogs};
use xmatch::merge::merge_records;
use xmatch_config::shared::{
    CatalogConfig, JobConfig, MatchingConfig, ProjectionConfig, RunnerConfig,
};

use crate::error::RunnerResult;

/// Runs the job described by the configuration.
///
/// Catalogs are opened from their JSON directories, then the job writes its output file.
/// Partitions abandoned while merging records are logged and counted, they do not fail the
/// run.
pub async fn start_runner_with_config(config: RunnerConfig) -> RunnerResult<()> {
    info!("starting cross-match runner");

    log_config(&config);

    match config.job {
        JobConfig::CrossMatch {
            left,
            right,
            output,
        } => {
            run_cross_match(&left, &right, &output, &config.matching, &config.projection).await
        }
        JobConfig::MasterCatalog { catalogs, output } => {
            run_master_catalog(&catalogs, &output, &config.matching, &config.projection).await
        }
    }
}

/// Cross-matches two catalogs and writes their merged records, one JSON object per line.
async fn run_cross_match(
    left: &CatalogConfig,
    right: &CatalogConfig,
    output: &Path,
    matching: &MatchingConfig,
    projection: &ProjectionConfig,
) -> RunnerResult<()> {
    let left = open_catalog(left).await?;
    let right = open_catalog(right).await?;

    let table = cross_match_catalogs(&left, &right, matching, projection).await?;
    info!(
        left = left.name(),
        right = right.name(),
        pairs = table.num_rows(),
        partitions = table.groups().len(),
        "catalogs cross-matched"
    );

    let mut writer = BufWriter::new(create_output(output).await?);
    let mut records = merge_records(table, left, right, matching.merge_alignment)?;

    while let Some(record) = records.next().await {
        match record {
            Ok(record) => {
                let mut line = serde_json::to_vec(&record.fields.to_json())?;
                line.push(b'\n');
                writer.write_all(&line).await?;
            }
            Err(err) => warn!(error = %err, "skipping partition"),
        }
    }
    writer.flush().await?;

    let stats = records.stats();
    info!(
        output = %output.display(),
        emitted = stats.emitted,
        misaligned = stats.misaligned,
        misalignment_runs = stats.misalignment_runs,
        partitions = stats.partitions,
        failed_partitions = stats.failed_partitions,
        "merged records written"
    );

    Ok(())
}

/// Builds the master catalog of several catalogs and writes it as a JSON array of rows.
async fn run_master_catalog(
    catalogs: &[CatalogConfig],
    output: &Path,
    matching: &MatchingConfig,
    projection: &ProjectionConfig,
) -> RunnerResult<()> {
    let mut sources = Vec::with_capacity(catalogs.len());
    for catalog in catalogs {
        sources.push(open_catalog(catalog).await?);
    }
    let names: Vec<&str> = catalogs.iter().map(|catalog| catalog.name.as_str()).collect();

    let master = build_master_from_sources(&sources, &names, matching, projection).await?;
    let rows = master.to_column_table()?.to_json_rows();

    let mut writer = BufWriter::new(create_output(output).await?);
    writer.write_all(&serde_json::to_vec(&rows)?).await?;
    writer.flush().await?;

    info!(
        output = %output.display(),
        catalogs = names.len(),
        rows = master.len(),
        "master catalog written"
    );

    Ok(())
}

async fn open_catalog(config: &CatalogConfig) -> RunnerResult<JsonCatalog> {
    let catalog = JsonCatalog::open(config.name.clone(), config.root.clone()).await?;
    debug!(
        catalog = catalog.name(),
        root = %catalog.root().display(),
        splits = ?catalog.splits(),
        "catalog opened"
    );

    Ok(catalog)
}

async fn create_output(path: &Path) -> RunnerResult<tokio::fs::File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }

    Ok(tokio::fs::File::create(path).await?)
}

fn log_config(config: &RunnerConfig) {
    log_job_config(&config.job);
    log_matching_config(&config.matching);
    log_projection_config(&config.projection);
}

fn log_job_config(config: &JobConfig) {
    match config {
        JobConfig::CrossMatch {
            left,
            right,
            output,
        } => {
            debug!(
                left = %left.name,
                right = %right.name,
                output = %output.display(),
                "using cross-match job config"
            )
        }
        JobConfig::MasterCatalog { catalogs, output } => {
            let names: Vec<&str> = catalogs.iter().map(|catalog| catalog.name.as_str()).collect();
            debug!(
                catalogs = ?names,
                output = %output.display(),
                "using master catalog job config"
            )
        }
    }
}

fn log_matching_config(config: &MatchingConfig) {
    debug!(
        radius_arcsec = config.radius_arcsec,
        master_strategy = ?config.master_strategy,
        merge_alignment = ?config.merge_alignment,
        "using matching config"
    );
}

fn log_projection_config(config: &ProjectionConfig) {
    debug!(
        split = %config.split,
        num_proc = config.num_proc,
        columns = ?config.columns,
        "using projection config"
    );
}
