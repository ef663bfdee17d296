//! Cross-match runner binary.
//!
//! Loads the layered configuration, initializes telemetry and runs one cross-matching job over
//! catalogs stored as JSON files.

use std::process::ExitCode;

use tracing::{error, info};
use xmatch_config::shared::RunnerConfig;
use xmatch_telemetry::metrics::{init_metrics_handle, render_metrics};
use xmatch_telemetry::tracing::init_tracing;

use crate::config::load_runner_config;
use crate::core::start_runner_with_config;
use crate::error::{RunnerError, RunnerResult};

mod config;
mod core;
mod error;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprint!("{}", err.render_report());
            ExitCode::FAILURE
        }
    }
}

/// Loads configuration, initializes tracing and metrics, then runs the job on a fresh runtime.
fn run() -> RunnerResult<()> {
    let runner_config = load_runner_config()?;

    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME")).map_err(RunnerError::config)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(runner_config))
}

async fn async_main(runner_config: RunnerConfig) -> RunnerResult<()> {
    let metrics_handle = init_metrics_handle().map_err(RunnerError::config)?;
    let metrics_output = runner_config.metrics_output.clone();

    if let Err(err) = start_runner_with_config(runner_config).await {
        error!("{err}");
        return Err(err);
    }

    if let Some(path) = metrics_output {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, render_metrics(&metrics_handle)).await?;
        info!(path = %path.display(), "metrics written");
    }

    Ok(())
}
