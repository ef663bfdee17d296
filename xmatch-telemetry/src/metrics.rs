use std::sync::{Mutex, PoisonError};

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::debug;

// Installing a recorder is global and fails when done twice, while tests may initialize
// metrics many times. The handle of the first installation is cached and handed out again.
static PROMETHEUS_HANDLE: Mutex<Option<PrometheusHandle>> = Mutex::new(None);

/// Installs the global Prometheus recorder and returns a handle to render its metrics.
///
/// No HTTP endpoint is started. Batch jobs render the handle once their work is done, for
/// instance into a file picked up by a textfile collector.
///
/// Later calls return a clone of the handle created by the first successful call.
pub fn init_metrics_handle() -> Result<PrometheusHandle, BuildError> {
    let mut prometheus_handle = PROMETHEUS_HANDLE
        .lock()
        .unwrap_or_else(PoisonError::into_inner);

    if let Some(handle) = &*prometheus_handle {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    debug!("prometheus metrics recorder installed");
    *prometheus_handle = Some(handle.clone());

    Ok(handle)
}

/// Renders all metrics recorded so far in the Prometheus text format.
pub fn render_metrics(handle: &PrometheusHandle) -> String {
    handle.run_upkeep();
    handle.render()
}
