//! Metrics collection and exposition.
//!
//! # Metrics
//! - `guardsync_operations_total{kind, op, outcome}` (counter): item operations
//! - `guardsync_toggles_total{toggle, outcome}` (counter): toggle comparisons
//! - `guardsync_replica_runs_total{status}` (counter): replica results
//! - `guardsync_run_duration_seconds` (histogram): wall time of one run

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::model::EntityKind;
use crate::reconcile::{Operation, Toggle};

/// Runs take seconds to minutes depending on replica count and latency.
const RUN_DURATION_BUCKETS: &[f64] = &[0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0];

/// Install the Prometheus recorder with an HTTP listener on `addr`.
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets(RUN_DURATION_BUCKETS)?
        .install()?;

    describe_counter!("guardsync_operations_total", "Item operations applied to replicas");
    describe_counter!("guardsync_toggles_total", "Toggle settings compared on replicas");
    describe_counter!("guardsync_replica_runs_total", "Replica runs by final status");
    describe_histogram!("guardsync_run_duration_seconds", "Duration of a full sync run");

    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_operation(kind: EntityKind, op: Operation, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!(
        "guardsync_operations_total",
        "kind" => kind.as_str(),
        "op" => op.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_toggle(toggle: Toggle, outcome: &'static str) {
    counter!("guardsync_toggles_total", "toggle" => toggle.as_str(), "outcome" => outcome).increment(1);
}

pub fn record_replica(status: &'static str) {
    counter!("guardsync_replica_runs_total", "status" => status).increment(1);
}

pub fn record_run_duration(duration: Duration) {
    histogram!("guardsync_run_duration_seconds").record(duration.as_secs_f64());
}
