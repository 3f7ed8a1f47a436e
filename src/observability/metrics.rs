//! Metrics collection and exposition.
//!
//! # Metrics
//! - `runtime_worker_up` (gauge): 1=healthy, 0=otherwise, by worker
//! - `runtime_worker_start_failures_total` (counter): failed starts, by worker
//! - `runtime_dependency_up` (gauge): 1=healthy, 0=otherwise, by dependency
//! - `runtime_http_phase` (gauge): 0=idle 1=starting 2=ready 3=closing 4=stopped
//! - `runtime_shutdown_stage_total` (counter): by stage and outcome
//! - `runtime_startup_duration_seconds` (histogram)

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::health::HealthStatus;
use crate::lifecycle::coordinator::HttpPhase;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_worker_status(worker: &str, status: HealthStatus) {
    let up = if status == HealthStatus::Healthy { 1.0 } else { 0.0 };
    gauge!("runtime_worker_up", "worker" => worker.to_string()).set(up);
}

pub fn record_worker_start_failure(worker: &str) {
    counter!("runtime_worker_start_failures_total", "worker" => worker.to_string()).increment(1);
}

pub fn record_dependency_status(dependency: &str, status: HealthStatus) {
    let up = if status == HealthStatus::Healthy { 1.0 } else { 0.0 };
    gauge!("runtime_dependency_up", "dependency" => dependency.to_string()).set(up);
}

pub fn record_http_phase(phase: HttpPhase) {
    let value = match phase {
        HttpPhase::Idle => 0.0,
        HttpPhase::Starting => 1.0,
        HttpPhase::Ready => 2.0,
        HttpPhase::Closing => 3.0,
        HttpPhase::Stopped => 4.0,
    };
    gauge!("runtime_http_phase").set(value);
}

pub fn record_shutdown_stage(stage: &'static str, outcome: &'static str) {
    counter!("runtime_shutdown_stage_total", "stage" => stage, "outcome" => outcome).increment(1);
}

pub fn record_startup_duration(elapsed: Duration) {
    histogram!("runtime_startup_duration_seconds").record(elapsed.as_secs_f64());
}
