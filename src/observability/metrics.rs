//! Metrics collection and exposition.
//!
//! # Metrics
//! - `mailserver_services_running` (gauge): services still awaiting an outcome
//! - `mailserver_service_outcomes_total` (counter): outcomes by service, result
//! - `mailserver_stop_duration_seconds` (histogram): time spent in stop
//! - `mailserver_active_connections` (gauge): open connections per listener
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so library users and
//!   tests pay nothing
//! - Prometheus exporter is opt-in via config

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and serve it on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn set_services_running(count: usize) {
    gauge!("mailserver_services_running").set(count as f64);
}

pub fn record_outcome(service: &str, clean: bool) {
    let result = if clean { "clean" } else { "failed" };
    counter!(
        "mailserver_service_outcomes_total",
        "service" => service.to_string(),
        "result" => result
    )
    .increment(1);
}

pub fn record_stop_duration(service: &str, elapsed: Duration) {
    histogram!("mailserver_stop_duration_seconds", "service" => service.to_string())
        .record(elapsed.as_secs_f64());
}

pub fn set_active_connections(listener: &str, count: u64) {
    gauge!("mailserver_active_connections", "listener" => listener.to_string()).set(count as f64);
}
