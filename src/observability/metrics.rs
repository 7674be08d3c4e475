//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define service metrics (requests, latency, admission counters)
//! - Expose a Prometheus-compatible scrape endpoint
//! - Sample the admission controller on a fixed interval
//!
//! # Metrics
//! - `herdmaster_requests_total` (counter): requests by method, status
//! - `herdmaster_request_duration_seconds` (histogram): latency distribution
//! - `herdmaster_admission_running` (gauge): requests holding a running slot
//! - `herdmaster_admission_in_flight` (gauge): requests queued or running
//! - `herdmaster_admission_rejected_total` (counter): over `max_in_flight`
//! - `herdmaster_admission_timed_out_total` (counter): deadline while queued
//!
//! # Design Decisions
//! - Without an installed recorder every call here is a no-op
//! - Admission counters are published with `absolute`, the controller owns
//!   the source of truth

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::admission::{AdmissionController, AdmissionSnapshot};

pub const REQUESTS_TOTAL: &str = "herdmaster_requests_total";
pub const REQUEST_DURATION_SECONDS: &str = "herdmaster_request_duration_seconds";
pub const ADMISSION_RUNNING: &str = "herdmaster_admission_running";
pub const ADMISSION_IN_FLIGHT: &str = "herdmaster_admission_in_flight";
pub const ADMISSION_REJECTED_TOTAL: &str = "herdmaster_admission_rejected_total";
pub const ADMISSION_TIMED_OUT_TOTAL: &str = "herdmaster_admission_timed_out_total";

/// Install the global Prometheus recorder and its HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    describe();

    tracing::info!(address = %addr, "Prometheus exporter listening");
    Ok(())
}

fn describe() {
    ::metrics::describe_counter!(REQUESTS_TOTAL, "Requests answered, by method and status");
    ::metrics::describe_histogram!(
        REQUEST_DURATION_SECONDS,
        ::metrics::Unit::Seconds,
        "Time from admission to response"
    );
    ::metrics::describe_gauge!(ADMISSION_RUNNING, "Requests holding a running slot");
    ::metrics::describe_gauge!(ADMISSION_IN_FLIGHT, "Requests queued or running");
    ::metrics::describe_counter!(
        ADMISSION_REJECTED_TOTAL,
        "Requests rejected for exceeding max_in_flight"
    );
    ::metrics::describe_counter!(
        ADMISSION_TIMED_OUT_TOTAL,
        "Requests whose deadline passed while queued"
    );
}

/// Record one answered request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    ::metrics::counter!(
        REQUESTS_TOTAL,
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!(REQUEST_DURATION_SECONDS, "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

/// Publish an admission snapshot.
pub fn record_admission(snapshot: &AdmissionSnapshot) {
    ::metrics::gauge!(ADMISSION_RUNNING).set(snapshot.running as f64);
    ::metrics::gauge!(ADMISSION_IN_FLIGHT).set(snapshot.in_flight as f64);
    ::metrics::counter!(ADMISSION_REJECTED_TOTAL).absolute(snapshot.rejected);
    ::metrics::counter!(ADMISSION_TIMED_OUT_TOTAL).absolute(snapshot.timed_out);
}

/// Sample `controller` every `every` until `shutdown` is cancelled.
pub fn spawn_admission_poller(
    controller: Arc<AdmissionController>,
    every: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let every = every.max(Duration::from_millis(1));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => record_admission(&controller.snapshot()),
                () = shutdown.cancelled() => break,
            }
        }

        tracing::debug!("Admission metrics poller stopped");
    })
}
