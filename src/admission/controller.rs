//! Admission controller.
//!
//! # Responsibilities
//! - Count requests inside the service (queued or running)
//! - Reject requests beyond `max_in_flight` without queueing them
//! - Hold the rest until a running slot frees or the caller's deadline passes
//! - Run the downstream future inside the slot and report the outcome
//!
//! # Design Decisions
//! - The in-flight check is increment-then-compare. Under contention the
//!   counter can briefly overshoot `max_in_flight` by the number of racing
//!   callers; every one of them is rejected, none is queued
//! - Running slots are semaphore permits; waiting is a plain `acquire`
//! - Slot and in-flight bookkeeping live in guards, so early returns,
//!   panics and dropped futures all release them
//! - Acquisition and the deadline race in an unbiased `select!`

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::{Response, StatusCode};
use futures_util::FutureExt;
use serde::Serialize;
use tokio::sync::Semaphore;

use crate::admission::limits::CapacityConfig;
use crate::http::{RequestDeadline, RequestId};
use crate::observability::tracing::{Attribute, Reporter, SpanRecorder, TracingReporter};

const SPAN_NAME: &str = "admission";

/// How an admitted request left the controller.
#[derive(Debug)]
pub enum Outcome<T> {
    /// The downstream future ran. `Err` when it panicked.
    Completed(Result<T, HandlerPanic>),
    /// `max_in_flight` was exceeded on arrival.
    Rejected { retry_after_secs: u64 },
    /// The caller's deadline passed while waiting for a running slot.
    TimedOut { retry_after_secs: u64 },
}

impl<T: StatusReport> Outcome<T> {
    /// Status the caller sees for this outcome.
    pub fn status_code(&self) -> u16 {
        match self {
            Outcome::Completed(Ok(value)) => value.status_code(),
            Outcome::Completed(Err(_)) => StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            Outcome::Rejected { .. } | Outcome::TimedOut { .. } => {
                StatusCode::TOO_MANY_REQUESTS.as_u16()
            }
        }
    }
}

/// A panic caught from the downstream future.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("downstream handler panicked: {message}")]
pub struct HandlerPanic {
    message: String,
}

impl HandlerPanic {
    fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self { message }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Anything the controller can read a status code from after it ran.
pub trait StatusReport {
    fn status_code(&self) -> u16;
}

impl<B> StatusReport for Response<B> {
    fn status_code(&self) -> u16 {
        self.status().as_u16()
    }
}

impl StatusReport for StatusCode {
    fn status_code(&self) -> u16 {
        self.as_u16()
    }
}

/// Point-in-time view of the controller's counters and limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdmissionSnapshot {
    pub running: usize,
    pub in_flight: usize,
    pub rejected: u64,
    pub timed_out: u64,
    pub max_running: usize,
    pub max_in_flight: usize,
    pub retry_after_secs: u64,
}

/// Gate bounding how many requests run, and how many wait, at once.
///
/// Share it behind an [`Arc`]; every method takes `&self`.
pub struct AdmissionController {
    limits: CapacityConfig,
    slots: Semaphore,
    slot_count: usize,
    in_flight: AtomicUsize,
    rejected: AtomicU64,
    timed_out: AtomicU64,
    reporter: Arc<dyn Reporter>,
}

impl AdmissionController {
    pub fn new(limits: CapacityConfig, reporter: Arc<dyn Reporter>) -> Self {
        let slot_count = limits.max_running().min(Semaphore::MAX_PERMITS);

        tracing::info!(
            max_running = slot_count,
            max_in_flight = limits.max_in_flight(),
            retry_after_secs = limits.retry_after_secs(),
            "Admission controller ready"
        );

        Self {
            limits,
            slots: Semaphore::new(slot_count),
            slot_count,
            in_flight: AtomicUsize::new(0),
            rejected: AtomicU64::new(0),
            timed_out: AtomicU64::new(0),
            reporter,
        }
    }

    /// Controller reporting spans through the `tracing` crate.
    pub fn with_tracing(limits: CapacityConfig) -> Self {
        Self::new(limits, Arc::new(TracingReporter))
    }

    pub fn limits(&self) -> CapacityConfig {
        self.limits
    }

    /// Requests currently holding a running slot.
    pub fn running(&self) -> usize {
        self.slot_count.saturating_sub(self.slots.available_permits())
    }

    /// Requests inside the controller, queued or running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn timed_out(&self) -> u64 {
        self.timed_out.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> AdmissionSnapshot {
        AdmissionSnapshot {
            running: self.running(),
            in_flight: self.in_flight(),
            rejected: self.rejected(),
            timed_out: self.timed_out(),
            max_running: self.slot_count,
            max_in_flight: self.limits.max_in_flight(),
            retry_after_secs: self.limits.retry_after_secs(),
        }
    }

    /// Admit one request and, capacity permitting, run `downstream`.
    ///
    /// Waits for a running slot until `deadline` expires. Panics raised by
    /// `downstream` are caught and returned as `Completed(Err(_))`.
    pub async fn admit<F, T>(
        &self,
        request_id: &RequestId,
        deadline: &RequestDeadline,
        downstream: F,
    ) -> Outcome<T>
    where
        F: Future<Output = T>,
        T: StatusReport,
    {
        let entered = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        let _in_flight = InFlightGuard(&self.in_flight);
        let mut span = AdmissionSpan {
            recorder: self.reporter.start_span(SPAN_NAME, request_id),
            controller: self,
            request_id,
            queued: false,
        };
        let retry_after_secs = self.limits.retry_after_secs();

        if entered > self.limits.max_in_flight() {
            let rejected = self.rejected.fetch_add(1, Ordering::Relaxed) + 1;
            let running = self.running();
            span.recorder.add_event(
                "request rejected",
                &[
                    Attribute::int("in_flight", entered),
                    Attribute::int("running", running),
                    Attribute::int("max_in_flight", self.limits.max_in_flight()),
                ],
            );
            tracing::warn!(
                %request_id,
                in_flight = entered,
                running,
                max_in_flight = self.limits.max_in_flight(),
                rejected_total = rejected,
                "Too many requests in flight, rejecting"
            );
            return Outcome::Rejected { retry_after_secs };
        }

        span.recorder
            .add_event("request queued", &[Attribute::int("in_flight", entered)]);

        // Dropping this future while queued is the caller going away; the span
        // records that as a timeout.
        span.queued = true;
        let slot = tokio::select! {
            acquired = self.slots.acquire() => acquired.ok(),
            () = deadline.expired() => None,
        };
        let Some(_slot) = slot else {
            span.record_timeout("Request deadline passed before a running slot freed");
            return Outcome::TimedOut { retry_after_secs };
        };
        span.queued = false;

        span.recorder.add_event("request accepted", &[]);
        tracing::info!(%request_id, "Request accepted");

        let start = Instant::now();
        let result = AssertUnwindSafe(downstream)
            .catch_unwind()
            .await
            .map_err(HandlerPanic::from_payload);
        let duration = start.elapsed();

        let status = match &result {
            Ok(value) => value.status_code(),
            Err(_) => StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
        };
        span.recorder.add_event(
            "request completed",
            &[
                Attribute::int("status", status),
                Attribute::str("duration", format!("{:?}", duration)),
            ],
        );
        span.recorder.set_attributes(&[Attribute::int("status", status)]);

        match &result {
            Ok(_) => tracing::info!(
                %request_id,
                status,
                duration_ms = millis(duration),
                "Request completed"
            ),
            Err(panic) => tracing::error!(
                %request_id,
                error = %panic,
                duration_ms = millis(duration),
                "Request handler panicked"
            ),
        }

        Outcome::Completed(result)
    }

    fn counter_attributes(&self) -> [Attribute; 4] {
        [
            Attribute::int("running", self.running()),
            Attribute::int("in_flight", self.in_flight()),
            Attribute::int("timed_out", self.timed_out()),
            Attribute::int("rejected", self.rejected()),
        ]
    }
}

impl fmt::Debug for AdmissionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmissionController")
            .field("limits", &self.limits)
            .field("snapshot", &self.snapshot())
            .finish_non_exhaustive()
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Decrements the in-flight count exactly once.
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Span that records the controller's counters when the request leaves.
///
/// Dropped while `queued`, the request is counted as timed out.
struct AdmissionSpan<'a> {
    recorder: Box<dyn SpanRecorder>,
    controller: &'a AdmissionController,
    request_id: &'a RequestId,
    queued: bool,
}

impl AdmissionSpan<'_> {
    fn record_timeout(&mut self, message: &'static str) {
        self.queued = false;
        let timed_out = self.controller.timed_out.fetch_add(1, Ordering::Relaxed) + 1;
        self.recorder.add_event("request timed out", &[]);
        tracing::warn!(
            request_id = %self.request_id,
            timed_out_total = timed_out,
            "{}",
            message
        );
    }
}

impl Drop for AdmissionSpan<'_> {
    fn drop(&mut self) {
        if self.queued {
            self.record_timeout("Request cancelled while waiting for a running slot");
        }
        let attributes = self.controller.counter_attributes();
        self.recorder.set_attributes(&attributes);
    }
}
