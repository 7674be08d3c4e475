//! Axum glue for the admission controller.
//!
//! Installed with `axum::middleware::from_fn_with_state` in front of the
//! business routes. The outcome of [`AdmissionController::admit`] becomes the
//! response: handler output untouched, 429 plus `Retry-After` for rejection
//! and timeout, 500 for a panic.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::admission::controller::{AdmissionController, Outcome};
use crate::http::request::resolve_request_id;
use crate::http::response::{internal_error, too_many_requests};
use crate::http::{RequestDeadline, RequestIdError, RequestIdExt, X_REQUEST_ID};
use crate::observability::metrics;

pub async fn admission_middleware(
    State(controller): State<Arc<AdmissionController>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();

    let request_id = match request.request_id() {
        Some(id) => id.clone(),
        None => {
            let (id, fallback) = resolve_request_id(&mut request);
            match fallback {
                Some(RequestIdError::Missing) | None => {}
                Some(err) => {
                    tracing::warn!(
                        request_id = %id,
                        error = %err,
                        "Replaced unreadable request ID"
                    );
                }
            }
            id
        }
    };

    let deadline = request
        .extensions()
        .get::<RequestDeadline>()
        .cloned()
        .unwrap_or_else(RequestDeadline::unbounded);

    let outcome = controller
        .admit(&request_id, &deadline, next.run(request))
        .await;
    let status = outcome.status_code();

    let mut response = match outcome {
        Outcome::Completed(Ok(response)) => response,
        Outcome::Completed(Err(_)) => internal_error(),
        Outcome::Rejected { retry_after_secs } | Outcome::TimedOut { retry_after_secs } => {
            too_many_requests(retry_after_secs)
        }
    };

    if let Some(value) = request_id.header_value() {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }

    metrics::record_request(&method, status, start);
    metrics::record_admission(&controller.snapshot());

    response
}
