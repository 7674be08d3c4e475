//! Responses produced by the service itself rather than by handlers.
//!
//! # Design Decisions
//! - Backpressure always answers 429 with a `Retry-After` hint
//! - A handler panic answers a bare 500; details stay in the logs

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

/// 429 with `Retry-After` set to `retry_after_secs`.
pub fn too_many_requests(retry_after_secs: u64) -> Response {
    let mut response = Response::new(Body::from("Too many requests"));
    *response.status_mut() = StatusCode::TOO_MANY_REQUESTS;
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
    response
}

pub fn internal_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_many_requests_carries_retry_hint() {
        let response = too_many_requests(7);
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "7");
    }
}
