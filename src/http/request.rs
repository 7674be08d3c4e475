//! Request identification.
//!
//! # Responsibilities
//! - Reuse a well-formed inbound `X-Request-ID`
//! - Generate a UUID v4 when none is present
//! - Attach the ID to request extensions, request headers and the response
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - A malformed inbound ID is replaced, never rejected
//! - Missing and malformed IDs are distinct errors so callers can log them apart

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::http::{HeaderName, HeaderValue, Request, Response};
use tower::{Layer, Service};
use uuid::Uuid;

/// Correlation header carried by requests and responses.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Per-request correlation identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

/// Why a request ID could not be read from a request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestIdError {
    /// Nothing under the identifier key at all.
    #[error("x-request-id not found")]
    Missing,
    /// A value is present under the identifier key but it is not a string.
    #[error("cannot read x-request-id as a string: {raw}")]
    NotAString { raw: String },
}

impl RequestId {
    /// Generate a fresh RFC 4122 version 4 identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Header form of the ID. Always `Some` for IDs produced by this module.
    pub fn header_value(&self) -> Option<HeaderValue> {
        HeaderValue::from_str(&self.0).ok()
    }

    /// Read the ID attached to a request.
    ///
    /// Extensions take precedence over the raw header. An empty header counts
    /// as missing.
    pub fn from_request<B>(request: &Request<B>) -> Result<Self, RequestIdError> {
        if let Some(id) = request.extensions().get::<RequestId>() {
            return Ok(id.clone());
        }

        let Some(value) = request.headers().get(X_REQUEST_ID) else {
            return Err(RequestIdError::Missing);
        };

        match value.to_str() {
            Ok(s) if s.trim().is_empty() => Err(RequestIdError::Missing),
            Ok(s) => Ok(Self(s.to_string())),
            Err(_) => Err(RequestIdError::NotAString {
                raw: format!("{:?}", value.as_bytes()),
            }),
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ensure a request carries an ID, generating one when it cannot be read.
///
/// The chosen ID is written back into the request extensions and header.
/// The error, if any, is returned alongside so the caller decides how loudly
/// to report it.
pub fn resolve_request_id<B>(request: &mut Request<B>) -> (RequestId, Option<RequestIdError>) {
    let (id, fallback) = match RequestId::from_request(request) {
        Ok(id) => (id, None),
        Err(err) => (RequestId::generate(), Some(err)),
    };

    if let Some(value) = id.header_value() {
        request.headers_mut().insert(X_REQUEST_ID, value);
    }
    request.extensions_mut().insert(id.clone());

    (id, fallback)
}

/// Access to the request ID from handlers.
pub trait RequestIdExt {
    fn request_id(&self) -> Option<&RequestId>;
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> Option<&RequestId> {
        self.extensions().get::<RequestId>()
    }
}

/// Layer that attaches a request ID and mirrors it onto the response.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestIdLayer;

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdService { inner }
    }
}

#[derive(Debug, Clone)]
pub struct RequestIdService<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for RequestIdService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<ReqBody>) -> Self::Future {
        let (id, fallback) = resolve_request_id(&mut request);
        match &fallback {
            Some(RequestIdError::Missing) => {
                tracing::trace!(request_id = %id, "No inbound request id, generated one");
            }
            Some(err @ RequestIdError::NotAString { .. }) => {
                tracing::warn!(
                    request_id = %id,
                    error = %err,
                    "Malformed inbound request id replaced"
                );
            }
            None => {}
        }

        // The clone may not be ready; keep the one poll_ready was called on.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let mut response = inner.call(request).await?;
            if let Some(value) = id.header_value() {
                response.headers_mut().insert(X_REQUEST_ID, value);
            }
            Ok(response)
        })
    }
}
