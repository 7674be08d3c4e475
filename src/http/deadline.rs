//! Caller deadlines.
//!
//! The transport decides how long a caller is willing to wait. Each request
//! gets a [`RequestDeadline`] in its extensions: an optional instant plus a
//! cancellation token derived from the server shutdown token. Components that
//! suspend a request (the admission queue) race their wait against it.

use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// The point after which a caller no longer wants its request served.
#[derive(Debug, Clone)]
pub struct RequestDeadline {
    at: Option<Instant>,
    token: CancellationToken,
}

impl RequestDeadline {
    pub fn new(at: Option<Instant>, token: CancellationToken) -> Self {
        Self { at, token }
    }

    /// Deadline `timeout` from now, with its own cancellation token.
    pub fn after(timeout: Duration) -> Self {
        Self::new(Some(Instant::now() + timeout), CancellationToken::new())
    }

    /// No deadline; only cancellation ends the wait.
    pub fn unbounded() -> Self {
        Self::new(None, CancellationToken::new())
    }

    pub fn at(&self) -> Option<Instant> {
        self.at
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_expired(&self) -> bool {
        self.token.is_cancelled() || self.at.is_some_and(|at| Instant::now() >= at)
    }

    /// Resolves once the deadline passes or the token is cancelled.
    pub async fn expired(&self) {
        match self.at {
            Some(at) => {
                tokio::select! {
                    () = tokio::time::sleep_until(at) => {}
                    () = self.token.cancelled() => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }
}

/// State for [`deadline_middleware`].
#[derive(Debug, Clone)]
pub struct DeadlineState {
    /// Per-request budget; `None` leaves requests unbounded.
    pub timeout: Option<Duration>,
    /// Parent of every per-request token; cancelled on shutdown.
    pub shutdown: CancellationToken,
}

/// Attach a [`RequestDeadline`] to every request.
pub async fn deadline_middleware(
    State(state): State<DeadlineState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let at = state.timeout.map(|timeout| Instant::now() + timeout);
    let deadline = RequestDeadline::new(at, state.shutdown.child_token());
    request.extensions_mut().insert(deadline);
    next.run(request).await
}
