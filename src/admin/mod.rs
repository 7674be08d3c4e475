//! Admin API.
//!
//! Served on its own listener, never behind admission control, so it stays
//! reachable while the main listener is saturated.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use crate::admission::AdmissionController;
use self::auth::admin_auth_middleware;
use self::handlers::{get_admission, get_status};

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub controller: Arc<AdmissionController>,
    pub api_key: Arc<str>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/admission", get(get_admission))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
