use axum::{extract::State, Json};
use serde::Serialize;

use crate::admin::AdminState;
use crate::admission::{AdmissionSnapshot, CapacityConfig};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub limits: CapacityConfig,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        limits: state.controller.limits(),
    })
}

pub async fn get_admission(State(state): State<AdminState>) -> Json<AdmissionSnapshot> {
    Json(state.controller.snapshot())
}
