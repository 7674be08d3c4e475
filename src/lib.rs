//! herdmaster: an HTTP service with admission control.
//!
//! Every business request passes an admission controller that bounds how many
//! requests execute at once and how many may wait. Excess load is shed with
//! `429 Too Many Requests` and a `Retry-After` hint instead of queueing
//! without bound.

// Core subsystems
pub mod admission;
pub mod config;
pub mod http;
pub mod routes;

// Cross-cutting concerns
pub mod admin;
pub mod lifecycle;
pub mod observability;

pub use admission::{AdmissionController, CapacityConfig, Outcome};
pub use config::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
