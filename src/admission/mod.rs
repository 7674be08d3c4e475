//! Admission control subsystem.
//!
//! # Data Flow
//! ```text
//! request (with RequestId + RequestDeadline)
//!     → middleware.rs (admission_middleware)
//!     → controller.rs (in-flight check)
//!         over max_in_flight → 429 Retry-After
//!     → controller.rs (wait for a running slot)
//!         deadline / cancellation first → 429 Retry-After
//!     → downstream handler
//!         panic → 500
//!     → response (X-Request-ID echoed)
//! ```
//!
//! # Design Decisions
//! - Limits are fixed at construction (limits.rs)
//! - The controller knows nothing about HTTP beyond [`StatusReport`]
//! - Counters are atomics read without locking; snapshots may be torn

pub mod controller;
pub mod limits;
pub mod middleware;

pub use controller::{AdmissionController, AdmissionSnapshot, HandlerPanic, Outcome, StatusReport};
pub use limits::{CapacityConfig, Limit, LimitSubstitution};
pub use middleware::admission_middleware;
