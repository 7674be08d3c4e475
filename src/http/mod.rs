//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (attach request ID)
//!     → deadline.rs (attach caller deadline)
//!     → [admission controller decides run / wait / reject]
//!     → routes (business handlers)
//!     → response.rs (backpressure and failure responses)
//!     → Send to client
//! ```

pub mod deadline;
pub mod request;
pub mod response;
pub mod server;

pub use deadline::{DeadlineState, RequestDeadline};
pub use request::{RequestId, RequestIdError, RequestIdExt, RequestIdLayer, X_REQUEST_ID};
pub use server::HttpServer;
