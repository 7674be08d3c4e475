//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     token cancelled → listeners stop accepting
//!                     → queued requests leave as timed out
//!                     → running requests drain → exit
//! ```
//!
//! # Design Decisions
//! - One cancellation token for the whole process; per-request deadline
//!   tokens are its children
//! - Running requests are never interrupted, only queued ones

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
