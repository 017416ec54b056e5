//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger(External)
//!
//! Run (coordinator.rs):
//!     ServiceDescriptor × N → runner.rs (one task each)
//!         start() raced against ShutdownListener::cancelled()
//!         cancelled → stop() bounded by timeout.rs
//!     → Outcome × N → aggregator.rs (arrival order, triggers Shutdown)
//!     → outcome.rs summarize() → OverallResult
//! ```
//!
//! # Design Decisions
//! - Any outcome, clean or not, takes the whole group down
//! - Shutdown is level-triggered and fires exactly once
//! - Stop has a timeout: abandoned after the deadline, never retried

pub mod aggregator;
pub mod coordinator;
pub mod outcome;
pub mod runner;
pub mod service;
pub mod shutdown;
pub mod signals;
pub mod timeout;

pub use coordinator::Coordinator;
pub use outcome::{CoordinatorError, Outcome, OverallResult, ServiceFailure};
pub use service::{Service, ServiceDescriptor, ServiceResult};
pub use shutdown::{CancelReason, Shutdown, ShutdownListener};
pub use timeout::ShutdownTimeout;
