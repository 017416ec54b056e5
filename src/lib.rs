//! Mail server listener group.
//!
//! Runs the SMTP and IMAP listeners side by side under one lifecycle
//! coordinator: the first listener to exit or fail, or an OS signal, shuts the
//! whole group down within a bounded time.

pub mod config;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::ServerConfig;
pub use lifecycle::{Coordinator, Shutdown};
pub use net::TcpService;
