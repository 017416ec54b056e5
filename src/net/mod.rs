//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! TcpService::start (server.rs)
//!     → listener.rs (bind, accept loop, connection limits)
//!     → connection.rs (id + in-flight tracking)
//!     → handler.rs (protocol engine serves the stream)
//!
//! TcpService::stop
//!     → close accept loop → start() returns → drain connections
//! ```

pub mod connection;
pub mod handler;
pub mod listener;
pub mod server;

pub use handler::{ConnectionContext, ConnectionHandler, GreetingHandler};
pub use server::TcpService;
