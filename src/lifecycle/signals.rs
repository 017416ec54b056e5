//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT)
//! - Translate the first signal into an external shutdown request
//! - Force the process down on a second signal
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A second SIGTERM/SIGINT while draining exits immediately

use std::fmt;
use tokio::task::JoinHandle;

use crate::lifecycle::shutdown::{CancelReason, Shutdown};

/// Exit code used when a second signal forces the process down.
pub const FORCED_EXIT_CODE: i32 = 130;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Interrupt,
    Terminate,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Interrupt => write!(f, "SIGINT"),
            Signal::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// Termination signal streams, registered once for the life of the process.
///
/// Keeping the streams alive between waits means a signal delivered while
/// nobody is waiting is still seen by the next [`Signals::recv`].
#[cfg(unix)]
pub struct Signals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Signals {
    pub fn new() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    /// Wait for the next termination signal. `None` if the streams closed.
    pub async fn recv(&mut self) -> Option<Signal> {
        tokio::select! {
            Some(()) = self.interrupt.recv() => Some(Signal::Interrupt),
            Some(()) = self.terminate.recv() => Some(Signal::Terminate),
            else => None,
        }
    }
}

#[cfg(not(unix))]
pub struct Signals {
    ctrl_c: tokio::signal::windows::CtrlC,
}

#[cfg(not(unix))]
impl Signals {
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            ctrl_c: tokio::signal::windows::ctrl_c()?,
        })
    }

    pub async fn recv(&mut self) -> Option<Signal> {
        self.ctrl_c.recv().await.map(|()| Signal::Interrupt)
    }
}

/// Spawn the signal watcher for `shutdown`.
pub fn install(shutdown: Shutdown) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut signals = match Signals::new() {
            Ok(signals) => signals,
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handlers");
                return;
            }
        };

        let Some(signal) = signals.recv().await else {
            return;
        };
        tracing::info!(signal = %signal, "Shutdown signal received");
        shutdown.trigger(CancelReason::External);

        if let Some(signal) = signals.recv().await {
            tracing::warn!(signal = %signal, "Second signal received, forcing exit");
            std::process::exit(FORCED_EXIT_CODE);
        }
    })
}
