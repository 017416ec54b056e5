//! Listener service driven by the lifecycle coordinator.
//!
//! # Responsibilities
//! - Bind and run the accept loop inside `start`
//! - Spawn one handler task per connection
//! - Close the accept loop from `stop`, then drain connections
//!
//! # Design Decisions
//! - `start` returns `Ok(())` once stopped; bind failures are errors
//! - `stop` before `start` is allowed: `stop` waits for `start` to bind or
//!   fail, and `start` then returns immediately

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use tokio::sync::watch;

use crate::config::ListenerConfig;
use crate::lifecycle::service::{Service, ServiceResult};
use crate::net::connection::ConnectionTracker;
use crate::net::handler::{ConnectionContext, ConnectionHandler};
use crate::net::listener::{Listener, ListenerError};

/// Pause after a failed accept so a persistent error does not spin.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Listening(SocketAddr),
    Closed,
}

/// A TCP listener serving connections with a [`ConnectionHandler`].
pub struct TcpService {
    config: ListenerConfig,
    handler: Arc<dyn ConnectionHandler>,
    tracker: ConnectionTracker,
    stop_tx: watch::Sender<bool>,
    state_tx: watch::Sender<State>,
}

impl TcpService {
    pub fn new(config: ListenerConfig, handler: Arc<dyn ConnectionHandler>) -> Self {
        let tracker = ConnectionTracker::new(&config.name);
        Self {
            config,
            handler,
            tracker,
            stop_tx: watch::channel(false).0,
            state_tx: watch::channel(State::Idle).0,
        }
    }

    /// Address the accept loop is listening on, if it is running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match *self.state_tx.borrow() {
            State::Listening(addr) => Some(addr),
            _ => None,
        }
    }

    /// Wait until the listener is bound. Returns `None` if it closed first.
    pub async fn bound(&self) -> Option<SocketAddr> {
        let mut state = self.state_tx.subscribe();
        let current = state
            .wait_for(|s| !matches!(s, State::Idle))
            .await
            .ok()?;
        match *current {
            State::Listening(addr) => Some(addr),
            _ => None,
        }
    }

    async fn serve(&self, listener: Listener) {
        let mut stop = self.stop_tx.subscribe();
        loop {
            tokio::select! {
                _ = async { let _ = stop.wait_for(|stopped| *stopped).await; } => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer_addr, permit)) => {
                        let guard = self.tracker.track();
                        let ctx = ConnectionContext {
                            id: guard.id(),
                            listener: self.config.name.clone(),
                            peer_addr,
                        };
                        let handler = Arc::clone(&self.handler);
                        tokio::spawn(async move {
                            let _permit = permit;
                            let _guard = guard;
                            let id = ctx.id;
                            if let Err(e) = handler.handle(stream, ctx).await {
                                tracing::debug!(connection_id = %id, error = %e, "Connection ended with error");
                            }
                        });
                    }
                    Err(ListenerError::Closed) => break,
                    Err(e) => {
                        tracing::warn!(listener = %self.config.name, error = %e, "Accept failed");
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                },
            }
        }
    }
}

#[async_trait]
impl Service for TcpService {
    async fn start(&self) -> ServiceResult {
        let listener = match Listener::bind(&self.config).await {
            Ok(listener) => listener,
            Err(e) => {
                self.state_tx.send_replace(State::Closed);
                return Err(anyhow::Error::new(e).context(format!("listener '{}'", self.config.name)));
            }
        };
        let addr = listener
            .local_addr()
            .with_context(|| format!("listener '{}' has no local address", self.config.name))?;
        self.state_tx.send_replace(State::Listening(addr));

        self.serve(listener).await;

        self.state_tx.send_replace(State::Closed);
        tracing::info!(listener = %self.config.name, address = %addr, "Listener closed");
        Ok(())
    }

    async fn stop(&self) -> ServiceResult {
        self.stop_tx.send_replace(true);

        // The socket is released once the accept loop has exited. A bind still
        // in flight must settle first or it could outlive a clean stop.
        let mut state = self.state_tx.subscribe();
        let _ = state.wait_for(|s| *s == State::Closed).await;

        let in_flight = self.tracker.active_count();
        if in_flight > 0 {
            tracing::info!(listener = %self.config.name, connections = in_flight, "Draining connections");
        }
        self.tracker.wait_for_idle().await;
        Ok(())
    }
}
