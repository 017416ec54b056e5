//! Seam between listeners and protocol engines.
//!
//! The listener owns sockets and lifecycle; what is said on a connection
//! belongs to a [`ConnectionHandler`]. Full SMTP and IMAP engines plug in here.

use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::config::Protocol;
use crate::net::connection::ConnectionId;

/// Per-connection metadata handed to a handler.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    pub id: ConnectionId,
    pub listener: String,
    pub peer_addr: SocketAddr,
}

/// Serves one accepted connection.
#[async_trait]
pub trait ConnectionHandler: Send + Sync + 'static {
    async fn handle(&self, stream: TcpStream, ctx: ConnectionContext) -> std::io::Result<()>;
}

/// Sends the protocol greeting line and closes the connection.
#[derive(Debug, Clone)]
pub struct GreetingHandler {
    greeting: String,
}

impl GreetingHandler {
    pub fn new(greeting: impl Into<String>) -> Self {
        Self {
            greeting: greeting.into(),
        }
    }

    pub fn for_protocol(protocol: Protocol, domain: &str) -> Self {
        match protocol {
            Protocol::Smtp => Self::new(format!("220 {} ESMTP ready", domain)),
            Protocol::Imap => Self::new(format!(
                "* OK [CAPABILITY IMAP4rev1 IMAP4rev2] {} ready",
                domain
            )),
        }
    }

    pub fn greeting(&self) -> &str {
        &self.greeting
    }
}

#[async_trait]
impl ConnectionHandler for GreetingHandler {
    async fn handle(&self, mut stream: TcpStream, ctx: ConnectionContext) -> std::io::Result<()> {
        tracing::debug!(
            connection_id = %ctx.id,
            listener = %ctx.listener,
            peer_addr = %ctx.peer_addr,
            "Sending greeting"
        );
        stream.write_all(self.greeting.as_bytes()).await?;
        stream.write_all(b"\r\n").await?;
        stream.shutdown().await
    }
}
