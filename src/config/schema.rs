//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Root configuration for the mail server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Domain announced in protocol greetings.
    pub domain: String,

    /// Group shutdown settings.
    pub shutdown: ShutdownConfig,

    /// Listeners, started in order.
    pub listeners: Vec<ListenerConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            domain: "localhost".to_string(),
            shutdown: ShutdownConfig::default(),
            listeners: vec![
                ListenerConfig::new("SMTP server", Protocol::Smtp, "127.0.0.1:31025"),
                ListenerConfig::new("IMAP server", Protocol::Imap, "127.0.0.1:30143"),
            ],
            observability: ObservabilityConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Listeners that should actually be started.
    pub fn enabled_listeners(&self) -> impl Iterator<Item = &ListenerConfig> {
        self.listeners.iter().filter(|l| l.enabled)
    }

    /// Point the first listener for `protocol` at `bind_address`, adding one
    /// if none exists.
    pub fn set_listen_address(&mut self, protocol: Protocol, bind_address: &str) {
        match self.listeners.iter_mut().find(|l| l.protocol == protocol) {
            Some(listener) => {
                listener.bind_address = bind_address.to_string();
                listener.enabled = true;
            }
            None => self.listeners.push(ListenerConfig::new(
                protocol.default_name(),
                protocol,
                bind_address,
            )),
        }
    }
}

/// Wire protocol served by a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Smtp,
    Imap,
}

impl Protocol {
    pub fn default_name(&self) -> &'static str {
        match self {
            Protocol::Smtp => "SMTP server",
            Protocol::Imap => "IMAP server",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Smtp => write!(f, "smtp"),
            Protocol::Imap => write!(f, "imap"),
        }
    }
}

/// One listening socket.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListenerConfig {
    /// Service label used in logs and diagnostics.
    pub name: String,

    pub protocol: Protocol,

    /// Bind address (e.g., "127.0.0.1:31025").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl ListenerConfig {
    pub fn new(name: &str, protocol: Protocol, bind_address: &str) -> Self {
        Self {
            name: name.to_string(),
            protocol,
            bind_address: bind_address.to_string(),
            max_connections: default_max_connections(),
            enabled: default_enabled(),
        }
    }
}

fn default_max_connections() -> usize {
    1_000
}

fn default_enabled() -> bool {
    true
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Upper bound for each service's stop, in seconds.
    pub timeout_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { timeout_secs: 5 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Prometheus scrape address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
