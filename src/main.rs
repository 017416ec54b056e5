//! Mail server (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!   SIGINT/SIGTERM ──▶ signals ──▶ Shutdown ◀──────────────────────┐
//!                                     │                            │
//!                     ┌───────────────┼───────────────┐            │
//!                     ▼               ▼               ▼            │
//!               ┌──────────┐    ┌──────────┐    ┌──────────┐       │
//!               │  runner  │    │  runner  │    │  runner  │       │
//!               │   SMTP   │    │   IMAP   │    │   ...    │       │
//!               └────┬─────┘    └────┬─────┘    └────┬─────┘       │
//!                    │ Outcome       │               │             │
//!                    └───────────────┼───────────────┘             │
//!                                    ▼                             │
//!                              ┌────────────┐   first outcome      │
//!                              │ aggregator │──────────────────────┘
//!                              └─────┬──────┘
//!                                    ▼
//!                           OverallResult → exit code
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use mailserver::config::{read_config, validate_config, ConfigError, Protocol, ServerConfig};
use mailserver::lifecycle::{signals, Coordinator, ServiceDescriptor, Shutdown, ShutdownTimeout};
use mailserver::net::{GreetingHandler, TcpService};
use mailserver::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "mailserver")]
#[command(about = "Runs the SMTP and IMAP listeners as one service group", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SMTP listening address
    #[arg(long)]
    smtp_listen: Option<String>,

    /// IMAP listening address
    #[arg(long)]
    imap_listen: Option<String>,

    /// Domain name announced in greetings
    #[arg(long)]
    domain: Option<String>,

    /// Seconds each listener gets to stop
    #[arg(long)]
    shutdown_timeout_secs: Option<u64>,

    /// Log every connection at debug level
    #[arg(long)]
    debug: bool,
}

impl Args {
    fn apply(&self, config: &mut ServerConfig) {
        if let Some(addr) = &self.smtp_listen {
            config.set_listen_address(Protocol::Smtp, addr);
        }
        if let Some(addr) = &self.imap_listen {
            config.set_listen_address(Protocol::Imap, addr);
        }
        if let Some(domain) = &self.domain {
            config.domain = domain.clone();
        }
        if let Some(secs) = self.shutdown_timeout_secs {
            config.shutdown.timeout_secs = secs;
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => read_config(path)?,
        None => ServerConfig::default(),
    };
    args.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init(config.observability.log_format, args.debug)?;
    tracing::info!("mailserver v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
        tracing::info!(metrics_address = %addr, "Metrics exporter listening");
    }

    let mut coordinator = Coordinator::new(ShutdownTimeout::from_secs(config.shutdown.timeout_secs));
    for listener in config.enabled_listeners() {
        tracing::info!(
            listener = %listener.name,
            protocol = %listener.protocol,
            bind_address = %listener.bind_address,
            "Listener configured"
        );
        let handler = Arc::new(GreetingHandler::for_protocol(listener.protocol, &config.domain));
        let service = Arc::new(TcpService::new(listener.clone(), handler));
        coordinator.add(ServiceDescriptor::from_service(listener.name.clone(), service));
    }

    let shutdown = Shutdown::new();
    signals::install(shutdown.clone());

    let result = coordinator.run(shutdown).await;
    match result.into_result() {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}
