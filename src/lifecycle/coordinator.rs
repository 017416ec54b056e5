//! Runs a group of services together and shuts them down together.

use tokio::sync::mpsc;

use crate::lifecycle::aggregator::{Aggregator, Report};
use crate::lifecycle::outcome::{summarize, OverallResult};
use crate::lifecycle::runner;
use crate::lifecycle::service::ServiceDescriptor;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::timeout::ShutdownTimeout;
use crate::observability::metrics;

/// Supervisor for a fixed set of services.
///
/// Every service runs on its own task. The first outcome from any of them
/// (clean exit, failure, or a stop after an external signal) shuts the whole
/// group down, and `run` returns once every service has reported.
#[derive(Debug, Default)]
pub struct Coordinator {
    services: Vec<ServiceDescriptor>,
    timeout: ShutdownTimeout,
}

impl Coordinator {
    pub fn new(timeout: ShutdownTimeout) -> Self {
        Self {
            services: Vec::new(),
            timeout,
        }
    }

    /// Add a service. Services start in the order they were added.
    pub fn add(&mut self, service: ServiceDescriptor) -> &mut Self {
        self.services.push(service);
        self
    }

    pub fn with_service(mut self, service: ServiceDescriptor) -> Self {
        self.services.push(service);
        self
    }

    /// Start every service and block until all of them have reported.
    pub async fn run(self, shutdown: Shutdown) -> OverallResult {
        let expected = self.services.len();
        if expected == 0 {
            tracing::warn!("No services configured, nothing to run");
            return summarize(Vec::new());
        }

        let names: Vec<String> = self.services.iter().map(|s| s.name().to_string()).collect();
        let (tx, mut rx) = mpsc::channel::<Report>(expected);

        metrics::set_services_running(expected);
        for (slot, descriptor) in self.services.into_iter().enumerate() {
            let tx = tx.clone();
            let listener = shutdown.subscribe();
            let timeout = self.timeout;
            tokio::spawn(async move {
                let outcome = runner::run(descriptor, listener, timeout).await;
                if let Err(mpsc::error::SendError((_, outcome))) = tx.send((slot, outcome)).await {
                    tracing::warn!(service = %outcome.service, "Outcome dropped, coordinator is gone");
                }
            });
        }
        drop(tx);

        let mut aggregator = Aggregator::new(names, shutdown);
        aggregator.collect(&mut rx).await;
        // A runner task that died without reporting still gets an outcome.
        aggregator.record_lost();

        summarize(aggregator.into_outcomes())
    }
}
