//! Collects service outcomes and turns the first one into group shutdown.

use tokio::sync::mpsc;

use crate::lifecycle::outcome::{Outcome, ServiceFailure};
use crate::lifecycle::shutdown::{CancelReason, Shutdown};
use crate::observability::metrics;

/// Whether every expected outcome has arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Pending { remaining: usize },
    Complete,
}

/// An outcome tagged with the position of the service that produced it.
pub type Report = (usize, Outcome);

/// Single-writer outcome collector for one service group.
///
/// Services are identified by their slot (the order they were added), so two
/// services sharing a name are still accounted for separately.
#[derive(Debug)]
pub struct Aggregator {
    expected: usize,
    services: Vec<String>,
    reported: Vec<bool>,
    outcomes: Vec<Outcome>,
    shutdown: Shutdown,
}

impl Aggregator {
    pub fn new(services: Vec<String>, shutdown: Shutdown) -> Self {
        let expected = services.len();
        Self {
            expected,
            services,
            reported: vec![false; expected],
            outcomes: Vec::with_capacity(expected),
            shutdown,
        }
    }

    /// Record the outcome of the service in `slot` and trigger group shutdown.
    ///
    /// # Panics
    /// Panics if more outcomes arrive than services were started: some runner
    /// reported twice, which is a bug and must not be absorbed. Also panics on
    /// a slot that does not belong to the group.
    pub fn record(&mut self, slot: usize, outcome: Outcome) -> Progress {
        if self.outcomes.len() >= self.expected {
            panic!(
                "encountered more than {} outcomes (extra report from {}). Bug?",
                self.expected, outcome.service
            );
        }
        assert!(
            slot < self.expected,
            "outcome from unknown slot {} ({} services)",
            slot,
            self.expected
        );
        assert!(
            !self.reported[slot],
            "{} reported twice (slot {}). Bug?",
            outcome.service,
            slot
        );
        self.reported[slot] = true;

        tracing::debug!(
            service = %outcome.service,
            clean = outcome.is_clean(),
            "Outcome received"
        );
        metrics::record_outcome(&outcome.service, outcome.is_clean());

        self.shutdown
            .trigger(CancelReason::ServiceExited(outcome.service.clone()));
        self.outcomes.push(outcome);

        let remaining = self.expected - self.outcomes.len();
        metrics::set_services_running(remaining);
        if remaining == 0 {
            tracing::info!(services = self.expected, "All services stopped");
            Progress::Complete
        } else {
            Progress::Pending { remaining }
        }
    }

    /// Receive outcomes until the set is complete or every sender is gone.
    pub async fn collect(&mut self, outcomes: &mut mpsc::Receiver<Report>) -> Progress {
        let mut progress = self.progress();
        while progress != Progress::Complete {
            match outcomes.recv().await {
                Some((slot, outcome)) => progress = self.record(slot, outcome),
                None => {
                    tracing::error!(
                        missing = self.expected - self.outcomes.len(),
                        "Outcome channel closed before every service reported"
                    );
                    break;
                }
            }
        }
        progress
    }

    /// Record a [`ServiceFailure::Lost`] for every service that never reported.
    ///
    /// Returns how many services were missing.
    pub fn record_lost(&mut self) -> usize {
        let missing: Vec<usize> = (0..self.expected).filter(|&slot| !self.reported[slot]).collect();
        for &slot in &missing {
            let service = self.services[slot].clone();
            tracing::error!(service = %service, "Service exited without reporting an outcome");
            self.record(slot, Outcome::failed(ServiceFailure::Lost { service }));
        }
        missing.len()
    }

    pub fn progress(&self) -> Progress {
        match self.expected - self.outcomes.len() {
            0 => Progress::Complete,
            remaining => Progress::Pending { remaining },
        }
    }

    pub fn into_outcomes(self) -> Vec<Outcome> {
        self.outcomes
    }
}
