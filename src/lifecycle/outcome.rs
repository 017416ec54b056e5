//! Service outcomes and the final group result.
//!
//! # Data Flow
//! ```text
//! runner → Outcome { service, error } → aggregator (arrival order)
//!     → summarize() → OverallResult { outcomes, diagnostics }
//!     → into_result() → Ok(()) | CoordinatorError::ServicesFailed
//! ```

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinError;

/// Which half of the start/stop contract was running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Start,
    Stop,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Start => write!(f, "start"),
            Phase::Stop => write!(f, "stop"),
        }
    }
}

/// Why a single service did not terminate cleanly.
#[derive(Debug, Error)]
pub enum ServiceFailure {
    #[error("failed to start {service}: {source:#}")]
    Start {
        service: String,
        source: anyhow::Error,
    },

    #[error("failed to stop {service}: {source:#}")]
    Stop {
        service: String,
        source: anyhow::Error,
    },

    #[error("failed to stop {service}: timed out after {timeout:?}")]
    StopTimeout { service: String, timeout: Duration },

    #[error("{service} panicked during {phase}: {message}")]
    Panicked {
        service: String,
        phase: Phase,
        message: String,
    },

    #[error("{service} exited without reporting an outcome")]
    Lost { service: String },
}

impl ServiceFailure {
    /// Name of the service this failure belongs to.
    pub fn service(&self) -> &str {
        match self {
            ServiceFailure::Start { service, .. }
            | ServiceFailure::Stop { service, .. }
            | ServiceFailure::StopTimeout { service, .. }
            | ServiceFailure::Panicked { service, .. }
            | ServiceFailure::Lost { service } => service,
        }
    }

    pub(crate) fn from_join(service: &str, phase: Phase, err: JoinError) -> Self {
        let message = if err.is_panic() {
            let payload = err.into_panic();
            if let Some(s) = payload.downcast_ref::<&str>() {
                (*s).to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "non-string panic payload".to_string()
            }
        } else {
            err.to_string()
        };

        ServiceFailure::Panicked {
            service: service.to_string(),
            phase,
            message,
        }
    }
}

/// Terminal report of one service runner.
#[derive(Debug)]
pub struct Outcome {
    pub service: String,
    pub error: Option<ServiceFailure>,
}

impl Outcome {
    pub fn clean(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            error: None,
        }
    }

    pub fn failed(failure: ServiceFailure) -> Self {
        Self {
            service: failure.service().to_string(),
            error: Some(failure),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.error.is_none()
    }
}

/// Error returned when at least one service failed.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("errors encountered: {}", .diagnostics.join("\n"))]
    ServicesFailed { diagnostics: Vec<String> },
}

/// Combined result of a whole service group.
#[derive(Debug)]
pub struct OverallResult {
    outcomes: Vec<Outcome>,
    diagnostics: Vec<String>,
}

impl OverallResult {
    pub fn is_success(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Error messages in arrival order, each naming its service.
    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    /// Every outcome in arrival order.
    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    pub fn into_result(self) -> Result<(), CoordinatorError> {
        if self.diagnostics.is_empty() {
            Ok(())
        } else {
            Err(CoordinatorError::ServicesFailed {
                diagnostics: self.diagnostics,
            })
        }
    }
}

/// Reduce the collected outcomes into one result.
pub fn summarize(outcomes: Vec<Outcome>) -> OverallResult {
    let diagnostics = outcomes
        .iter()
        .filter_map(|outcome| outcome.error.as_ref().map(ToString::to_string))
        .collect();

    OverallResult {
        outcomes,
        diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_clean_is_success() {
        let result = summarize(vec![Outcome::clean("SMTP server"), Outcome::clean("IMAP server")]);
        assert!(result.is_success());
        assert!(result.diagnostics().is_empty());
        assert_eq!(result.outcomes().len(), 2);
        assert!(result.into_result().is_ok());
    }

    #[test]
    fn diagnostics_keep_arrival_order() {
        let result = summarize(vec![
            Outcome::failed(ServiceFailure::Start {
                service: "IMAP server".into(),
                source: anyhow::anyhow!("address in use"),
            }),
            Outcome::clean("metrics"),
            Outcome::failed(ServiceFailure::StopTimeout {
                service: "SMTP server".into(),
                timeout: Duration::from_secs(5),
            }),
        ]);

        assert!(!result.is_success());
        assert_eq!(
            result.diagnostics(),
            [
                "failed to start IMAP server: address in use",
                "failed to stop SMTP server: timed out after 5s",
            ]
        );

        let err = result.into_result().unwrap_err();
        assert_eq!(
            err.to_string(),
            "errors encountered: failed to start IMAP server: address in use\n\
             failed to stop SMTP server: timed out after 5s"
        );
    }

    #[test]
    fn start_error_includes_context_chain() {
        let source = anyhow::anyhow!("permission denied").context("bind 127.0.0.1:25");
        let failure = ServiceFailure::Start {
            service: "SMTP server".into(),
            source,
        };
        assert_eq!(
            failure.to_string(),
            "failed to start SMTP server: bind 127.0.0.1:25: permission denied"
        );
    }

    #[test]
    fn stop_panic_names_service_and_phase() {
        let failure = ServiceFailure::Panicked {
            service: "IMAP server".into(),
            phase: Phase::Stop,
            message: "boom".into(),
        };
        assert_eq!(failure.service(), "IMAP server");
        assert_eq!(failure.to_string(), "IMAP server panicked during stop: boom");
    }

    #[tokio::test]
    async fn join_panic_message_is_captured() {
        let err = tokio::spawn(async { panic!("listener exploded") })
            .await
            .unwrap_err();
        let failure = ServiceFailure::from_join("SMTP server", Phase::Start, err);
        assert_eq!(
            failure.to_string(),
            "SMTP server panicked during start: listener exploded"
        );
    }
}
