//! Upper bound on how long a single stop may take.
//!
//! The stop operation runs on its own task. When the bound expires the task is
//! detached rather than aborted: stop implementations are not assumed to be
//! interruptible, so it may keep running, but nobody waits for it anymore.

use std::future::Future;
use std::time::{Duration, Instant};

use crate::lifecycle::outcome::{Phase, ServiceFailure};
use crate::lifecycle::service::ServiceResult;
use crate::observability::metrics;

/// Default bound applied to each stop.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownTimeout {
    limit: Duration,
}

impl ShutdownTimeout {
    pub fn new(limit: Duration) -> Self {
        Self { limit }
    }

    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }

    /// Run `stop` for `service`, giving up after the configured limit.
    pub async fn bound<F>(&self, service: &str, stop: F) -> Result<(), ServiceFailure>
    where
        F: Future<Output = ServiceResult> + Send + 'static,
    {
        let started = Instant::now();
        let task = tokio::spawn(stop);

        let result = match tokio::time::timeout(self.limit, task).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(source))) => Err(ServiceFailure::Stop {
                service: service.to_string(),
                source,
            }),
            Ok(Err(join)) => Err(ServiceFailure::from_join(service, Phase::Stop, join)),
            Err(_) => {
                tracing::warn!(
                    service = %service,
                    timeout = ?self.limit,
                    "Stop did not finish in time, abandoning it"
                );
                Err(ServiceFailure::StopTimeout {
                    service: service.to_string(),
                    timeout: self.limit,
                })
            }
        };

        metrics::record_stop_duration(service, started.elapsed());
        result
    }
}

impl Default for ShutdownTimeout {
    fn default() -> Self {
        Self::new(DEFAULT_SHUTDOWN_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn default_is_five_seconds() {
        assert_eq!(ShutdownTimeout::default().limit(), Duration::from_secs(5));
        assert_eq!(ShutdownTimeout::from_secs(2).limit(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn quick_stop_passes_through() {
        let policy = ShutdownTimeout::from_secs(1);
        assert!(policy.bound("smtp", async { Ok(()) }).await.is_ok());
    }

    #[tokio::test]
    async fn stop_error_is_wrapped() {
        let policy = ShutdownTimeout::from_secs(1);
        let err = policy
            .bound("smtp", async { Err(anyhow::anyhow!("close failed")) })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceFailure::Stop { .. }));
        assert_eq!(err.to_string(), "failed to stop smtp: close failed");
    }

    #[tokio::test(start_paused = true)]
    async fn hung_stop_times_out_and_keeps_running() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);

        let policy = ShutdownTimeout::from_secs(5);
        let err = policy
            .bound("imap", async move {
                tokio::time::sleep(Duration::from_secs(30)).await;
                flag.store(true, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ServiceFailure::StopTimeout { timeout, .. } if timeout == Duration::from_secs(5)
        ));
        assert!(!finished.load(Ordering::SeqCst));

        // The abandoned stop is detached, not aborted.
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(finished.load(Ordering::SeqCst));
    }

    async fn exploding_stop() -> ServiceResult {
        panic!("double close")
    }

    #[tokio::test]
    async fn panicking_stop_is_reported() {
        let policy = ShutdownTimeout::from_secs(1);
        let err = policy
            .bound("imap", exploding_stop())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceFailure::Panicked { phase: Phase::Stop, .. }));
    }
}
