//! Runs one service to completion under the shared shutdown signal.

use crate::lifecycle::outcome::{Outcome, Phase, ServiceFailure};
use crate::lifecycle::service::ServiceDescriptor;
use crate::lifecycle::shutdown::ShutdownListener;
use crate::lifecycle::timeout::ShutdownTimeout;

/// Drive `descriptor` until it exits on its own or the group shuts down.
///
/// `start` runs on its own task and is raced against the shutdown signal.
/// If shutdown wins, `stop` is called under `timeout` and the runner returns
/// without waiting for `start`; stopping is what makes `start` return.
/// Exactly one outcome is produced, carrying at most one error.
pub async fn run(
    descriptor: ServiceDescriptor,
    shutdown: ShutdownListener,
    timeout: ShutdownTimeout,
) -> Outcome {
    let (name, start, stop) = descriptor.into_parts();

    tracing::info!(service = %name, "Starting service");
    let mut start_task = tokio::spawn(start());

    tokio::select! {
        joined = &mut start_task => match joined {
            Ok(Ok(())) => {
                tracing::info!(service = %name, "Service exited");
                Outcome::clean(name)
            }
            Ok(Err(source)) => {
                let detail = format!("{:#}", source);
                tracing::error!(service = %name, error = %detail, "Service failed");
                Outcome::failed(ServiceFailure::Start { service: name, source })
            }
            Err(join) => {
                tracing::error!(service = %name, "Service task panicked");
                Outcome::failed(ServiceFailure::from_join(&name, Phase::Start, join))
            }
        },
        reason = shutdown.cancelled() => {
            tracing::info!(service = %name, reason = %reason, "Stopping service");
            match timeout.bound(&name, stop()).await {
                Ok(()) => {
                    tracing::info!(service = %name, "Service stopped");
                    Outcome::clean(name)
                }
                Err(failure) => {
                    tracing::error!(service = %name, error = %failure, "Service did not stop cleanly");
                    Outcome::failed(failure)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::shutdown::{CancelReason, Shutdown};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// A service whose `start` blocks until its `stop` releases it.
    fn parked(name: &str, stops: Arc<AtomicUsize>) -> ServiceDescriptor {
        let release = Arc::new(Notify::new());
        let waiter = Arc::clone(&release);
        ServiceDescriptor::new(
            name,
            move || async move {
                waiter.notified().await;
                Ok(())
            },
            move || async move {
                stops.fetch_add(1, Ordering::SeqCst);
                release.notify_one();
                Ok(())
            },
        )
    }

    #[tokio::test]
    async fn start_error_is_reported_without_stop() {
        let shutdown = Shutdown::new();
        let stopped = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&stopped);

        let descriptor = ServiceDescriptor::new(
            "SMTP server",
            || async { Err(anyhow::anyhow!("address already in use")) },
            move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        );

        let outcome = run(descriptor, shutdown.subscribe(), ShutdownTimeout::default()).await;
        assert_eq!(outcome.service, "SMTP server");
        let failure = outcome.error.expect("start error expected");
        assert_eq!(
            failure.to_string(),
            "failed to start SMTP server: address already in use"
        );
        assert_eq!(stopped.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn clean_exit_is_not_a_failure() {
        let shutdown = Shutdown::new();
        let descriptor = ServiceDescriptor::new("oneshot", || async { Ok(()) }, || async { Ok(()) });
        let outcome = run(descriptor, shutdown.subscribe(), ShutdownTimeout::default()).await;
        assert!(outcome.is_clean());
    }

    #[tokio::test]
    async fn cancellation_invokes_stop_once() {
        let shutdown = Shutdown::new();
        let stops = Arc::new(AtomicUsize::new(0));
        let listener = shutdown.subscribe();
        let handle = tokio::spawn(run(
            parked("IMAP server", Arc::clone(&stops)),
            listener,
            ShutdownTimeout::default(),
        ));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());

        shutdown.trigger(CancelReason::External);
        let outcome = handle.await.unwrap();
        assert!(outcome.is_clean());
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn already_cancelled_runner_stops_immediately() {
        let shutdown = Shutdown::new();
        shutdown.trigger(CancelReason::External);

        let stops = Arc::new(AtomicUsize::new(0));
        let outcome = run(
            parked("late", Arc::clone(&stops)),
            shutdown.subscribe(),
            ShutdownTimeout::default(),
        )
        .await;
        assert!(outcome.is_clean());
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_that_hangs_becomes_timeout() {
        let shutdown = Shutdown::new();
        let descriptor = ServiceDescriptor::new(
            "stuck",
            || std::future::pending::<anyhow::Result<()>>(),
            || std::future::pending::<anyhow::Result<()>>(),
        );
        shutdown.trigger(CancelReason::External);

        let outcome = run(descriptor, shutdown.subscribe(), ShutdownTimeout::from_secs(5)).await;
        assert!(matches!(
            outcome.error,
            Some(ServiceFailure::StopTimeout { .. })
        ));
    }

    #[tokio::test]
    async fn panicking_start_is_reported() {
        let shutdown = Shutdown::new();
        let descriptor = ServiceDescriptor::blocking(
            "fragile",
            || panic!("accept loop corrupted"),
            || Ok(()),
        );
        let outcome = run(descriptor, shutdown.subscribe(), ShutdownTimeout::default()).await;
        match outcome.error {
            Some(ServiceFailure::Panicked { phase, message, .. }) => {
                assert_eq!(phase, Phase::Start);
                assert_eq!(message, "accept loop corrupted");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
