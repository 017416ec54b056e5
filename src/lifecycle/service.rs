//! Service descriptors: the start/stop contract the coordinator drives.
//!
//! A service is anything with a long-running `start` (an accept loop, usually)
//! and a `stop` that makes `start` return out-of-band, e.g. by closing the
//! listener it owns.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt};

/// Result of a start or stop operation. Errors are opaque to the coordinator.
pub type ServiceResult = anyhow::Result<()>;

type Operation = Box<dyn FnOnce() -> BoxFuture<'static, ServiceResult> + Send>;

/// A long-running service that can be stopped from another task.
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Run until the service terminates. May never return on its own.
    async fn start(&self) -> ServiceResult;

    /// Ask a running `start` to return. May be called while `start` is pending.
    async fn stop(&self) -> ServiceResult;
}

/// A named start/stop pair, owned by exactly one runner.
pub struct ServiceDescriptor {
    name: String,
    start: Operation,
    stop: Operation,
}

impl ServiceDescriptor {
    /// Build a descriptor from two async operations.
    ///
    /// # Panics
    /// Panics if `name` is empty.
    pub fn new<Start, StartFut, Stop, StopFut>(name: impl Into<String>, start: Start, stop: Stop) -> Self
    where
        Start: FnOnce() -> StartFut + Send + 'static,
        StartFut: Future<Output = ServiceResult> + Send + 'static,
        Stop: FnOnce() -> StopFut + Send + 'static,
        StopFut: Future<Output = ServiceResult> + Send + 'static,
    {
        let name = name.into();
        assert!(!name.is_empty(), "service name must not be empty");
        Self {
            name,
            start: Box::new(move || start().boxed()),
            stop: Box::new(move || stop().boxed()),
        }
    }

    /// Build a descriptor from two blocking operations.
    ///
    /// Both run on the blocking thread pool. A panic inside either one is
    /// re-raised on the task that awaits it.
    pub fn blocking<Start, Stop>(name: impl Into<String>, start: Start, stop: Stop) -> Self
    where
        Start: FnOnce() -> ServiceResult + Send + 'static,
        Stop: FnOnce() -> ServiceResult + Send + 'static,
    {
        Self::new(name, move || run_blocking(start), move || run_blocking(stop))
    }

    /// Build a descriptor that drives a shared [`Service`].
    pub fn from_service<S: Service>(name: impl Into<String>, service: Arc<S>) -> Self {
        let stopper = Arc::clone(&service);
        Self::new(
            name,
            move || async move { service.start().await },
            move || async move { stopper.stop().await },
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn into_parts(self) -> (String, Operation, Operation) {
        (self.name, self.start, self.stop)
    }
}

impl std::fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

async fn run_blocking<F>(operation: F) -> ServiceResult
where
    F: FnOnce() -> ServiceResult + Send + 'static,
{
    match tokio::task::spawn_blocking(operation).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => Err(anyhow::anyhow!("blocking operation was cancelled: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    #[should_panic(expected = "service name must not be empty")]
    fn rejects_empty_name() {
        let _ = ServiceDescriptor::new("", || async { Ok(()) }, || async { Ok(()) });
    }

    #[tokio::test]
    async fn blocking_operations_run_off_the_runtime() {
        let descriptor = ServiceDescriptor::blocking(
            "blocking",
            || Err(anyhow::anyhow!("bind failed")),
            || Ok(()),
        );
        assert_eq!(descriptor.name(), "blocking");

        let (_, start, stop) = descriptor.into_parts();
        let err = start().await.unwrap_err();
        assert_eq!(err.to_string(), "bind failed");
        assert!(stop().await.is_ok());
    }

    struct Flagged {
        stopped: AtomicBool,
    }

    #[async_trait]
    impl Service for Flagged {
        async fn start(&self) -> ServiceResult {
            Ok(())
        }

        async fn stop(&self) -> ServiceResult {
            self.stopped.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn from_service_shares_one_instance() {
        let service = Arc::new(Flagged {
            stopped: AtomicBool::new(false),
        });
        let (_, _, stop) = ServiceDescriptor::from_service("flagged", Arc::clone(&service)).into_parts();
        stop().await.unwrap();
        assert!(service.stopped.load(Ordering::SeqCst));
    }
}
