//! Shutdown coordination for the service group.

use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// Why the group was asked to shut down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelReason {
    /// An operator or the OS asked the process to stop.
    External,
    /// A service reported its outcome, so the rest of the group must follow.
    ServiceExited(String),
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::External => write!(f, "external request"),
            CancelReason::ServiceExited(name) => write!(f, "{} exited", name),
        }
    }
}

/// Coordinator for graceful shutdown.
///
/// Backed by a watch channel so the signal is level-triggered: a task that
/// subscribes or checks after the trigger still observes it. Only the first
/// trigger takes effect; its reason is kept for the lifetime of the group.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<Option<CancelReason>>>,
}

impl Shutdown {
    /// Create a new, untriggered shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
        }
    }

    /// Trigger the shutdown signal.
    ///
    /// Returns `true` only for the call that actually flipped the signal.
    pub fn trigger(&self, reason: CancelReason) -> bool {
        let fired = self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason.clone());
            true
        });

        if fired {
            tracing::info!(
                reason = %reason,
                listeners = self.tx.receiver_count(),
                "Shutdown triggered"
            );
        } else {
            tracing::trace!(reason = %reason, "Shutdown already triggered, ignoring");
        }
        fired
    }

    /// Whether the signal has fired.
    pub fn is_triggered(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// The reason recorded by the first trigger.
    pub fn reason(&self) -> Option<CancelReason> {
        self.tx.borrow().clone()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of the shutdown signal handed to long-running tasks.
#[derive(Debug, Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<Option<CancelReason>>,
}

impl ShutdownListener {
    pub fn is_cancelled(&self) -> bool {
        self.rx.borrow().is_some()
    }

    pub fn reason(&self) -> Option<CancelReason> {
        self.rx.borrow().clone()
    }

    /// Resolve once the signal has fired, returning the recorded reason.
    ///
    /// Resolves immediately if it already fired. Never resolves if every
    /// `Shutdown` handle is gone without triggering.
    pub async fn cancelled(&self) -> CancelReason {
        let mut rx = self.rx.clone();
        let fired = rx
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|current| current.clone());
        match fired {
            Some(reason) => reason,
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn starts_untriggered() {
        let shutdown = Shutdown::new();
        let listener = shutdown.subscribe();
        assert!(!shutdown.is_triggered());
        assert!(!listener.is_cancelled());
        assert_eq!(listener.reason(), None);
    }

    #[test]
    fn second_trigger_is_a_no_op() {
        let shutdown = Shutdown::new();
        assert!(shutdown.trigger(CancelReason::ServiceExited("smtp".into())));
        assert!(!shutdown.trigger(CancelReason::External));
        assert_eq!(
            shutdown.reason(),
            Some(CancelReason::ServiceExited("smtp".into()))
        );
    }

    #[tokio::test]
    async fn late_subscriber_observes_trigger() {
        let shutdown = Shutdown::new();
        shutdown.trigger(CancelReason::External);

        let listener = shutdown.subscribe();
        assert!(listener.is_cancelled());
        let reason = tokio::time::timeout(Duration::from_secs(1), listener.cancelled())
            .await
            .expect("listener should resolve immediately");
        assert_eq!(reason, CancelReason::External);
    }

    #[tokio::test]
    async fn wakes_every_waiter() {
        let shutdown = Shutdown::new();
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let listener = shutdown.subscribe();
                tokio::spawn(async move { listener.cancelled().await })
            })
            .collect();

        tokio::task::yield_now().await;
        shutdown.trigger(CancelReason::External);

        for waiter in waiters {
            let reason = tokio::time::timeout(Duration::from_secs(1), waiter)
                .await
                .expect("waiter timed out")
                .expect("waiter panicked");
            assert_eq!(reason, CancelReason::External);
        }
    }

    #[tokio::test]
    async fn concurrent_triggers_fire_exactly_once() {
        let shutdown = Shutdown::new();
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    shutdown.trigger(CancelReason::ServiceExited(format!("svc-{}", i)))
                })
            })
            .collect();

        let mut fired = 0;
        for handle in handles {
            if handle.await.unwrap() {
                fired += 1;
            }
        }
        assert_eq!(fired, 1);
        assert!(shutdown.is_triggered());
    }
}
