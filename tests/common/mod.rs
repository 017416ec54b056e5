//! Shared fake services for coordinator tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use mailserver::lifecycle::ServiceDescriptor;
use tokio::sync::Notify;

/// How a fake service's `stop` behaves.
#[derive(Debug, Clone, Copy)]
#[allow(dead_code)]
pub enum StopBehavior {
    Succeed,
    Fail(&'static str),
    Hang,
}

/// Counters shared between a fake service and the test.
#[derive(Debug, Default)]
pub struct Calls {
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
}

#[allow(dead_code)]
impl Calls {
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

/// A listener-like service: `start` blocks until `stop` releases it.
pub fn blocking_service(name: &str, stop: StopBehavior) -> (ServiceDescriptor, Arc<Calls>) {
    let calls = Arc::new(Calls::default());
    let release = Arc::new(Notify::new());

    let start_calls = Arc::clone(&calls);
    let start_release = Arc::clone(&release);
    let stop_calls = Arc::clone(&calls);

    let descriptor = ServiceDescriptor::new(
        name,
        move || async move {
            start_calls.starts.fetch_add(1, Ordering::SeqCst);
            start_release.notified().await;
            Ok(())
        },
        move || async move {
            stop_calls.stops.fetch_add(1, Ordering::SeqCst);
            match stop {
                StopBehavior::Succeed => {
                    release.notify_one();
                    Ok(())
                }
                StopBehavior::Fail(message) => Err(anyhow::anyhow!(message)),
                StopBehavior::Hang => std::future::pending().await,
            }
        },
    );
    (descriptor, calls)
}

/// A service whose `start` fails right away.
#[allow(dead_code)]
pub fn failing_service(name: &str, message: &'static str) -> (ServiceDescriptor, Arc<Calls>) {
    let calls = Arc::new(Calls::default());
    let start_calls = Arc::clone(&calls);
    let stop_calls = Arc::clone(&calls);

    let descriptor = ServiceDescriptor::new(
        name,
        move || async move {
            start_calls.starts.fetch_add(1, Ordering::SeqCst);
            Err(anyhow::anyhow!(message))
        },
        move || async move {
            stop_calls.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        },
    );
    (descriptor, calls)
}
