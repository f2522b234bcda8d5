//! Batch-ready fan-out
//!
//! Every registered listener is invoked once per fired batch, in registration
//! order. A listener that returns an error or panics is logged and skipped;
//! the failure never reaches the other listeners or the caller.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::error;

use crate::domain::BatchParameters;

/// Receives "batch ready" events from the readiness coordinator.
///
/// Called while the coordinator holds its state lock: do not block, hand long
/// work (execution, I/O) to a spawned task.
pub trait BatchReadyListener: Send + Sync {
    fn on_batch_ready(&self, pool_id: &str, params: &BatchParameters) -> anyhow::Result<()>;
}

impl<F> BatchReadyListener for F
where
    F: Fn(&str, &BatchParameters) -> anyhow::Result<()> + Send + Sync,
{
    fn on_batch_ready(&self, pool_id: &str, params: &BatchParameters) -> anyhow::Result<()> {
        self(pool_id, params)
    }
}

/// A listener that failed during dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerFailure {
    /// Registration index of the listener
    pub listener: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failures: Vec<ListenerFailure>,
}

impl DispatchReport {
    pub fn all_delivered(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Default, Clone)]
pub struct BatchReadyDispatcher {
    listeners: Vec<Arc<dyn BatchReadyListener>>,
}

impl BatchReadyDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, listener: Arc<dyn BatchReadyListener>) {
        self.listeners.push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Invoke all listeners, collecting failures.
    pub fn dispatch(&self, pool_id: &str, params: &BatchParameters) -> DispatchReport {
        let mut report = DispatchReport::default();

        for (index, listener) in self.listeners.iter().enumerate() {
            let outcome = catch_unwind(AssertUnwindSafe(|| listener.on_batch_ready(pool_id, params)));
            let reason = match outcome {
                Ok(Ok(())) => {
                    report.delivered += 1;
                    continue;
                }
                Ok(Err(e)) => e.to_string(),
                Err(panic) => panic_message(panic.as_ref()),
            };

            error!(
                "Batch-ready listener #{} failed for pool {}: {}",
                index, pool_id, reason
            );
            report.failures.push(ListenerFailure {
                listener: index,
                reason,
            });
        }

        report
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("listener panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("listener panicked: {}", s)
    } else {
        "listener panicked".to_string()
    }
}
