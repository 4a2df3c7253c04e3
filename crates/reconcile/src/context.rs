//! Reconcile context and provider traits
//!
//! Everything a reconciliation needs from its caller travels in a
//! [`ReconcileContext`]: the remote client for the resource kind, the retry
//! policy, worker count and the cancellation signal.

use crate::client::RemoteClient;
use crate::types::{ExecuteOptions, OperationOutcome, Phase, RetryConfig};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Cancellation signal shared between the caller and the executor
///
/// Cancelled explicitly via [`Cancellation::cancel`] or implicitly once the
/// optional deadline passes. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    /// A signal that trips automatically after `timeout`
    ///
    /// A timeout too large to represent never trips.
    pub fn with_deadline(timeout: Duration) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst) || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// Progress callback for execution
///
/// Implement this trait to receive progress updates during execution.
/// Outcomes of a batch of parallel operations are reported after the batch
/// completes, from the calling thread.
pub trait ProgressCallback: Send {
    /// Called when starting a phase with `count` operations
    fn on_phase_start(&mut self, phase: Phase, count: usize);

    /// Called when an operation finishes, fails or is skipped
    fn on_operation_complete(&mut self, outcome: &OperationOutcome);

    /// Called when a phase completes
    fn on_phase_complete(&mut self, phase: Phase);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_phase_start(&mut self, _phase: Phase, _count: usize) {}
    fn on_operation_complete(&mut self, _outcome: &OperationOutcome) {}
    fn on_phase_complete(&mut self, _phase: Phase) {}
}

/// Context passed through a reconciliation
pub struct ReconcileContext<'a> {
    /// Remote client for the resource kind being reconciled
    pub client: &'a dyn RemoteClient,
    /// Retry policy for transient errors
    pub retry: RetryConfig,
    /// Worker count and refresh switch
    pub options: ExecuteOptions,
    /// Cancellation signal
    pub cancellation: Cancellation,
}

impl<'a> ReconcileContext<'a> {
    /// Create a context with default retry policy and options
    pub fn new(client: &'a dyn RemoteClient) -> Self {
        Self {
            client,
            retry: RetryConfig::default(),
            options: ExecuteOptions::default(),
            cancellation: Cancellation::new(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_options(mut self, options: ExecuteOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = cancellation;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let signal = Cancellation::new();
        let observer = signal.clone();
        assert!(!observer.is_cancelled());
        signal.cancel();
        assert!(observer.is_cancelled());
    }

    #[test]
    fn test_deadline_trips() {
        let expired = Cancellation::with_deadline(Duration::ZERO);
        assert!(expired.is_cancelled());
        let later = Cancellation::with_deadline(Duration::from_secs(3600));
        assert!(!later.is_cancelled());
    }

    #[test]
    fn test_unrepresentable_deadline_never_trips() {
        let signal = Cancellation::with_deadline(Duration::from_secs(u64::MAX));
        assert!(!signal.is_cancelled());
        signal.cancel();
        assert!(signal.is_cancelled());
    }
}
