//! Retry logic with exponential backoff for transient remote errors.

use crate::context::Cancellation;
use crate::error::RemoteError;
use crate::types::RetryConfig;
use std::thread;
use std::time::Duration;

/// Callback trait for retry notifications.
pub trait RetryCallback: Sync {
    /// Called before sleeping ahead of the next attempt.
    ///
    /// # Arguments
    /// * `attempt` - Attempt that just failed (1-indexed)
    /// * `max_attempts` - Maximum number of attempts
    /// * `error` - The error that triggered the retry
    /// * `delay` - Time until the next attempt
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &RemoteError, delay: Duration);
}

/// No-op callback that does nothing.
pub struct NoCallback;

impl RetryCallback for NoCallback {
    fn on_retry(&self, _attempt: u32, _max_attempts: u32, _error: &RemoteError, _delay: Duration) {}
}

/// Callback that logs retries for one named operation.
pub struct LogCallback<'a> {
    pub label: &'a str,
}

impl RetryCallback for LogCallback<'_> {
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &RemoteError, delay: Duration) {
        log::warn!(
            "{}: attempt {attempt}/{max_attempts} failed: {error}. Retrying in {}ms",
            self.label,
            delay.as_millis()
        );
    }
}

/// The last error of an operation that never succeeded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryFailure {
    pub error: RemoteError,
    pub attempts: u32,
}

/// Execute an operation with retry logic.
///
/// Retryable errors are retried with exponential backoff up to
/// `config.max_attempts` attempts in total; any other error is returned
/// immediately. No further attempt is started once `cancellation` trips.
pub fn with_retry<T, F>(
    config: &RetryConfig,
    cancellation: &Cancellation,
    callback: &dyn RetryCallback,
    mut operation: F,
) -> Result<T, RetryFailure>
where
    F: FnMut() -> Result<T, RemoteError>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let error = match operation() {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };

        if !error.is_retryable() || attempt >= max_attempts || cancellation.is_cancelled() {
            return Err(RetryFailure {
                error,
                attempts: attempt,
            });
        }

        let delay = config.delay_for_attempt(attempt - 1);
        callback.on_retry(attempt, max_attempts, &error, delay);
        thread::sleep(delay);

        if cancellation.is_cancelled() {
            return Err(RetryFailure {
                error,
                attempts: attempt,
            });
        }
    }
}
