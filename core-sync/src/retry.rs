//! Bounded retry with exponential backoff for remote listing calls.
//!
//! Cancellation-class failures are never retried, and a cancellation that
//! fires during a backoff ends the wait immediately.

use crate::{Result, SyncError};
use bridge_traits::error::Result as BridgeResult;
use core_async::sync::CancellationToken;
use core_async::time::{timeout, Duration};
use core_runtime::config::RetrySettings;
use std::future::Future;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff: max_backoff.max(initial_backoff),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after the `failures`-th consecutive failure (1-based).
    pub fn backoff_for(&self, failures: u32) -> Duration {
        let factor = 2u32.saturating_pow(failures.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Run `op` until it succeeds, fails with a cancellation, or exhausts the
    /// attempt budget. `subject` names the directory in logs and errors.
    pub async fn run<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        subject: &str,
        mut op: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = BridgeResult<T>>,
    {
        let mut last_error = String::new();

        for attempt in 1..=self.max_attempts {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_cancelled() => return Err(SyncError::Cancelled),
                Err(err) => last_error = err.to_string(),
            }

            if attempt == self.max_attempts {
                break;
            }

            let backoff = self.backoff_for(attempt);
            warn!(
                subject,
                attempt,
                max_attempts = self.max_attempts,
                backoff_ms = backoff.as_millis() as u64,
                error = %last_error,
                "remote call failed, retrying"
            );

            if timeout(backoff, cancel.cancelled()).await.is_ok() {
                return Err(SyncError::Cancelled);
            }
        }

        Err(SyncError::RetriesExhausted {
            dir_id: subject.to_string(),
            attempts: self.max_attempts,
            message: last_error,
        })
    }
}

impl From<RetrySettings> for RetryPolicy {
    fn from(settings: RetrySettings) -> Self {
        Self::new(
            settings.max_attempts,
            Duration::from_millis(settings.initial_backoff_ms),
            Duration::from_millis(settings.max_backoff_ms),
        )
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetrySettings::default().into()
    }
}
