//! Retry policy for side-effecting calls against remote backends.
//!
//! Conflicts and transient I/O failures are retried with exponential backoff
//! and no attempt limit. Every other failure is returned on first sight.

use crate::error::AppError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

/// Outcome of classifying a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    Fail,
}

/// Only conflicts and transient I/O are worth another attempt.
pub fn classify(err: &AppError) -> RetryDecision {
    match err {
        AppError::Conflict(_) | AppError::Transient(_) => RetryDecision::Retry,
        _ => RetryDecision::Fail,
    }
}

/// Backoff shape between attempts. The number of attempts is unbounded.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Backoff before the first retry. Zero disables sleeping altogether.
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
    /// Adds up to 25% on top of each computed backoff.
    pub add_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn new(initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            initial_backoff,
            max_backoff,
            ..Default::default()
        }
    }

    /// Retry straight away. Used by tests and by callers that pace themselves.
    pub fn immediate() -> Self {
        Self {
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    fn backoff_duration(&self, attempt: u32) -> Duration {
        if self.initial_backoff.is_zero() {
            return Duration::ZERO;
        }

        let exponent = attempt.min(32) as i32;
        let backoff =
            self.initial_backoff.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        let backoff_ms = backoff.min(self.max_backoff.as_millis() as f64) as u64;

        let mut duration = Duration::from_millis(backoff_ms);

        if self.add_jitter {
            let jitter = (backoff_ms as f64 * rand::thread_rng().gen_range(0.0..0.25)) as u64;
            duration += Duration::from_millis(jitter);
        }

        duration
    }
}

/// Run `f` until it succeeds or fails with an error that [`classify`] rejects.
///
/// Each attempt calls `f` afresh, so any check the operation performs before
/// its side effect is re-run on every attempt.
pub async fn run_with_retry<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    mut f: F,
) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let mut attempt: u32 = 0;

    loop {
        match f().await {
            Ok(result) => {
                if attempt > 0 {
                    info!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        "Call succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                if classify(&err) == RetryDecision::Fail {
                    return Err(err);
                }

                let backoff = config.backoff_duration(attempt);
                debug!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    error = %err,
                    backoff_ms = backoff.as_millis() as u64,
                    "Call failed, retrying"
                );

                if !backoff.is_zero() {
                    sleep(backoff).await;
                }
                attempt = attempt.saturating_add(1);
            }
        }
    }
}
