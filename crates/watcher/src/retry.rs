use crate::{CanRetry, ChainIteratorError};
use metrics::Histogram;
use metrics_derive::Metrics;
use std::{fmt::Debug, future::Future, time::Duration};
use tokio_util::sync::CancellationToken;

/// The backoff applied between two attempts of a failing operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Waits the same interval between each attempt.
    Constant(Duration),
    /// Doubles the interval after each attempt, up to `max`.
    Exponential {
        /// The interval after the first failure.
        initial: Duration,
        /// The maximum interval.
        max: Duration,
    },
}

impl Backoff {
    /// Returns the delay to wait before the next attempt, after `attempt` failed attempts.
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            Self::Constant(interval) => *interval,
            Self::Exponential { initial, max } => {
                let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
                initial.saturating_mul(factor).min(*max)
            }
        }
    }
}

/// Metrics for the retry helper.
#[derive(Metrics, Clone)]
#[metrics(scope = "chain_iterator_retry")]
struct RetryMetrics {
    /// Number of attempts before a successful result.
    #[metrics(describe = "Number of attempts before a successful result")]
    pub attempts_before_success: Histogram,
}

/// Retries transient failures of an operation until it succeeds, fails with an error that can't
/// be retried or the cancellation token fires. There is no maximum amount of attempts.
#[derive(Debug, Clone)]
pub struct Retry {
    /// The backoff between attempts.
    pub backoff: Backoff,
    /// The cancellation token.
    cancel: CancellationToken,
    /// Retry metrics.
    metrics: RetryMetrics,
}

impl Retry {
    /// Returns a new [`Retry`] with the provided backoff, cancelled with the token.
    pub fn new(backoff: Backoff, cancel: CancellationToken) -> Self {
        Self { backoff, cancel, metrics: RetryMetrics::default() }
    }

    /// Runs the operation until it succeeds. Each attempt races against the cancellation token.
    pub async fn run<T, E, F, Fut>(&self, target: &'static str, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: CanRetry + From<ChainIteratorError> + Debug,
    {
        let mut attempt = 0;
        loop {
            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(ChainIteratorError::Cancelled.into()),
                result = operation() => result,
            };

            match result {
                Ok(value) => {
                    self.record_success(attempt);
                    return Ok(value)
                }
                Err(error) if error.can_retry() => {
                    attempt += 1;
                    tracing::warn!(target: "rollup::watcher", ?error, attempt, operation = target, "retrying failed operation");
                    self.wait(attempt).await?;
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// Waits for the backoff delay after `attempt` failed attempts.
    pub(crate) async fn wait(&self, attempt: u32) -> Result<(), ChainIteratorError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ChainIteratorError::Cancelled),
            _ = tokio::time::sleep(self.backoff.delay(attempt)) => Ok(()),
        }
    }

    /// Records a success after `attempt` failed attempts.
    pub(crate) fn record_success(&self, attempt: u32) {
        self.metrics.attempts_before_success.record(attempt as f64);
    }
}
